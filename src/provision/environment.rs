use std::path::Path;

use crate::common::config::RuntimeConfig;
use crate::common::report::StepReport;
use crate::provision::source::remove_tree;
use crate::traits::process_runner::{CommandSpec, ProcessRunner};

pub struct ProvisionRequest<'a> {
    pub env_dir: &'a Path,
    pub packages: &'a [String],
    pub requirements: Option<&'a Path>,
    pub runtime: Option<&'a str>,
    pub force: bool,
}

/// Creates the isolated environment when missing, then installs packages.
/// Every command outcome lands in the report; nothing here returns an error.
pub async fn provision(
    runner: &dyn ProcessRunner,
    runtime: &RuntimeConfig,
    request: &ProvisionRequest<'_>,
) -> StepReport {
    let mut report = StepReport::new();
    let env_dir = request.env_dir;

    if request.force {
        match remove_tree(env_dir).await {
            Ok(()) => report.output("environment:remove", env_dir.display().to_string()),
            Err(e) => report.error("environment:remove", e.to_string()),
        }
    }

    if !env_dir.exists() {
        let mut create = CommandSpec::new(&runtime.virtualenv_bin);
        if let Some(name) = request.runtime {
            let which = CommandSpec::new(&runtime.which_bin).arg(name);
            match runner.run(&which).await {
                Ok(out) if out.success() && !out.stdout.trim().is_empty() => {
                    let interpreter = out.stdout.trim().to_string();
                    report.output("environment:runtime", interpreter.clone());
                    create = create.arg("-p").arg(interpreter);
                }
                Ok(out) => report.error(
                    "environment:runtime",
                    format!("runtime {} not found: {}", name, out.combined()),
                ),
                Err(e) => report.error("environment:runtime", e.to_string()),
            }
        }
        create = create.arg(env_dir.to_string_lossy());
        if !report.command("environment:create", runner.run(&create).await) {
            // installs need the environment
            return report;
        }
    }

    let pip = env_dir.join("bin").join("pip");
    for package in request.packages {
        let install = CommandSpec::new(pip.to_string_lossy())
            .arg("install")
            .arg(package);
        report.command(format!("install:{}", package), runner.run(&install).await);
    }
    if let Some(requirements) = request.requirements {
        let install = CommandSpec::new(pip.to_string_lossy())
            .arg("install")
            .arg("-r")
            .arg(requirements.to_string_lossy());
        report.command("install:requirements", runner.run(&install).await);
    }
    report
}
