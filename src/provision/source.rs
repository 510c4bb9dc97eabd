use std::path::Path;
use walkdir::WalkDir;

use crate::common::application::{ApplicationConfig, RepoType};
use crate::common::config::RuntimeConfig;
use crate::common::report::StepReport;
use crate::traits::process_runner::{CommandSpec, ProcessRunner};

/// Puts the application source into `app_dir`: a fresh clone of the
/// declared repository, otherwise a copy of the unpacked package tree.
pub async fn materialize_source(
    runner: &dyn ProcessRunner,
    runtime: &RuntimeConfig,
    config: &ApplicationConfig,
    package_root: &Path,
    app_dir: &Path,
) -> StepReport {
    let mut report = StepReport::new();
    if let Err(e) = remove_tree(app_dir).await {
        report.error("source:clean", e.to_string());
        return report;
    }
    match (config.repo_type, config.repo_url.as_deref()) {
        (Some(repo_type), Some(url)) => {
            let (bin, update) = match repo_type {
                RepoType::Git => (&runtime.git_bin, "checkout"),
                RepoType::Hg => (&runtime.hg_bin, "update"),
            };
            let clone = CommandSpec::new(bin)
                .arg("clone")
                .arg(url)
                .arg(app_dir.to_string_lossy());
            let cloned = report.command("source:clone", runner.run(&clone).await);
            if let (true, Some(revision)) = (cloned, config.repo_revision.as_deref()) {
                let checkout = CommandSpec::new(bin).arg(update).arg(revision).cwd(app_dir);
                report.command("source:checkout", runner.run(&checkout).await);
            }
        }
        _ => {
            let src = package_root.to_path_buf();
            let dst = app_dir.to_path_buf();
            let copied = tokio::task::spawn_blocking(move || copy_tree(&src, &dst)).await;
            match copied {
                Ok(Ok(files)) => report.output("source:copy", format!("{} files copied", files)),
                Ok(Err(e)) => report.error("source:copy", e.to_string()),
                Err(e) => report.error("source:copy", e.to_string()),
            }
        }
    }
    report
}

pub async fn remove_tree(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    Ok(())
}

/// Recursively copies `src` into `dst`, returning the number of files.
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}
