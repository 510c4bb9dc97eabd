use std::io;
use std::path::{Path, PathBuf};

use crate::common::config::{PathsConfig, RuntimeConfig};
use crate::common::error::AgentResult;
use crate::provision::templates::{
    conf_file_port, is_instance_log, render_proxy_conf, render_supervisor_conf, InstanceLayout,
};
use crate::traits::process_runner::{CommandOutput, CommandSpec, ProcessRunner};

/// Signals the reverse proxy and the process supervisor, and owns the
/// generated per-instance files they read.
pub struct Daemons<'a> {
    runner: &'a dyn ProcessRunner,
    runtime: &'a RuntimeConfig,
    paths: &'a PathsConfig,
}

impl<'a> Daemons<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, runtime: &'a RuntimeConfig, paths: &'a PathsConfig) -> Self {
        Self {
            runner,
            runtime,
            paths,
        }
    }

    pub fn layout(&self, app: &str, port: u16) -> InstanceLayout {
        InstanceLayout::new(self.paths, app, port)
    }

    async fn run(&self, spec: CommandSpec) -> AgentResult<CommandOutput> {
        log::debug!("Running: {}", spec.display());
        self.runner.run(&spec).await
    }

    fn supervisorctl(&self) -> CommandSpec {
        CommandSpec::new(&self.runtime.supervisorctl_bin)
            .arg("-c")
            .arg(self.paths.supervisord_conf().to_string_lossy())
    }

    pub async fn proxy_start(&self, layout: &InstanceLayout) -> AgentResult<CommandOutput> {
        let spec = CommandSpec::new(&self.runtime.nginx_bin)
            .arg("-c")
            .arg(layout.proxy_conf.to_string_lossy());
        self.run(spec).await
    }

    pub async fn proxy_quit(&self, layout: &InstanceLayout) -> AgentResult<CommandOutput> {
        let spec = CommandSpec::new(&self.runtime.nginx_bin)
            .arg("-c")
            .arg(layout.proxy_conf.to_string_lossy())
            .arg("-s")
            .arg("quit");
        self.run(spec).await
    }

    pub async fn program_start(&self, layout: &InstanceLayout) -> AgentResult<CommandOutput> {
        self.run(self.supervisorctl().arg("start").arg(&layout.name)).await
    }

    pub async fn program_stop(&self, layout: &InstanceLayout) -> AgentResult<CommandOutput> {
        self.run(self.supervisorctl().arg("stop").arg(&layout.name)).await
    }

    /// Makes the supervisor pick up added and removed program files.
    pub async fn reload(&self) -> AgentResult<CommandOutput> {
        self.run(self.supervisorctl().arg("update")).await
    }

    /// Kills whatever still runs out of `app_dir`. pkill exits with 1 when
    /// nothing matched, which is reported as success.
    pub async fn kill_app_processes(&self, app_dir: &Path) -> AgentResult<CommandOutput> {
        // anchored so `apps/demo` does not match `apps/demo_api`
        let spec = CommandSpec::new(&self.runtime.pkill_bin)
            .arg("-9")
            .arg("-f")
            .arg(kill_pattern(app_dir));
        let mut out = self.run(spec).await?;
        if out.status == Some(1) {
            out.status = Some(0);
            out.stdout = "no matching processes".to_string();
        }
        Ok(out)
    }

    pub async fn chown(&self, dir: &Path) -> AgentResult<CommandOutput> {
        let spec = CommandSpec::new(&self.runtime.chown_bin)
            .arg("-R")
            .arg(format!("{}:{}", self.runtime.user, self.runtime.group))
            .arg(dir.to_string_lossy());
        self.run(spec).await
    }

    /// Writes the proxy and supervisor files of one instance.
    pub async fn write_instance_configs(&self, layout: &InstanceLayout, extra_args: &[String]) -> io::Result<()> {
        for dir in [
            &layout.state_dir,
            &self.paths.log_dir(),
            &self.paths.proxy_conf_dir(),
            &self.paths.supervisor_conf_dir(),
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&layout.proxy_conf, render_proxy_conf(layout)).await?;
        tokio::fs::write(
            &layout.supervisor_conf,
            render_supervisor_conf(layout, self.runtime, extra_args),
        )
        .await?;
        log::debug!("Wrote configs for {}", layout.name);
        Ok(())
    }

    /// Deletes both generated files of one instance. Missing files are fine.
    pub async fn remove_instance_configs(&self, layout: &InstanceLayout) -> io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in [&layout.proxy_conf, &layout.supervisor_conf] {
            if tokio::fs::try_exists(path).await? {
                tokio::fs::remove_file(path).await?;
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }

    /// Deletes every generated config of `app`, whatever port it was for.
    pub async fn remove_app_configs(&self, app: &str) -> io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for dir in [self.paths.proxy_conf_dir(), self.paths.supervisor_conf_dir()] {
            removed.extend(remove_matching(&dir, |name| conf_file_port(app, name).is_some()).await?);
        }
        Ok(removed)
    }

    pub async fn remove_app_logs(&self, app: &str) -> io::Result<Vec<PathBuf>> {
        remove_matching(&self.paths.log_dir(), |name| is_instance_log(app, name)).await
    }
}

/// pkill pattern matching command lines that run out of `app_dir`.
pub fn kill_pattern(app_dir: &Path) -> String {
    format!("{}(/| |$)", ere_escape(&app_dir.to_string_lossy()))
}

/// Escapes POSIX extended regex metacharacters.
fn ere_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '.' | '[' | ']' | '(' | ')' | '*' | '+' | '?' | '{' | '}' | '|' | '^' | '$') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn remove_matching<F>(dir: &Path, matches: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut removed = Vec::new();
    if !tokio::fs::try_exists(dir).await? {
        return Ok(removed);
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if matches(name) && entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed.push(entry.path());
        }
    }
    removed.sort();
    Ok(removed)
}
