use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::common::error::{AgentError, AgentResult};
use crate::traits::process_runner::{CommandOutput, CommandSpec, ProcessRunner};

/// Spawns real subprocesses; a command still running after `timeout` is
/// killed and reported as `CommandTimeout`.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> AgentResult<CommandOutput> {
        let display = spec.display();
        log::debug!("Running `{}`", display);
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| AgentError::provisioning(display.clone(), e.to_string()))?,
            Err(_) => {
                log::error!("`{}` timed out after {:?}", display, self.timeout);
                return Err(AgentError::CommandTimeout {
                    command: display,
                    secs: self.timeout.as_secs(),
                });
            }
        };
        let result = CommandOutput {
            command: display,
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            log::debug!("`{}` exited with {:?}", result.command, result.status);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output_and_status() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.status, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_binary_is_provisioning_failure() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ProvisioningFailure { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let err = runner
            .run(&CommandSpec::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::CommandTimeout { .. }));
    }
}
