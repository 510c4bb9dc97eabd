use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::error::AgentError;
use crate::traits::process_runner::CommandOutput;

/// Accumulated `{output, errors}` of a multi-step operation. A failed step
/// lands in `errors` and the operation moves on to the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub output: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&mut self, step: impl Into<String>, text: impl Into<String>) {
        self.output.insert(step.into(), text.into());
    }

    pub fn error(&mut self, step: impl Into<String>, text: impl Into<String>) {
        let step = step.into();
        let text = text.into();
        log::warn!("step {} failed: {}", step, text);
        self.errors.insert(step, text);
    }

    /// Records a command result; returns whether the step succeeded.
    pub fn command(
        &mut self,
        step: impl Into<String>,
        result: Result<CommandOutput, AgentError>,
    ) -> bool {
        let step = step.into();
        match result {
            Ok(out) if out.success() => {
                self.output(step, out.combined());
                true
            }
            Ok(out) => {
                self.error(step, AgentError::provisioning(out.command.clone(), out.combined()).to_string());
                false
            }
            Err(e) => {
                self.error(step, e.to_string());
                false
            }
        }
    }

    pub fn absorb(&mut self, other: StepReport) {
        self.output.extend(other.output);
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::json!({ "output": self.output, "errors": self.errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(status: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            command: "pip install flask".into(),
            status: Some(status),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn failed_command_goes_to_errors() {
        let mut report = StepReport::new();
        assert!(report.command("install", Ok(output(0, "ok", ""))));
        assert!(!report.command("install:extra", Ok(output(1, "", "no such package"))));
        assert_eq!(report.output["install"], "ok");
        assert!(report.errors["install:extra"].contains("no such package"));
        assert!(!report.is_clean());
    }

    #[test]
    fn value_has_output_and_errors() {
        let mut report = StepReport::new();
        report.error("checkout", "boom");
        let value = report.into_value();
        assert_eq!(value["errors"]["checkout"], "boom");
        assert!(value["output"].as_object().unwrap().is_empty());
    }
}
