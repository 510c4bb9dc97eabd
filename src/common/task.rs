use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::common::error::{AgentError, AgentResult};

/// Names accepted by the task queue. Anything else is rejected at enqueue.
pub const OPERATIONS: [&str; 5] = [
    "deploy_app",
    "stop_application",
    "restart_application",
    "remove_application",
    "scale_application",
];

/// A queued unit of work: an operation tag plus its structured arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum Operation {
    DeployApp {
        package: PathBuf,
        #[serde(default)]
        skip_provision: bool,
        #[serde(default)]
        force_provision: bool,
    },
    StopApplication {
        application: String,
    },
    RestartApplication {
        application: String,
    },
    RemoveApplication {
        application: String,
    },
    ScaleApplication {
        application: String,
        instances: usize,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DeployApp { .. } => "deploy_app",
            Operation::StopApplication { .. } => "stop_application",
            Operation::RestartApplication { .. } => "restart_application",
            Operation::RemoveApplication { .. } => "remove_application",
            Operation::ScaleApplication { .. } => "scale_application",
        }
    }

    /// Builds an operation from its registry name and a JSON argument map.
    pub fn from_name(name: &str, args: serde_json::Value) -> AgentResult<Self> {
        if !OPERATIONS.contains(&name) {
            return Err(AgentError::UnknownOperation(name.to_string()));
        }
        let tagged = serde_json::json!({ "name": name, "args": args });
        serde_json::from_value(tagged)
            .map_err(|e| AgentError::InvalidArgument(format!("{}: {}", name, e)))
    }

    /// The application this operation mutates, when known before running it.
    pub fn application(&self) -> Option<&str> {
        match self {
            Operation::DeployApp { .. } => None,
            Operation::StopApplication { application }
            | Operation::RestartApplication { application }
            | Operation::RemoveApplication { application }
            | Operation::ScaleApplication { application, .. } => Some(application),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub operation: Operation,
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// Status slot of a dequeued task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: TaskStatus,
    pub result: serde_json::Value,
}
