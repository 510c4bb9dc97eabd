//! Error taxonomy for deployment operations.

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("package does not contain a manifest.json")]
    MissingManifest,

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("application not deployed: {0}")]
    NotDeployed(String),

    #[error("port already reserved: {0}")]
    AlreadyReserved(u16),

    #[error("port {0} is outside the application port range")]
    PortOutOfRange(u16),

    #[error("no free application port left on this node")]
    PortExhausted,

    #[error("command `{command}` failed: {message}")]
    ProvisioningFailure { command: String, message: String },

    #[error("command `{command}` timed out after {secs}s")]
    CommandTimeout { command: String, secs: u64 },

    #[error("stored config for {application} is corrupt: {message}")]
    ConfigCorrupt { application: String, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("timed out waiting for lock {0}")]
    LockTimeout(String),

    #[error("operation aborted: {0}")]
    Aborted(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    pub fn provisioning(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProvisioningFailure {
            command: command.into(),
            message: message.into(),
        }
    }

    /// True when retrying the same request cannot succeed.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AgentError::MissingManifest
                | AgentError::InvalidManifest(_)
                | AgentError::NotDeployed(_)
                | AgentError::AlreadyReserved(_)
                | AgentError::PortOutOfRange(_)
                | AgentError::InvalidArgument(_)
                | AgentError::UnknownOperation(_)
        )
    }
}
