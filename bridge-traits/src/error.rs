use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("No analytics instance found for app id '{0}'")]
    InstanceNotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::NotAvailable(_) => "not_available",
            BridgeError::InstanceNotFound(_) => "instance_not_found",
            BridgeError::InvalidPayload(_) => "invalid_payload",
            BridgeError::OperationFailed(_) => "operation_failed",
            BridgeError::Io(_) => "io",
            BridgeError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
