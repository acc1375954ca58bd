use thiserror::Error;

/// Terminal failures of a device link attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Invalid input parameters.")]
    InvalidInput,

    /// Non-transient backend failure, message kept verbatim
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to link device to user after multiple retries.")]
    Exhausted,

    #[error("Device link cancelled.")]
    Cancelled,
}

/// Failure reported by a record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;
