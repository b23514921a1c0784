use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Sync unavailable: {0}")]
    SyncUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] eyre::Report),

    #[error("Internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    /// Shorthand used by the parsers and the calculator.
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    /// Whether this error came from the network side rather than from bad input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::SyncUnavailable(_) | SyncError::SendFailed(_)
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
