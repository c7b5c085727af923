use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid URL")]
    InvalidUrl,

    #[error("Please select a quality option first.")]
    NoFormatSelected,

    #[error("No media has been analysed yet")]
    NoMediaInfo,

    #[error("The download has not completed yet")]
    NotCompleted,

    /// Failure reported by the backend or the transport, already worded for the user
    #[error("{0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SessionError {
    /// Validation errors leave the session where it was
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidUrl | SessionError::NoFormatSelected | SessionError::NoMediaInfo
        )
    }
}
