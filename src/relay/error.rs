use thiserror::Error;

/// Errors returned by relay calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Host process is suspended or restarting
    #[error("Relay host is not ready")]
    NotReady,

    /// The request carried no usable origin identity
    #[error("Cannot identify the calling page")]
    Unidentified,

    #[error("Supervisory channel closed")]
    ChannelClosed,
}

impl RelayError {
    /// Whether the caller should retry after a backoff
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelayError::NotReady | RelayError::Unidentified)
    }
}
