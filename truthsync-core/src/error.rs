use thiserror::Error;

/// Core error type for the TruthSync client.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum TruthSyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend unreachable: {message}")]
    Transport { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("backend reported an error: {message}")]
    Backend { message: String },

    #[error("stream closed without content")]
    EmptyStream,

    #[error("attempt cancelled by caller")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TruthSyncError {
    /// Stable reason code per taxonomy entry. Callers map these to
    /// user-facing copy; keep them stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid-request",
            Self::Transport { .. } => "transport-error",
            Self::Timeout => "timeout",
            Self::Backend { .. } => "backend-error",
            Self::EmptyStream => "empty-stream",
            Self::Cancelled => "cancelled",
            Self::Io(_) | Self::Other(_) => "internal",
        }
    }

    /// True for failures a caller-level retry policy may reasonably retry.
    /// Backend errors are terminal and cancellations are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout)
    }
}

pub type CoreResult<T> = std::result::Result<T, TruthSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            TruthSyncError::Transport { message: "x".into() }.code(),
            "transport-error"
        );
        assert_eq!(TruthSyncError::Timeout.code(), "timeout");
        assert_eq!(
            TruthSyncError::Backend { message: "x".into() }.code(),
            "backend-error"
        );
        assert_eq!(TruthSyncError::EmptyStream.code(), "empty-stream");
        assert_eq!(TruthSyncError::Cancelled.code(), "cancelled");
        assert_eq!(TruthSyncError::Validation("x".into()).code(), "invalid-request");
    }

    #[test]
    fn only_transport_and_timeout_are_retryable() {
        assert!(TruthSyncError::Transport { message: "x".into() }.is_retryable());
        assert!(TruthSyncError::Timeout.is_retryable());
        assert!(!TruthSyncError::Backend { message: "x".into() }.is_retryable());
        assert!(!TruthSyncError::Cancelled.is_retryable());
        assert!(!TruthSyncError::EmptyStream.is_retryable());
    }
}
