//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The response could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] shopsync_store::StoreError),

    /// Conflict resolution failed or is still open.
    #[error("conflict error: {0}")]
    Conflict(#[from] shopsync_conflict::ConflictError),

    /// Not connected to the server.
    #[error("not connected to server")]
    NotConnected,

    /// The request timed out.
    #[error("operation timed out")]
    Timeout,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Store(e) => e.is_retryable(),
            SyncError::Timeout | SyncError::NotConnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::NotConnected.is_retryable());
        assert!(!SyncError::Protocol("bad payload".into()).is_retryable());
    }

    #[test]
    fn store_errors_keep_their_classification() {
        let err = SyncError::from(shopsync_store::StoreError::Unavailable("down".into()));
        assert!(err.is_retryable());

        let err = SyncError::from(shopsync_store::StoreError::Locked("/q".into()));
        assert!(!err.is_retryable());
    }
}
