//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// All variants are retryable from the caller's perspective except
/// [`StoreError::Locked`]: the backing store may come back, so callers
/// should surface the condition and keep their in-memory state consistent
/// rather than treat it as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another process holds the store lock.
    #[error("store directory locked by another process: {0}")]
    Locked(String),
}

impl StoreError {
    /// Returns true if the operation may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Locked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(StoreError::Unavailable("backend down".into()).is_retryable());
        assert!(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk")).is_retryable());
        assert!(!StoreError::Locked("/tmp/q".into()).is_retryable());
    }
}
