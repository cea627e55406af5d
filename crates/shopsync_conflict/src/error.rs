//! Error types for conflict resolution.

use thiserror::Error;

/// Result type for conflict operations.
pub type ConflictResult<T> = Result<T, ConflictError>;

/// Errors that can occur while resolving a conflict.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The user dismissed the manual-resolution prompt without choosing.
    ///
    /// The conflict stays open; the associated update must not be retried
    /// automatically until a choice is made.
    #[error("conflict left unresolved")]
    Unresolved,

    /// Manual strategy is active but no presenter is installed.
    #[error("no presenter installed for manual resolution")]
    NoPresenter,

    /// The presenter failed to show the conflict.
    #[error("presenter error: {0}")]
    Presenter(String),

    /// A strategy name did not parse.
    #[error("unknown resolution strategy: {0}")]
    UnknownStrategy(String),
}

impl ConflictError {
    /// Returns true when the conflict is still open and may be resolved
    /// later (as opposed to a configuration problem).
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ConflictError::Unresolved | ConflictError::NoPresenter)
    }
}
