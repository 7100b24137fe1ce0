// Error taxonomy for the observation tracker
//
// Kinds of failure that reach a caller:
//   1. Validation   - bad input, rejected before the store is touched
//   2. Unauthorized - access code mismatch, rejected before any mutation
//   3. NotFound     - a referenced observation does not exist
//   4. Store        - SQLite failures, propagated verbatim (no retry)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObservationError {
    /// Request input failed validation (missing field, bad date, empty id set...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Access code did not match the configured one
    #[error("Invalid code")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Event store failure
    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    /// Document rendering failure
    #[error("Render error: {0}")]
    Render(String),
}

impl ObservationError {
    pub fn validation(message: impl Into<String>) -> Self {
        ObservationError::Validation(message.into())
    }

    /// True for errors caused by the caller's request rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ObservationError::Validation(_)
                | ObservationError::Unauthorized
                | ObservationError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ObservationError>;
