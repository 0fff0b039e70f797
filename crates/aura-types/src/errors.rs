//! # Error Types
//!
//! Store-level errors shared by the item and deal repositories.

use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-index collision (e.g. payment memo).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The backing store is unreachable or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Row contents could not be decoded into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True when retrying with a different unique key could succeed.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        assert!(StoreError::UniqueViolation("payment_memo".into()).is_unique_violation());
        assert!(!StoreError::NotFound("x".into()).is_unique_violation());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Unavailable("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
