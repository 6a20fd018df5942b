//! Unified error types for the domain layer
//!
//! Provides a common error type usable across all manager operations,
//! enabling consistent error handling without forcing callers to use
//! String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A record addressed by key does not exist in the session
    #[error("Not found: {entity_type} with key {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    /// A mutation would break a domain invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A query or mutation crossed a session boundary (programmer bug)
    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    /// Caller supplied malformed input (bad key, out-of-range value)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parse error for value objects
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            key: key.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a scope violation error
    pub fn scope(msg: impl Into<String>) -> Self {
        Self::ScopeViolation(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = DomainError::not_found("Entity", "bartender_001");
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(err.to_string().contains("Entity"));
        assert!(err.to_string().contains("bartender_001"));
    }

    #[test]
    fn test_invariant_error() {
        let err = DomainError::invariant("item cannot be both held and stored");
        assert_eq!(
            err.to_string(),
            "Invariant violation: item cannot be both held and stored"
        );
    }

    #[test]
    fn test_invalid_input_error() {
        let err = DomainError::invalid_input("key must match [a-z0-9_]+");
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
