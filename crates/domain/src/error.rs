//! Unified error types for the domain layer
//!
//! Aggregates and value objects report invariant violations through
//! [`DomainError`]; the engine maps these onto its own error taxonomy.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects and enum names)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State machine edge not present in the aggregate's transition table
    #[error("Invalid state transition: cannot {action} from {from}")]
    InvalidTransition { from: String, action: String },
}

impl DomainError {
    /// Creates a validation error for malformed input.
    ///
    /// # Example
    /// ```ignore
    /// if reason.trim().is_empty() {
    ///     return Err(DomainError::validation("Reason cannot be empty"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid transition error naming the current state and the
    /// rejected action.
    pub fn invalid_transition(from: impl ToString, action: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }
}
