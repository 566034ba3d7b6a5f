//! Error types for the rule engine

use thiserror::Error;

/// Errors that can occur in the rule engine
#[derive(Error, Debug)]
pub enum RuleError {
    /// Rule not found in the registry
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// Rule failed structural validation
    #[error("Rule validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Custom logic expression could not be parsed
    #[error("Invalid custom logic: {0}")]
    InvalidCustomLogic(String),

    /// Custom logic references a condition the rule does not have
    #[error("Custom logic references unknown condition: {0}")]
    UnknownConditionReference(String),

    /// Operator the evaluator has no semantics for
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// `matches` pattern is not a valid regular expression
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Import payload is neither an export envelope nor a list of rules
    #[error("Invalid import payload: {0}")]
    InvalidPayload(String),

    /// IO error (interchange files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for rule engine operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Error raised by an injected action handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
