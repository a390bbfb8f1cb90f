//! Errors raised by model-level rules.

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised when a rule of the data model is violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A required input is missing or a transition is not allowed
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl CoreError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a missing entity.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
