//! Service-level errors.

use skillmatrix_core::CoreError;
use skillmatrix_storage::StorageError;

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Typed failure returned to the UI caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing input or illegal transition; nothing was changed
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced rating, goal, notification or skill does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Actor is not allowed to perform the action
    #[error("not allowed: {0}")]
    Forbidden(String),

    /// The store rejected or failed the write; safe to retry
    #[error("persistence failed: {0}")]
    Persistence(StorageError),
}

impl ServiceError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Persistence(_))
    }
}

impl From<CoreError> for ServiceError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => ServiceError::Validation(msg),
            CoreError::NotFound(msg) => ServiceError::NotFound(msg),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            // A record that breaks a model invariant fails the same way on retry.
            StorageError::Invalid(core) => core.into(),
            other => ServiceError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_is_not_retryable() {
        let err = ServiceError::from(StorageError::Invalid(CoreError::validation("goal is completed at 33%")));
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_failures_are_retryable() {
        let err = ServiceError::from(StorageError::Other("store is not accepting writes".into()));
        assert!(matches!(err, ServiceError::Persistence(_)));
        assert!(err.is_retryable());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(ServiceError::from(StorageError::from(io)).is_retryable());
    }
}
