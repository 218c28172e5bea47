//! Centralized error types for the wardkit workspace.

use crate::types::PropertyKey;
use thiserror::Error;

/// Top-level error enum. Every variant is a usage error: the library returns
/// them to the caller and never logs or swallows them.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum WardError {
    #[error("Invalid ward configuration shape: {0}")]
    InvalidConfigShape(String),

    #[error("Child ward `{key}` must hold an object")]
    ChildNotWardable { key: PropertyKey },

    #[error("TypeError: cannot assign to warded property `{key}`")]
    ProtectedWriteRejected { key: PropertyKey },

    #[error("Invalid ward.try operation: {0}")]
    InvalidTryOperation(String),

    #[error("Invalid ward.try arguments: {0}")]
    InvalidTryArguments(String),

    #[error("TypeError: `{key}` is not a callable method")]
    NotCallable { key: PropertyKey },
}

pub type WardResult<T> = Result<T, WardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_write_reads_like_a_type_error() {
        let err = WardError::ProtectedWriteRejected {
            key: "contents".into(),
        };
        assert_eq!(
            err.to_string(),
            "TypeError: cannot assign to warded property `contents`"
        );
    }
}
