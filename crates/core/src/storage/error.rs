//! Storage error types.

use thiserror::Error;

use filegate_shared::AppError;

/// Storage operation errors.
///
/// Every failure coming out of the object-store client is classified into
/// one of these variants before it leaves the storage module.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable, timed out, or the response could not be read.
    #[error("storage backend unavailable: {0}")]
    StorageUnavailable(String),

    /// Backend answered with a domain error (e.g. invalid bucket name).
    #[error("storage backend rejected the request ({code}): {message}")]
    BackendRejected {
        /// Error code reported by the backend.
        code: String,
        /// Error message reported by the backend.
        message: String,
    },

    /// A presigned URL could not be produced.
    #[error("object not accessible: {0}")]
    ObjectNotAccessible(String),

    /// Request input is unusable. Never reaches the backend.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The caller cancelled the in-flight call.
    #[error("storage call cancelled")]
    Cancelled,
}

impl StorageError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a backend rejection error.
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an object not accessible error.
    #[must_use]
    pub fn not_accessible(msg: impl Into<String>) -> Self {
        Self::ObjectNotAccessible(msg.into())
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    /// Short, stable name of the variant for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::BackendRejected { .. } => "backend_rejected",
            Self::ObjectNotAccessible(_) => "object_not_accessible",
            Self::InputInvalid(_) => "input_invalid",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Client-facing conversion. Only input errors keep their message.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InputInvalid(msg) => Self::Validation(msg),
            StorageError::StorageUnavailable(_)
            | StorageError::BackendRejected { .. }
            | StorageError::ObjectNotAccessible(_) => {
                Self::Storage("Storage operation failed".to_string())
            }
            StorageError::Cancelled => Self::Internal("Request cancelled".to_string()),
        }
    }
}
