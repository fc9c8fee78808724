//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// The message of server-side variants is shown to clients, so it must stay
/// generic. Diagnostic detail belongs in logs.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request was well-formed but the operation was refused.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeds the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A dependency is not ready to serve.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The object store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::ServiceUnavailable(_) => 503,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::BadRequest(msg)
            | Self::PayloadTooLarge(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Storage(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::BadRequest(String::new()), 400, "BAD_REQUEST")]
    #[case(AppError::PayloadTooLarge(String::new()), 413, "PAYLOAD_TOO_LARGE")]
    #[case(AppError::ServiceUnavailable(String::new()), 503, "SERVICE_UNAVAILABLE")]
    #[case(AppError::Storage(String::new()), 500, "STORAGE_ERROR")]
    #[case(AppError::Internal(String::new()), 500, "INTERNAL_ERROR")]
    fn test_error_mapping(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(
            AppError::BadRequest("msg".into()).to_string(),
            "Bad request: msg"
        );
        assert_eq!(
            AppError::ServiceUnavailable("msg".into()).to_string(),
            "Service unavailable: msg"
        );
        assert_eq!(
            AppError::Storage("msg".into()).to_string(),
            "Storage error: msg"
        );
        assert_eq!(
            AppError::Internal("msg".into()).to_string(),
            "Internal error: msg"
        );
    }

    #[test]
    fn test_message_is_payload_only() {
        assert_eq!(AppError::Storage("Storage operation failed".into()).message(), "Storage operation failed");
    }
}
