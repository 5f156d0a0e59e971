use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller combined mutually exclusive options or supplied unusable numbers
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Referenced marker, technology or result does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The range index references a result the primary store does not hold
    #[error("Index drift: {0}")]
    IndexDrift(String),

    /// The backing store could not be reached
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes surfaced to the calling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    BadRequest,
    NotFound,
    Connectivity,
    Internal,
}

impl AppError {
    /// Get the error class for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => ErrorCategory::BadRequest,
            AppError::NotFound(_) | AppError::IndexDrift(_) => ErrorCategory::NotFound,
            AppError::Connectivity(_) => ErrorCategory::Connectivity,
            AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::IndexDrift(_) => "INDEX_DRIFT",
            AppError::Connectivity(_) => "CONNECTIVITY_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Conversion from redis::RedisError
impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            AppError::Connectivity(err.to_string())
        } else {
            AppError::Internal(format!("Redis command failed: {}", err))
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from serde_yaml::Error
impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            AppError::BadRequest("test".to_string()).category(),
            ErrorCategory::BadRequest
        );
        assert_eq!(
            AppError::NotFound("test".to_string()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AppError::IndexDrift("test".to_string()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AppError::Connectivity("test".to_string()).category(),
            ErrorCategory::Connectivity
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::BadRequest("test".to_string()).error_code(),
            "BAD_REQUEST"
        );
        // Drift shares the not-found class but keeps its own code
        assert_eq!(
            AppError::IndexDrift("test".to_string()).error_code(),
            "INDEX_DRIFT"
        );
        assert_ne!(
            AppError::IndexDrift("x".to_string()).error_code(),
            AppError::NotFound("x".to_string()).error_code()
        );
    }
}
