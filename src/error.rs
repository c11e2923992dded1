//! Error types for the feed poller.

use thiserror::Error;

/// Common error type for the feed poller.
#[derive(Error, Debug)]
pub enum PollerError {
    /// Database error.
    ///
    /// Wraps errors from whichever sqlx backend is compiled in.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feed could not be fetched or parsed.
    #[error("feed error: {0}")]
    Feed(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Change-detection cache backend error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Output sink delivery error.
    #[error("sink error: {0}")]
    Sink(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for loaded data.
    #[error("validation error: {0}")]
    Validation(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for PollerError {
    fn from(e: sqlx::Error) -> Self {
        PollerError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for PollerError {
    fn from(e: reqwest::Error) -> Self {
        PollerError::Http(e.to_string())
    }
}

/// Result type alias for poller operations.
pub type Result<T> = std::result::Result<T, PollerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_display() {
        let err = PollerError::Feed("unexpected end of document".to_string());
        assert_eq!(err.to_string(), "feed error: unexpected end of document");
    }

    #[test]
    fn test_cache_error_display() {
        let err = PollerError::Cache("connection refused".to_string());
        assert_eq!(err.to_string(), "cache error: connection refused");
    }

    #[test]
    fn test_validation_error_display() {
        let err = PollerError::Validation("source has no name".to_string());
        assert_eq!(err.to_string(), "validation error: source has no name");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PollerError = io_err.into();
        assert!(matches!(err, PollerError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: PollerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PollerError::Database(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(PollerError::Config("no sources".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
