//! Errors raised by the content repository and its adapters.
//!
//! Conversion-specific failures (file I/O, commit failures) have their own
//! error type in the conversion engine, which wraps this one.

/// Error returned by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record, version or blob does not exist.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The underlying store failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The request can never succeed as given, e.g. writing a blob to a
    /// record without a binary field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A conditional edit found the fields changed since they were read.
    #[error("Edit conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying after re-reading the fields could succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type alias using the repository Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::not_found("master:{42}").to_string(),
            "Item not found: master:{42}"
        );
        assert_eq!(
            Error::database("disk I/O error").to_string(),
            "Database error: disk I/O error"
        );
        assert_eq!(
            Error::invalid_input("no binary field").to_string(),
            "Invalid input: no binary field"
        );
        assert_eq!(
            Error::conflict("blob was replaced").to_string(),
            "Edit conflict: blob was replaced"
        );
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(Error::conflict("stale").is_conflict());
        assert!(!Error::database("locked").is_conflict());
    }
}
