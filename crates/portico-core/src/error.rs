//! Unified error types for Portico.

use thiserror::Error;

/// Result type alias using PorticoError.
pub type Result<T> = std::result::Result<T, PorticoError>;

#[derive(Error, Debug)]
pub enum PorticoError {
    // Caller-side errors, detected locally before any dispatch
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Invalid options: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Bridge errors
    #[error("Bridge transport failure: {0}")]
    Transport(String),

    #[error("Native rejection: {0}")]
    NativeRejection(String),

    // Store errors
    #[error("Storage backend error: {0}")]
    Storage(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PorticoError {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn native(msg: impl Into<String>) -> Self {
        Self::NativeRejection(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PorticoError::Transport("executor gone".into());
        assert!(err.to_string().contains("executor gone"));
    }

    #[test]
    fn test_error_constructors() {
        let e1 = PorticoError::argument("bad flag");
        assert!(matches!(e1, PorticoError::Argument(_)));

        let e2 = PorticoError::validation("missing title");
        assert!(matches!(e2, PorticoError::Validation(_)));

        let e3 = PorticoError::not_found("alarm 'x'");
        assert!(matches!(e3, PorticoError::NotFound(_)));

        let e4 = PorticoError::native("boom");
        assert!(matches!(e4, PorticoError::NativeRejection(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PorticoError = io_err.into();
        assert!(matches!(err, PorticoError::Io(_)));
    }
}
