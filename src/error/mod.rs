//! Error module for weakbus
//!
//! This module defines the error types and codes used by the message bus,
//! its configuration layer and the demo clients.

use thiserror::Error;
use std::fmt;

use crate::weakbus::types::HandlerError;

/// Error code of a bus failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Dispatch errors (0x01-0x10)
    HandlerFailed = 0x01,

    // System errors (0x11-0x20)
    ConfigInvalid = 0x11,
}

impl ErrorCode {
    /// Get the error code category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HandlerFailed => ErrorCategory::Dispatch,
            Self::ConfigInvalid => ErrorCategory::System,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HandlerFailed => "HANDLER_FAILED",
            Self::ConfigInvalid => "CONFIG_INVALID",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Dispatch,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch => write!(f, "Dispatch"),
            Self::System => write!(f, "System"),
        }
    }
}

/// Main error type for weakbus
#[derive(Error, Debug)]
pub enum BusError {
    #[error("{code}: {message}")]
    Standard {
        code: ErrorCode,
        message: String,
    },

    /// A subscriber handler failed while a message of `topic` was published.
    /// The handler's own error is kept as the source.
    #[error("handler for topic {topic} failed: {source}")]
    Handler {
        topic: &'static str,
        #[source]
        source: HandlerError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    /// Create a new standard error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Standard {
            code,
            message: message.into(),
        }
    }

    /// Wrap an error raised by a subscriber of `topic`
    pub fn handler(topic: &'static str, source: HandlerError) -> Self {
        Self::Handler { topic, source }
    }

    /// Get the error code, if the error carries one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Standard { code, .. } => Some(*code),
            Self::Handler { .. } => Some(ErrorCode::HandlerFailed),
            _ => None,
        }
    }

    /// Returns the handler's original error for `Handler` failures
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for weakbus operations
pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_code_categories() {
        assert_eq!(ErrorCode::HandlerFailed.category(), ErrorCategory::Dispatch);
        assert_eq!(ErrorCode::ConfigInvalid.category(), ErrorCategory::System);
        assert_eq!(ErrorCode::ConfigInvalid.to_string(), "CONFIG_INVALID (0x11)");
    }

    #[test]
    fn handler_error_keeps_source() {
        let err = BusError::handler("demo::Ping", "boom".into());
        assert_eq!(err.code(), Some(ErrorCode::HandlerFailed));
        assert_eq!(err.to_string(), "handler for topic demo::Ping failed: boom");
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
        assert_eq!(err.handler_source().map(|s| s.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn standard_error_display() {
        let err = BusError::new(ErrorCode::ConfigInvalid, "bad policy");
        assert_eq!(err.to_string(), "CONFIG_INVALID (0x11): bad policy");
        assert!(err.handler_source().is_none());
    }

    #[test]
    fn io_error_has_no_code() {
        let err = BusError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(matches!(err, BusError::Io(_)));
        assert_eq!(err.code(), None);
    }
}
