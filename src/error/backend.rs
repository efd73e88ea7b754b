// Audio backend error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Backend error code constants
///
/// Error code range: 2001-2006
pub struct BackendErrorCodes {}

impl BackendErrorCodes {
    /// Source could not be acquired (missing file, bad format, pool exhausted)
    pub const SOURCE_REJECTED: i32 = 2001;

    /// Handle does not refer to a loaded sound
    pub const UNKNOWN_HANDLE: i32 = 2002;

    /// Failed to open the output stream
    pub const STREAM_OPEN_FAILED: i32 = 2003;

    /// Backend does not support the primitive
    pub const UNSUPPORTED: i32 = 2004;

    /// Real-time command queue is full
    pub const QUEUE_FULL: i32 = 2005;

    /// File system or device I/O failed
    pub const IO: i32 = 2006;
}

/// Log a backend error with structured context
pub fn log_backend_error(err: &BackendError, context: &str) {
    error!(
        "Backend error in {}: code={}, component=AudioBackend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by audio backend implementations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Source could not be acquired
    SourceRejected { reason: String },

    /// Handle is not (or no longer) known to the backend
    UnknownHandle { handle: u64 },

    /// Failed to open the output stream
    StreamOpenFailed { reason: String },

    /// Primitive is not supported by this backend
    Unsupported { operation: String },

    /// Real-time command queue is full
    QueueFull,

    /// File system or device I/O failed
    Io { details: String },
}

impl ErrorCode for BackendError {
    fn code(&self) -> i32 {
        match self {
            BackendError::SourceRejected { .. } => BackendErrorCodes::SOURCE_REJECTED,
            BackendError::UnknownHandle { .. } => BackendErrorCodes::UNKNOWN_HANDLE,
            BackendError::StreamOpenFailed { .. } => BackendErrorCodes::STREAM_OPEN_FAILED,
            BackendError::Unsupported { .. } => BackendErrorCodes::UNSUPPORTED,
            BackendError::QueueFull => BackendErrorCodes::QUEUE_FULL,
            BackendError::Io { .. } => BackendErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            BackendError::SourceRejected { reason } => format!("Source rejected: {}", reason),
            BackendError::UnknownHandle { handle } => format!("Unknown sound handle #{}", handle),
            BackendError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            BackendError::Unsupported { operation } => {
                format!("Operation not supported by backend: {}", operation)
            }
            BackendError::QueueFull => "Audio command queue is full".to_string(),
            BackendError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for BackendError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => io.into(),
            other => BackendError::SourceRejected {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_codes() {
        assert_eq!(
            BackendError::SourceRejected {
                reason: "x".to_string()
            }
            .code(),
            2001
        );
        assert_eq!(BackendError::UnknownHandle { handle: 3 }.code(), 2002);
        assert_eq!(BackendError::QueueFull.code(), 2005);
        assert_eq!(
            BackendError::Io {
                details: "x".to_string()
            }
            .code(),
            BackendErrorCodes::IO
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("disk gone");
        let err: BackendError = io_err.into();
        match err {
            BackendError::Io { details } => assert!(details.contains("disk gone")),
            other => panic!("Expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_from_hound_format_error_is_rejection() {
        let err: BackendError = hound::Error::FormatError("no RIFF tag found").into();
        assert!(matches!(err, BackendError::SourceRejected { .. }));
    }

    #[test]
    fn test_unknown_handle_message() {
        let err = BackendError::UnknownHandle { handle: 42 };
        assert_eq!(err.message(), "Unknown sound handle #42");
    }
}
