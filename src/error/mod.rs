// Error types for the audio player
//
// This module defines custom error types for player control and backend
// operations, providing structured error handling with numeric error codes.

mod backend;
mod player;

pub use backend::{log_backend_error, BackendError, BackendErrorCodes};
pub use player::{log_player_error, PlayerError, PlayerErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling for
/// callers that only see a code across a binding boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
