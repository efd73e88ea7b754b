// Player error types and constants

use crate::error::{BackendError, ErrorCode};
use log::error;
use std::fmt;

/// Player error code constants
///
/// Error code range: 1001-1006
pub struct PlayerErrorCodes {}

impl PlayerErrorCodes {
    /// Backend rejected the source (missing, unsupported format, exhaustion)
    pub const LOAD_FAILED: i32 = 1001;

    /// Ratio-mode pitch requested without a usable base tempo
    pub const INVALID_CONFIGURATION: i32 = 1002;

    /// Call on a disposed player or a no-op transition
    pub const OPERATION_IGNORED: i32 = 1003;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1004;

    /// Backend failed while executing a control primitive
    pub const BACKEND: i32 = 1005;

    /// Caching a stream source to a temporary file failed
    pub const CACHE_FAILED: i32 = 1006;
}

/// Log a player error with structured context
///
/// Used on every path that swallows an error instead of returning it
/// (fire-and-forget control calls and teardown).
pub fn log_player_error(err: &PlayerError, context: &str) {
    error!(
        "Player error in {}: code={}, component=Player, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by the player facade and the playback state machine
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// Backend rejected acquisition of the source
    LoadFailed { source: String, reason: String },

    /// Ratio-mode pitch requested without a base tempo
    InvalidConfiguration { reason: String },

    /// Operation was accepted but had no effect
    OperationIgnored { operation: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Backend failed while executing a control primitive
    Backend { details: String },

    /// Stream source could not be cached to disk
    CacheFailed { reason: String },
}

impl ErrorCode for PlayerError {
    fn code(&self) -> i32 {
        match self {
            PlayerError::LoadFailed { .. } => PlayerErrorCodes::LOAD_FAILED,
            PlayerError::InvalidConfiguration { .. } => PlayerErrorCodes::INVALID_CONFIGURATION,
            PlayerError::OperationIgnored { .. } => PlayerErrorCodes::OPERATION_IGNORED,
            PlayerError::LockPoisoned { .. } => PlayerErrorCodes::LOCK_POISONED,
            PlayerError::Backend { .. } => PlayerErrorCodes::BACKEND,
            PlayerError::CacheFailed { .. } => PlayerErrorCodes::CACHE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            PlayerError::LoadFailed { source, reason } => {
                format!("Failed to load {}: {}", source, reason)
            }
            PlayerError::InvalidConfiguration { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            PlayerError::OperationIgnored { operation } => {
                format!("Operation ignored: {}", operation)
            }
            PlayerError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            PlayerError::Backend { details } => format!("Backend error: {}", details),
            PlayerError::CacheFailed { reason } => {
                format!("Failed to cache audio stream: {}", reason)
            }
        }
    }
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlayerError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PlayerError {}

impl From<BackendError> for PlayerError {
    fn from(err: BackendError) -> Self {
        PlayerError::Backend {
            details: err.message(),
        }
    }
}
