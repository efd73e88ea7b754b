use serde::{Deserialize, Serialize};

use crate::control::DEFAULT_PITCH_FACTOR;
use crate::engine::backend::SoundHandle;

/// Lifecycle of the sound owned by one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Unloaded,
    Loaded,
    Playing,
    Paused,
    Stopped,
    /// Terminal
    Disposed,
}

impl Lifecycle {
    /// States that hold a backend handle.
    pub fn holds_handle(self) -> bool {
        matches!(
            self,
            Lifecycle::Loaded | Lifecycle::Playing | Lifecycle::Paused | Lifecycle::Stopped
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, Lifecycle::Playing | Lifecycle::Paused)
    }
}

/// Everything a player remembers between calls.
///
/// Volume, balance and pitch are stored exactly as written; consumers clamp
/// when they derive backend parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub lifecycle: Lifecycle,
    pub volume: f64,
    pub balance: f64,
    /// Raw value of the last pitch request, `None` until one is made
    pub pitch_request: Option<f32>,
    pub loaded_handle: Option<SoundHandle>,
    pub base_tempo: Option<f32>,
    pub looping: bool,
    /// Backend reported load completion for the current handle
    pub ready: bool,
}

impl PlayerState {
    pub fn new(volume: f64, balance: f64) -> Self {
        Self {
            lifecycle: Lifecycle::Unloaded,
            volume,
            balance,
            pitch_request: None,
            loaded_handle: None,
            base_tempo: None,
            looping: false,
            ready: false,
        }
    }

    pub fn pitch_factor(&self) -> f32 {
        self.pitch_request.unwrap_or(DEFAULT_PITCH_FACTOR)
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }
}
