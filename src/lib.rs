// Simple Audio Player - playback control core
// Lifecycle state machine, constant-power gains and pitch control over
// interchangeable audio backends

// Module declarations
pub mod audio;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod events;
pub mod playback;
pub mod player;

// Re-exports for convenience
pub use config::{BackendKind, PlayerConfig};
pub use control::{compute_gains, compute_rate, ChannelGains, PitchMode};
pub use engine::backend::{
    AudioBackend, BackendCall, BackendCapabilities, BackendEvent, SoundHandle, StubBackend,
    StubProbe,
};
pub use error::{ErrorCode, PlayerError};
pub use events::{EndReason, ListenerId, PlaybackEnded};
pub use playback::{Lifecycle, PlayerState, SoundSource};
pub use player::Player;
