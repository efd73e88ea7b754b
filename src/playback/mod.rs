//! Playback control core: player state, sources and the lifecycle machine.

pub mod machine;
pub mod source;
pub mod state;

pub use machine::PlaybackStateMachine;
pub use source::{SoundSource, SourceCache};
pub use state::{Lifecycle, PlayerState};
