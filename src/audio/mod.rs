// Audio module - decoding, voice rendering and the shared output device

pub mod decode;
pub mod mixer;
pub mod output;
pub mod voice;

pub use decode::SampleBuffer;
pub use mixer::{Mixer, MixerCommand, MixerEvent};
pub use output::OutputDevice;
pub use voice::{PositionCursor, RenderOutcome, Voice, VoiceState};
