//! Streaming backend with a rate stage.
//!
//! Each acquired sound owns exactly one voice, parked at acquire time.
//! `play` resumes it where it paused, `stop` rewinds it, and the rate stage
//! scales the step by the ratio computed from the base tempo. The voice
//! publishes its position so `position`/`seek` work in real time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::voice::{new_cursor, read_cursor};
use crate::audio::{MixerCommand, OutputDevice, PositionCursor, SampleBuffer, Voice, VoiceState};
use crate::config::OutputConfig;
use crate::control::{ChannelGains, PitchMode};
use crate::error::BackendError;

use super::{
    AudioBackend, BackendCapabilities, BackendEvent, EventSink, EventSinkSlot, SoundHandle,
};

/// A streamed sound keeps a single voice, so one slot per handle is enough.
const VOICES_PER_SOUND: usize = 1;
const MAX_SOUNDS: usize = 16;

struct StreamedSound {
    duration: Duration,
    sample_rate: u32,
    cursor: PositionCursor,
}

pub struct StreamingBackend {
    output: OutputDevice,
    sounds: HashMap<SoundHandle, StreamedSound>,
    sink: EventSinkSlot,
}

impl StreamingBackend {
    pub fn new(output_config: &OutputConfig) -> Result<Self, BackendError> {
        let sink = EventSinkSlot::new();
        let output = OutputDevice::open(
            output_config,
            MAX_SOUNDS * VOICES_PER_SOUND,
            sink.clone(),
        )?;
        log::info!("[StreamingBackend] Ready");
        Ok(Self {
            output,
            sounds: HashMap::new(),
            sink,
        })
    }

    fn sound(&self, handle: SoundHandle) -> Result<&StreamedSound, BackendError> {
        self.sounds
            .get(&handle)
            .ok_or(BackendError::UnknownHandle { handle: handle.id() })
    }

    fn send_for(&mut self, handle: SoundHandle, command: MixerCommand) -> Result<(), BackendError> {
        self.sound(handle)?;
        self.output.send(command)
    }
}

impl AudioBackend for StreamingBackend {
    fn name(&self) -> &'static str {
        "streaming"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            can_seek: true,
            pitch_mode: PitchMode::Ratio,
            restarts_on_play: false,
        }
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.sink.install(sink);
    }

    fn acquire(&mut self, path: &Path) -> Result<SoundHandle, BackendError> {
        let buffer = Arc::new(SampleBuffer::from_wav(path)?);
        let handle = SoundHandle::next();
        let cursor = new_cursor();
        let sound = StreamedSound {
            duration: buffer.duration(),
            sample_rate: buffer.sample_rate(),
            cursor: Arc::clone(&cursor),
        };

        let voice = Voice::new(handle, buffer, VoiceState::Paused).with_cursor(cursor);
        self.output.send(MixerCommand::Spawn(Box::new(voice)))?;
        self.sounds.insert(handle, sound);

        log::debug!("[StreamingBackend] Acquired {} as {}", path.display(), handle);
        self.output.notify(BackendEvent::LoadComplete(handle));
        Ok(handle)
    }

    fn release(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.sounds
            .remove(&handle)
            .ok_or(BackendError::UnknownHandle { handle: handle.id() })?;
        self.output.send(MixerCommand::Remove(handle))
    }

    fn play(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
        rate: f32,
    ) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::SetGains { handle, gains })?;
        self.output.send(MixerCommand::SetRate { handle, rate })?;
        self.output.send(MixerCommand::Resume(handle))
    }

    fn pause(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::Pause(handle))
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::Rewind(handle))
    }

    fn seek(&mut self, handle: SoundHandle, position: Duration) -> Result<(), BackendError> {
        let sound = self.sound(handle)?;
        let frame = position.min(sound.duration).as_secs_f64() * sound.sample_rate as f64;
        self.output.send(MixerCommand::Seek { handle, frame })
    }

    fn set_gains(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
    ) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::SetGains { handle, gains })
    }

    fn set_rate(&mut self, handle: SoundHandle, rate: f32) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::SetRate { handle, rate })
    }

    fn set_looping(&mut self, handle: SoundHandle, looping: bool) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::SetLooping { handle, looping })
    }

    fn duration(&self, handle: SoundHandle) -> Option<Duration> {
        self.sounds.get(&handle).map(|sound| sound.duration)
    }

    fn position(&self, handle: SoundHandle) -> Option<Duration> {
        self.sounds.get(&handle).map(|sound| {
            let seconds = read_cursor(&sound.cursor) / sound.sample_rate as f64;
            Duration::from_secs_f64(seconds.max(0.0)).min(sound.duration)
        })
    }

    fn shutdown(&mut self) {
        for handle in self.sounds.keys() {
            let _ = self.output.send(MixerCommand::Remove(*handle));
        }
        self.sounds.clear();
        self.sink.clear();
        self.output.close();
        log::info!("[StreamingBackend] Shut down");
    }
}
