//! Pooled one-shot backend.
//!
//! Sounds are decoded up front and every `play` spawns a fresh instance from
//! the first frame. Up to `max_streams` instances mix at once; the oldest is
//! evicted beyond that. Pitch is a direct playback rate clamped to the
//! configured range, and the play position cannot be moved.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{MixerCommand, OutputDevice, SampleBuffer, Voice, VoiceState};
use crate::config::{DirectRateConfig, OutputConfig};
use crate::control::{ChannelGains, PitchMode};
use crate::error::BackendError;

use super::{
    AudioBackend, BackendCapabilities, BackendEvent, EventSink, EventSinkSlot, SoundHandle,
};

struct PooledSound {
    buffer: Arc<SampleBuffer>,
    looping: bool,
}

pub struct PooledBackend {
    output: OutputDevice,
    sounds: HashMap<SoundHandle, PooledSound>,
    sink: EventSinkSlot,
    direct_rate: DirectRateConfig,
}

impl PooledBackend {
    pub fn new(
        output_config: &OutputConfig,
        max_streams: usize,
        direct_rate: DirectRateConfig,
    ) -> Result<Self, BackendError> {
        let direct_rate = direct_rate.sanitized();
        let sink = EventSinkSlot::new();
        let output = OutputDevice::open(output_config, max_streams, sink.clone())?;
        log::info!(
            "[PooledBackend] Ready: max_streams={}, rate range {}..={}",
            max_streams,
            direct_rate.min,
            direct_rate.max
        );
        Ok(Self {
            output,
            sounds: HashMap::new(),
            sink,
            direct_rate,
        })
    }

    fn sound(&self, handle: SoundHandle) -> Result<&PooledSound, BackendError> {
        self.sounds
            .get(&handle)
            .ok_or(BackendError::UnknownHandle { handle: handle.id() })
    }

    fn send_for(&mut self, handle: SoundHandle, command: MixerCommand) -> Result<(), BackendError> {
        self.sound(handle)?;
        self.output.send(command)
    }
}

impl AudioBackend for PooledBackend {
    fn name(&self) -> &'static str {
        "pooled"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            can_seek: false,
            pitch_mode: PitchMode::DirectRate {
                min: self.direct_rate.min,
                max: self.direct_rate.max,
            },
            restarts_on_play: true,
        }
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.sink.install(sink);
    }

    fn acquire(&mut self, path: &Path) -> Result<SoundHandle, BackendError> {
        let buffer = SampleBuffer::from_wav(path)?;
        let handle = SoundHandle::next();
        log::debug!(
            "[PooledBackend] Acquired {} as {} ({} frames)",
            path.display(),
            handle,
            buffer.frames()
        );
        self.sounds.insert(
            handle,
            PooledSound {
                buffer: Arc::new(buffer),
                looping: false,
            },
        );
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
        let sound = self.sound(handle)?;
        let rate = rate.clamp(self.direct_rate.min, self.direct_rate.max);
        let voice = Voice::new(handle, Arc::clone(&sound.buffer), VoiceState::Playing)
            .with_gains(gains)
            .with_rate(rate)
            .with_looping(sound.looping)
            .one_shot();
        self.output.send(MixerCommand::Spawn(Box::new(voice)))
    }

    fn pause(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::Pause(handle))
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::Remove(handle))
    }

    fn seek(&mut self, handle: SoundHandle, _position: Duration) -> Result<(), BackendError> {
        self.sound(handle)?;
        Err(BackendError::Unsupported {
            operation: "seek".to_string(),
        })
    }

    fn set_gains(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
    ) -> Result<(), BackendError> {
        self.send_for(handle, MixerCommand::SetGains { handle, gains })
    }

    fn set_rate(&mut self, handle: SoundHandle, rate: f32) -> Result<(), BackendError> {
        let rate = rate.clamp(self.direct_rate.min, self.direct_rate.max);
        self.send_for(handle, MixerCommand::SetRate { handle, rate })
    }

    fn set_looping(&mut self, handle: SoundHandle, looping: bool) -> Result<(), BackendError> {
        let sound = self
            .sounds
            .get_mut(&handle)
            .ok_or(BackendError::UnknownHandle { handle: handle.id() })?;
        sound.looping = looping;
        self.output.send(MixerCommand::SetLooping { handle, looping })
    }

    fn duration(&self, handle: SoundHandle) -> Option<Duration> {
        self.sounds.get(&handle).map(|sound| sound.buffer.duration())
    }

    /// Instances are fire-and-forget, so no position is tracked.
    fn position(&self, _handle: SoundHandle) -> Option<Duration> {
        None
    }

    fn shutdown(&mut self) {
        for handle in self.sounds.keys() {
            let _ = self.output.send(MixerCommand::Remove(*handle));
        }
        self.sounds.clear();
        self.sink.clear();
        self.output.close();
        log::info!("[PooledBackend] Shut down");
    }
}
