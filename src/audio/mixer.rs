//! Software mixer running inside the output callback.
//!
//! The control side never touches voices directly: it pushes
//! [`MixerCommand`]s through a lock-free queue, and the mixer reports
//! natural completions back through a second queue. Voices leaving the mix
//! go out through a third queue so their buffers are freed off the callback.

use rtrb::{Consumer, Producer, PushError};

use crate::control::ChannelGains;
use crate::engine::backend::SoundHandle;

use super::voice::{RenderOutcome, Voice};

/// Control → callback command.
pub enum MixerCommand {
    /// Add a voice, replacing every voice of the same handle
    Spawn(Box<Voice>),
    Resume(SoundHandle),
    Pause(SoundHandle),
    /// Pause and return to the first frame
    Rewind(SoundHandle),
    /// Drop every voice of the handle
    Remove(SoundHandle),
    Seek { handle: SoundHandle, frame: f64 },
    SetGains { handle: SoundHandle, gains: ChannelGains },
    SetRate { handle: SoundHandle, rate: f32 },
    SetLooping { handle: SoundHandle, looping: bool },
}

/// Callback → control notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerEvent {
    /// Voice of the handle reached its end
    Finished(SoundHandle),
}

pub struct Mixer {
    voices: Vec<Box<Voice>>,
    max_voices: usize,
    commands: Consumer<MixerCommand>,
    events: Producer<MixerEvent>,
    garbage: Producer<Box<Voice>>,
}

impl Mixer {
    pub fn new(
        max_voices: usize,
        commands: Consumer<MixerCommand>,
        events: Producer<MixerEvent>,
        garbage: Producer<Box<Voice>>,
    ) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: Vec::with_capacity(max_voices),
            max_voices,
            commands,
            events,
            garbage,
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[Box<Voice>] {
        &self.voices
    }

    /// Apply every queued command.
    pub fn apply_pending(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Spawn(voice) => {
                let handle = voice.handle();
                self.discard_where(|existing| existing.handle() == handle);
                if self.voices.len() >= self.max_voices {
                    // Oldest instance gives up its slot
                    let oldest = self.voices.remove(0);
                    self.recycle(oldest);
                }
                self.voices.push(voice);
            }
            MixerCommand::Resume(handle) => self.for_handle(handle, Voice::resume),
            MixerCommand::Pause(handle) => self.for_handle(handle, Voice::pause),
            MixerCommand::Rewind(handle) => self.for_handle(handle, Voice::rewind),
            MixerCommand::Remove(handle) => self.discard_where(|voice| voice.handle() == handle),
            MixerCommand::Seek { handle, frame } => {
                self.for_handle(handle, |voice| voice.seek(frame))
            }
            MixerCommand::SetGains { handle, gains } => {
                self.for_handle(handle, |voice| voice.set_gains(gains))
            }
            MixerCommand::SetRate { handle, rate } => {
                self.for_handle(handle, |voice| voice.set_rate(rate))
            }
            MixerCommand::SetLooping { handle, looping } => {
                self.for_handle(handle, |voice| voice.set_looping(looping))
            }
        }
    }

    fn for_handle<F>(&mut self, handle: SoundHandle, mut action: F)
    where
        F: FnMut(&mut Voice),
    {
        self.voices
            .iter_mut()
            .filter(|voice| voice.handle() == handle)
            .for_each(|voice| action(&mut **voice));
    }

    /// Move matching voices out of the mix, preserving the order of the rest.
    fn discard_where<F>(&mut self, matches: F)
    where
        F: Fn(&Voice) -> bool,
    {
        let mut index = 0;
        while index < self.voices.len() {
            if matches(&*self.voices[index]) {
                let voice = self.voices.remove(index);
                self.recycle(voice);
            } else {
                index += 1;
            }
        }
    }

    /// Hand a voice to the relay thread for freeing.
    fn recycle(&mut self, voice: Box<Voice>) {
        if let Err(PushError::Full(voice)) = self.garbage.push(voice) {
            // Queue full: free here rather than grow it
            drop(voice);
        }
    }

    /// Fill an interleaved output buffer.
    pub fn render(&mut self, out: &mut [f32], channels: usize, device_rate: u32) {
        self.apply_pending();
        out.fill(0.0);

        for index in 0..self.voices.len() {
            if self.voices[index].render(out, channels, device_rate) != RenderOutcome::Finished {
                continue;
            }
            let handle = self.voices[index].handle();
            // A full queue only loses the notification, never audio
            let _ = self.events.push(MixerEvent::Finished(handle));
        }

        self.discard_where(Voice::is_spent);

        for sample in out.iter_mut() {
            *sample = if sample.is_finite() {
                sample.clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }
}
