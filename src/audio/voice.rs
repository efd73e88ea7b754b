//! A single playing (or parked) instance of a sample buffer.
//!
//! Voices live on the audio callback side and are only touched through
//! mixer commands. Rendering is allocation-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::control::ChannelGains;
use crate::engine::backend::SoundHandle;

use super::decode::SampleBuffer;

/// Published play position in source frames, stored as `f64` bits.
pub type PositionCursor = Arc<AtomicU64>;

pub fn new_cursor() -> PositionCursor {
    Arc::new(AtomicU64::new(0f64.to_bits()))
}

pub fn read_cursor(cursor: &PositionCursor) -> f64 {
    f64::from_bits(cursor.load(Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Playing,
    Paused,
}

/// Result of rendering one callback buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Continuing,
    /// Reached the end without looping; the voice is parked at position 0
    Finished,
}

pub struct Voice {
    handle: SoundHandle,
    buffer: Arc<SampleBuffer>,
    position: f64,
    rate: f32,
    gains: ChannelGains,
    looping: bool,
    state: VoiceState,
    /// Removed from the mix once finished instead of parking
    one_shot: bool,
    spent: bool,
    cursor: Option<PositionCursor>,
}

impl Voice {
    pub fn new(handle: SoundHandle, buffer: Arc<SampleBuffer>, state: VoiceState) -> Self {
        Self {
            handle,
            buffer,
            position: 0.0,
            rate: 1.0,
            gains: ChannelGains::SILENT,
            looping: false,
            state,
            one_shot: false,
            spent: false,
            cursor: None,
        }
    }

    pub fn with_gains(mut self, gains: ChannelGains) -> Self {
        self.gains = gains;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    pub fn with_cursor(mut self, cursor: PositionCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn handle(&self) -> SoundHandle {
        self.handle
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == VoiceState::Playing
    }

    /// Finished one-shot voices are dropped by the mixer.
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn resume(&mut self) {
        self.state = VoiceState::Playing;
    }

    pub fn pause(&mut self) {
        self.state = VoiceState::Paused;
    }

    /// Pause and return to the first frame.
    pub fn rewind(&mut self) {
        self.state = VoiceState::Paused;
        self.position = 0.0;
        self.publish();
    }

    pub fn seek(&mut self, frame: f64) {
        let last = self.buffer.frames() as f64;
        self.position = frame.clamp(0.0, last);
        self.publish();
    }

    pub fn set_gains(&mut self, gains: ChannelGains) {
        self.gains = gains;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Mix this voice into an interleaved output buffer.
    ///
    /// Samples are added to whatever `out` already holds. The source is
    /// stepped by `rate × source_rate / device_rate` frames per output
    /// frame.
    pub fn render(
        &mut self,
        out: &mut [f32],
        out_channels: usize,
        device_rate: u32,
    ) -> RenderOutcome {
        if self.state != VoiceState::Playing || out_channels == 0 {
            return RenderOutcome::Continuing;
        }

        let frames = self.buffer.frames() as f64;
        let step = (self.rate as f64 * self.buffer.sample_rate() as f64
            / device_rate.max(1) as f64)
            .max(0.0);

        for frame in out.chunks_mut(out_channels) {
            if self.position >= frames {
                if self.looping && frames > 0.0 {
                    self.position %= frames;
                } else {
                    self.finish();
                    return RenderOutcome::Finished;
                }
            }

            let (left, right) = self.buffer.frame_at(self.position);
            let left = left * self.gains.left;
            let right = right * self.gains.right;

            match frame {
                [mono] => *mono += (left + right) * 0.5,
                [l, r, ..] => {
                    *l += left;
                    *r += right;
                }
                [] => {}
            }

            self.position += step;
        }

        self.publish();
        RenderOutcome::Continuing
    }

    fn finish(&mut self) {
        self.state = VoiceState::Paused;
        self.position = 0.0;
        self.spent = self.one_shot;
        self.publish();
    }

    fn publish(&self) {
        if let Some(cursor) = &self.cursor {
            cursor.store(self.position.to_bits(), Ordering::Relaxed);
        }
    }
}
