//! WAV decoding into interleaved `f32` sample buffers.

use std::path::Path;
use std::time::Duration;

use crate::error::BackendError;

/// Decoded PCM kept in memory for the lifetime of a sound handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Interleaved samples in `[-1.0, 1.0]`
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Decode a WAV file (integer 8-32 bit or float).
    ///
    /// # Errors
    /// `BackendError::SourceRejected` for unreadable or empty audio,
    /// `BackendError::Io` when the file cannot be opened.
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(BackendError::SourceRejected {
                reason: format!("{} declares zero channels", path.display()),
            });
        }

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<f32>, hound::Error>>()?,
            hound::SampleFormat::Int => {
                let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, hound::Error>>()?
            }
        };

        if samples.len() < spec.channels as usize {
            return Err(BackendError::SourceRejected {
                reason: format!("{} contains no audio frames", path.display()),
            });
        }

        Ok(Self::new(samples, spec.channels, spec.sample_rate))
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of complete frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Stereo view of one frame; mono is duplicated, extra channels dropped.
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let channels = self.channels as usize;
        let start = index * channels;
        match self.samples.get(start..start + channels) {
            Some([mono]) => (*mono, *mono),
            Some([left, right, ..]) => (*left, *right),
            _ => (0.0, 0.0),
        }
    }

    /// Linearly interpolated stereo frame at a fractional position.
    pub fn frame_at(&self, position: f64) -> (f32, f32) {
        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;
        let (l0, r0) = self.frame(index);
        if frac == 0.0 || index + 1 >= self.frames() {
            return (l0, r0);
        }
        let (l1, r1) = self.frame(index + 1);
        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }
}
