//! Pure parameter math shared by every backend strategy.
//!
//! `gain` derives per-channel gains from volume and balance using the
//! constant-power pan law; `pitch` turns a requested pitch change into the
//! rate command a backend understands.

pub mod gain;
pub mod pitch;

pub use gain::{clamp_balance, clamp_volume, compute_gains, ChannelGains};
pub use pitch::{compute_rate, PitchMode, DEFAULT_PITCH_FACTOR};
