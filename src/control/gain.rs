//! Gain Calculator - constant-power stereo panning
//!
//! Maps (volume, balance) to (left, right) gains:
//!
//! ```text
//! left  = cos(π·(balance+1)/4) · volume
//! right = sin(π·(balance+1)/4) · volume
//! ```
//!
//! so `left² + right² == volume²` across the whole balance range. At centre
//! each channel carries `volume·√2/2`, not `volume`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Per-channel gains handed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelGains {
    pub left: f32,
    pub right: f32,
}

impl ChannelGains {
    pub const SILENT: ChannelGains = ChannelGains {
        left: 0.0,
        right: 0.0,
    };
}

/// Saturate a volume value into `[0, 1]`. Non-finite values are silent.
pub fn clamp_volume(volume: f64) -> f64 {
    if !volume.is_finite() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Saturate a balance value into `[-1, 1]`. Non-finite values map to -1.
pub fn clamp_balance(balance: f64) -> f64 {
    if !balance.is_finite() {
        return -1.0;
    }
    balance.clamp(-1.0, 1.0)
}

/// Compute constant-power gains for a volume/balance pair.
///
/// Out-of-range inputs are clamped first, never rejected.
///
/// # Examples
/// ```
/// use simple_audio_player::control::compute_gains;
///
/// let gains = compute_gains(1.0, -1.0);
/// assert!((gains.left - 1.0).abs() < 1e-6);
/// assert!(gains.right.abs() < 1e-6);
/// ```
pub fn compute_gains(volume: f64, balance: f64) -> ChannelGains {
    let volume = clamp_volume(volume);
    let balance = clamp_balance(balance);

    let angle = PI * (balance + 1.0) / 4.0;

    ChannelGains {
        left: (angle.cos() * volume) as f32,
        right: (angle.sin() * volume) as f32,
    }
}
