//! Pitch Controller - requested pitch change → backend rate command.

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Pitch factor a player starts with (nominal speed).
pub const DEFAULT_PITCH_FACTOR: f32 = 1.0;

/// How a backend interprets pitch requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchMode {
    /// Requested value is the rate itself, saturated into `[min, max]`.
    DirectRate { min: f32, max: f32 },
    /// Requested value is a target tempo; rate = requested / base tempo.
    Ratio,
}

/// Compute the rate command sent to the backend.
///
/// In direct-rate mode the requested value is clamped. In ratio mode the
/// request is divided by `base_tempo`, which must be present and non-zero.
///
/// # Errors
/// `PlayerError::InvalidConfiguration` for a non-finite request, an unusable
/// direct-rate range, or ratio mode without a usable base tempo.
pub fn compute_rate(
    requested: f32,
    mode: PitchMode,
    base_tempo: Option<f32>,
) -> Result<f32, PlayerError> {
    if !requested.is_finite() {
        return Err(PlayerError::InvalidConfiguration {
            reason: format!("pitch request must be finite (got {})", requested),
        });
    }

    match mode {
        PitchMode::DirectRate { min, max } => {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(PlayerError::InvalidConfiguration {
                    reason: format!("direct rate range {}..={} is unusable", min, max),
                });
            }
            Ok(requested.clamp(min, max))
        }
        PitchMode::Ratio => match base_tempo {
            Some(tempo) if tempo != 0.0 && tempo.is_finite() => Ok(requested / tempo),
            Some(tempo) => Err(PlayerError::InvalidConfiguration {
                reason: format!("base tempo must be non-zero (got {})", tempo),
            }),
            None => Err(PlayerError::InvalidConfiguration {
                reason: "ratio pitch control requires a base tempo; load with a tempo first"
                    .to_string(),
            }),
        },
    }
}
