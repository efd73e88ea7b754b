//! Configuration management for the player and its backends
//!
//! This module provides runtime configuration loading from JSON files so
//! that default levels, backend choice and output queue sizing can be
//! adjusted without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume a fresh player starts with (0 = silent, 1 = full)
    pub default_volume: f64,
    /// Balance a fresh player starts with (-1 = left, 1 = right)
    pub default_balance: f64,
    /// Raise PlaybackEnded from `stop()` even when nothing was playing
    pub stop_always_notifies: bool,
    /// Directory for cached stream sources (system temp dir when unset)
    pub cache_dir: Option<PathBuf>,
    /// Backend strategy selected at construction time
    pub backend: BackendKind,
    pub pool: PoolConfig,
    pub direct_rate: DirectRateConfig,
    pub output: OutputConfig,
}

/// Backend strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pooled one-shot sample mixer with clamped direct rate
    Pooled,
    /// Streaming engine with a rate stage driven by a base tempo ratio
    Streaming,
}

impl BackendKind {
    /// Platform default: pooled on Android, streaming elsewhere.
    pub fn platform_default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "android")] {
                BackendKind::Pooled
            } else {
                BackendKind::Streaming
            }
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Pooled backend parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of simultaneously playing one-shot instances
    pub max_streams: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_streams: 4 }
    }
}

/// Clamp range for direct-rate pitch control
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectRateConfig {
    pub min: f32,
    pub max: f32,
}

impl Default for DirectRateConfig {
    fn default() -> Self {
        Self { min: 0.5, max: 2.0 }
    }
}

impl DirectRateConfig {
    /// Whether both bounds are positive, finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }

    /// A usable range: inverted bounds are swapped, anything else that is
    /// invalid falls back to the default range.
    pub fn sanitized(self) -> Self {
        if self.is_valid() {
            return self;
        }
        let swapped = Self {
            min: self.max,
            max: self.min,
        };
        if swapped.is_valid() {
            log::warn!(
                "[Config] direct_rate min {} > max {}; swapping bounds",
                self.min,
                self.max
            );
            return swapped;
        }
        let fallback = Self::default();
        log::warn!(
            "[Config] Invalid direct_rate range {}..={}; using {}..={}",
            self.min,
            self.max,
            fallback.min,
            fallback.max
        );
        fallback
    }
}

/// Output device and real-time queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Capacity of the control → audio callback command queue
    pub command_queue_capacity: usize,
    /// Capacity of the audio callback → relay notification queue
    pub event_queue_capacity: usize,
    /// How often the relay thread drains callback notifications
    pub relay_poll_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 256,
            event_queue_capacity: 64,
            relay_poll_ms: 5,
        }
    }
}

impl Default for PlayerConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            default_balance: 0.0,
            stop_always_notifies: true,
            cache_dir: None,
            backend: BackendKind::default(),
            pool: PoolConfig::default(),
            direct_rate: DirectRateConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or unparsable files fall back to [`PlayerConfig::default`]
    /// with a logged warning; missing fields take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PlayerConfig>(&contents) {
                Ok(mut config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config.direct_rate = config.direct_rate.sanitized();
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/player_config.json")
    }
}
