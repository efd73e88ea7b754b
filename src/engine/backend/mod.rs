//! Backend abstractions driven by the playback state machine.
//!
//! A backend is a strategy object selected at construction time. It owns
//! the platform audio resources and exposes the narrow set of primitives the
//! control core needs; asynchronous notifications flow back through an
//! [`EventSink`] installed by the player.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{BackendKind, PlayerConfig};
use crate::control::{ChannelGains, PitchMode};
use crate::error::BackendError;

mod pooled;
mod streaming;
mod stub;

pub use pooled::PooledBackend;
pub use streaming::StreamingBackend;
pub use stub::{BackendCall, StubBackend, StubProbe};

/// Opaque identifier for a sound acquired by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl SoundHandle {
    /// Allocate a process-wide unique handle.
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability set declared by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// `seek` moves the play position (otherwise it is a no-op)
    pub can_seek: bool,
    /// Interpretation of pitch requests
    pub pitch_mode: PitchMode,
    /// `play` restarts from position 0 instead of resuming, replacing any
    /// instance of the handle that is still sounding
    pub restarts_on_play: bool,
}

/// Notification delivered asynchronously by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// The sound behind the handle finished loading
    LoadComplete(SoundHandle),
    /// The sound reached its natural end (never sent for looping sounds)
    PlaybackEnded(SoundHandle),
}

/// Callback receiving backend notifications.
///
/// Backends must invoke it from their own context (a relay thread or
/// callback), never from inside one of the trait methods below.
pub type EventSink = Arc<dyn Fn(BackendEvent) + Send + Sync>;

/// Shared, late-bound slot holding the installed [`EventSink`].
#[derive(Clone, Default)]
pub struct EventSinkSlot {
    inner: Arc<RwLock<Option<EventSink>>>,
}

impl EventSinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, sink: EventSink) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Forward an event to the installed sink; dropped when none is installed.
    pub fn deliver(&self, event: BackendEvent) {
        let sink = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => sink(event),
            None => log::debug!("[EventSink] Dropping {:?}: no sink installed", event),
        }
    }
}

/// Trait implemented by audio backends.
///
/// All calls arrive serialized from the player's state machine.
pub trait AudioBackend: Send {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    fn set_event_sink(&mut self, sink: EventSink);

    /// Acquire a sound from a file on disk.
    fn acquire(&mut self, path: &Path) -> Result<SoundHandle, BackendError>;

    fn release(&mut self, handle: SoundHandle) -> Result<(), BackendError>;

    fn play(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
        rate: f32,
    ) -> Result<(), BackendError>;

    fn pause(&mut self, handle: SoundHandle) -> Result<(), BackendError>;

    /// Stop playback and rewind to position 0.
    fn stop(&mut self, handle: SoundHandle) -> Result<(), BackendError>;

    fn seek(&mut self, handle: SoundHandle, position: Duration) -> Result<(), BackendError>;

    fn set_gains(&mut self, handle: SoundHandle, gains: ChannelGains)
        -> Result<(), BackendError>;

    fn set_rate(&mut self, handle: SoundHandle, rate: f32) -> Result<(), BackendError>;

    fn set_looping(&mut self, handle: SoundHandle, looping: bool) -> Result<(), BackendError>;

    fn duration(&self, handle: SoundHandle) -> Option<Duration>;

    fn position(&self, handle: SoundHandle) -> Option<Duration>;

    /// Release every remaining backend resource. Called once on dispose.
    fn shutdown(&mut self) {}
}

/// Build the backend selected by the configuration.
pub fn create_backend(config: &PlayerConfig) -> Result<Box<dyn AudioBackend>, BackendError> {
    match config.backend {
        BackendKind::Pooled => Ok(Box::new(PooledBackend::new(
            &config.output,
            config.pool.max_streams,
            config.direct_rate,
        )?)),
        BackendKind::Streaming => Ok(Box::new(StreamingBackend::new(&config.output)?)),
    }
}
