use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::control::{ChannelGains, PitchMode};
use crate::error::BackendError;

use super::{
    AudioBackend, BackendCapabilities, BackendEvent, EventSink, EventSinkSlot, SoundHandle,
};

/// Backend primitive observed by [`StubBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Acquire {
        path: PathBuf,
        handle: Option<SoundHandle>,
    },
    Release(SoundHandle),
    Play {
        handle: SoundHandle,
        gains: ChannelGains,
        rate: f32,
    },
    Pause(SoundHandle),
    Stop(SoundHandle),
    Seek {
        handle: SoundHandle,
        position: Duration,
    },
    SetGains {
        handle: SoundHandle,
        gains: ChannelGains,
    },
    SetRate {
        handle: SoundHandle,
        rate: f32,
    },
    SetLooping {
        handle: SoundHandle,
        looping: bool,
    },
    Shutdown,
}

struct StubShared {
    calls: Vec<BackendCall>,
    rejected: HashSet<PathBuf>,
    fail_releases: bool,
    loaded: HashSet<SoundHandle>,
    positions: HashMap<SoundHandle, Duration>,
    duration: Duration,
}

/// Deterministic backend used for testing and tooling without audio I/O.
///
/// Every primitive is recorded; notifications are only delivered when a
/// test asks for them through the [`StubProbe`].
pub struct StubBackend {
    capabilities: BackendCapabilities,
    shared: Arc<Mutex<StubShared>>,
    sink: EventSinkSlot,
}

impl StubBackend {
    pub fn new(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            shared: Arc::new(Mutex::new(StubShared {
                calls: Vec::new(),
                rejected: HashSet::new(),
                fail_releases: false,
                loaded: HashSet::new(),
                positions: HashMap::new(),
                duration: Duration::from_secs(1),
            })),
            sink: EventSinkSlot::new(),
        }
    }

    /// Stub declaring the pooled one-shot capability set.
    pub fn pooled() -> Self {
        Self::new(BackendCapabilities {
            can_seek: false,
            pitch_mode: PitchMode::DirectRate { min: 0.5, max: 2.0 },
            restarts_on_play: true,
        })
    }

    /// Stub declaring the streaming ratio-mode capability set.
    pub fn streaming() -> Self {
        Self::new(BackendCapabilities {
            can_seek: true,
            pitch_mode: PitchMode::Ratio,
            restarts_on_play: false,
        })
    }

    /// Observer that stays usable after the backend moves into a player.
    pub fn probe(&self) -> StubProbe {
        StubProbe {
            shared: Arc::clone(&self.shared),
            sink: self.sink.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: BackendCall) {
        self.lock().calls.push(call);
    }

    fn require_loaded(&self, handle: SoundHandle) -> Result<(), BackendError> {
        if self.lock().loaded.contains(&handle) {
            Ok(())
        } else {
            Err(BackendError::UnknownHandle { handle: handle.id() })
        }
    }
}

impl AudioBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.sink.install(sink);
    }

    fn acquire(&mut self, path: &Path) -> Result<SoundHandle, BackendError> {
        let mut shared = self.lock();
        if shared.rejected.contains(path) {
            shared.calls.push(BackendCall::Acquire {
                path: path.to_path_buf(),
                handle: None,
            });
            return Err(BackendError::SourceRejected {
                reason: format!("{} rejected by stub", path.display()),
            });
        }

        let handle = SoundHandle::next();
        shared.loaded.insert(handle);
        shared.positions.insert(handle, Duration::ZERO);
        shared.calls.push(BackendCall::Acquire {
            path: path.to_path_buf(),
            handle: Some(handle),
        });
        Ok(handle)
    }

    fn release(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        let mut shared = self.lock();
        shared.calls.push(BackendCall::Release(handle));
        if !shared.loaded.remove(&handle) {
            return Err(BackendError::UnknownHandle { handle: handle.id() });
        }
        shared.positions.remove(&handle);
        if shared.fail_releases {
            return Err(BackendError::Io {
                details: "stub release failure".to_string(),
            });
        }
        Ok(())
    }

    fn play(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
        rate: f32,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::Play {
            handle,
            gains,
            rate,
        });
        self.require_loaded(handle)
    }

    fn pause(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.record(BackendCall::Pause(handle));
        self.require_loaded(handle)
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), BackendError> {
        self.record(BackendCall::Stop(handle));
        self.require_loaded(handle)?;
        self.lock().positions.insert(handle, Duration::ZERO);
        Ok(())
    }

    fn seek(&mut self, handle: SoundHandle, position: Duration) -> Result<(), BackendError> {
        self.record(BackendCall::Seek { handle, position });
        self.require_loaded(handle)?;
        if self.capabilities.can_seek {
            let mut shared = self.lock();
            let clamped = position.min(shared.duration);
            shared.positions.insert(handle, clamped);
        }
        Ok(())
    }

    fn set_gains(
        &mut self,
        handle: SoundHandle,
        gains: ChannelGains,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::SetGains { handle, gains });
        self.require_loaded(handle)
    }

    fn set_rate(&mut self, handle: SoundHandle, rate: f32) -> Result<(), BackendError> {
        self.record(BackendCall::SetRate { handle, rate });
        self.require_loaded(handle)
    }

    fn set_looping(&mut self, handle: SoundHandle, looping: bool) -> Result<(), BackendError> {
        self.record(BackendCall::SetLooping { handle, looping });
        self.require_loaded(handle)
    }

    fn duration(&self, handle: SoundHandle) -> Option<Duration> {
        let shared = self.lock();
        shared.loaded.contains(&handle).then_some(shared.duration)
    }

    fn position(&self, handle: SoundHandle) -> Option<Duration> {
        self.lock().positions.get(&handle).copied()
    }

    fn shutdown(&mut self) {
        self.record(BackendCall::Shutdown);
        self.sink.clear();
    }
}

/// Test-side view of a [`StubBackend`].
#[derive(Clone)]
pub struct StubProbe {
    shared: Arc<Mutex<StubShared>>,
    sink: EventSinkSlot,
}

impl StubProbe {
    fn lock(&self) -> MutexGuard<'_, StubShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every primitive observed so far, in call order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&BackendCall) -> bool,
    {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Make every future acquisition of `path` fail.
    pub fn reject_source<P: AsRef<Path>>(&self, path: P) {
        self.lock().rejected.insert(path.as_ref().to_path_buf());
    }

    /// Make releases report an error after dropping the handle.
    pub fn fail_releases(&self, fail: bool) {
        self.lock().fail_releases = fail;
    }

    pub fn set_duration(&self, duration: Duration) {
        self.lock().duration = duration;
    }

    /// Handles acquired and not yet released.
    pub fn loaded_handles(&self) -> Vec<SoundHandle> {
        let mut handles: Vec<_> = self.lock().loaded.iter().copied().collect();
        handles.sort();
        handles
    }

    /// Deliver `onLoadComplete(handle)` from the caller's thread.
    pub fn complete_load(&self, handle: SoundHandle) {
        self.sink.deliver(BackendEvent::LoadComplete(handle));
    }

    /// Deliver `onPlaybackEnded(handle)` from the caller's thread.
    pub fn finish_playback(&self, handle: SoundHandle) {
        self.sink.deliver(BackendEvent::PlaybackEnded(handle));
    }
}
