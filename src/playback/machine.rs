//! PlaybackStateMachine: lifecycle transitions for one loaded sound.
//!
//! The machine validates every caller-driven transition, derives gains and
//! rate through the control functions, and issues the matching backend
//! primitive. Transitions that end playback return the [`PlaybackEnded`]
//! event for the caller to raise once it has released its lock; the machine
//! never notifies anyone itself.

use std::path::Path;
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::control::{compute_gains, compute_rate, ChannelGains, DEFAULT_PITCH_FACTOR};
use crate::engine::backend::{
    AudioBackend, BackendCapabilities, BackendEvent, EventSink, SoundHandle,
};
use crate::error::{log_backend_error, BackendError, ErrorCode, PlayerError};
use crate::events::{EndReason, PlaybackEnded};

use super::source::{SoundSource, SourceCache};
use super::state::{Lifecycle, PlayerState};

pub struct PlaybackStateMachine {
    state: PlayerState,
    backend: Box<dyn AudioBackend>,
    capabilities: BackendCapabilities,
    cache: SourceCache,
    stop_always_notifies: bool,
}

fn ignored(operation: &str) -> PlayerError {
    PlayerError::OperationIgnored {
        operation: operation.to_string(),
    }
}

impl PlaybackStateMachine {
    pub fn new(backend: Box<dyn AudioBackend>, config: &PlayerConfig) -> Self {
        let capabilities = backend.capabilities();
        log::info!(
            "[PlaybackStateMachine] Using {} backend ({:?})",
            backend.name(),
            capabilities
        );
        Self {
            state: PlayerState::new(config.default_volume, config.default_balance),
            backend,
            capabilities,
            cache: SourceCache::new(config.cache_dir.clone()),
            stop_always_notifies: config.stop_always_notifies,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.backend.set_event_sink(sink);
    }

    /// Gains for the current volume and balance.
    pub fn gains(&self) -> ChannelGains {
        compute_gains(self.state.volume, self.state.balance)
    }

    /// Rate sent to the backend by the next `play`.
    ///
    /// Unity until a pitch is requested. A request that no longer resolves
    /// (ratio mode after loading without a tempo) falls back to unity.
    pub fn playback_rate(&self) -> f32 {
        let Some(requested) = self.state.pitch_request else {
            return DEFAULT_PITCH_FACTOR;
        };
        match compute_rate(
            requested,
            self.capabilities.pitch_mode,
            self.state.base_tempo,
        ) {
            Ok(rate) => rate,
            Err(err) => {
                log::warn!(
                    "[PlaybackStateMachine] {}; playing at unity rate",
                    err.message()
                );
                DEFAULT_PITCH_FACTOR
            }
        }
    }

    // ========================================================================
    // CALLER-DRIVEN TRANSITIONS
    // ========================================================================

    /// Replace the current sound.
    ///
    /// Any previous handle is released (and its cached file deleted) before
    /// the new source is acquired. On failure the machine is left Unloaded.
    pub fn load(
        &mut self,
        source: SoundSource,
        base_tempo: Option<f32>,
    ) -> Result<SoundHandle, PlayerError> {
        if self.state.is_disposed() {
            return Err(ignored("load"));
        }

        if self.state.lifecycle.is_active() {
            if let Some(handle) = self.state.loaded_handle {
                self.backend_call("stop before load", |backend| backend.stop(handle));
            }
        }
        self.release_current();
        self.state.base_tempo = base_tempo;

        let path = match source {
            SoundSource::File(path) => {
                self.cache.discard();
                path
            }
            SoundSource::Stream(mut reader) => self.cache.store(&mut reader)?,
        };

        let handle = self.backend.acquire(&path).map_err(|err| {
            log_backend_error(&err, "acquire");
            self.cache.discard();
            load_failed(&path, &err)
        })?;

        self.state.loaded_handle = Some(handle);
        self.state.lifecycle = Lifecycle::Loaded;
        if self.state.looping {
            self.backend_call("set_looping", |backend| backend.set_looping(handle, true));
        }

        log::info!(
            "[PlaybackStateMachine] Loaded {} as {}",
            path.display(),
            handle
        );
        Ok(handle)
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        let handle = match (self.state.lifecycle, self.state.loaded_handle) {
            (Lifecycle::Playing, Some(handle)) if self.capabilities.restarts_on_play => handle,
            (Lifecycle::Loaded | Lifecycle::Paused | Lifecycle::Stopped, Some(handle)) => handle,
            _ => return Err(ignored("play")),
        };

        let gains = self.gains();
        let rate = self.playback_rate();
        self.backend.play(handle, gains, rate).map_err(|err| {
            log_backend_error(&err, "play");
            PlayerError::from(err)
        })?;

        self.state.lifecycle = Lifecycle::Playing;
        log::debug!(
            "[PlaybackStateMachine] Playing {} (gains {:?}, rate {})",
            handle,
            gains,
            rate
        );
        Ok(())
    }

    /// Only a playing sound can be paused; anything else is ignored.
    pub fn pause(&mut self) -> Result<(), PlayerError> {
        let handle = match (self.state.lifecycle, self.state.loaded_handle) {
            (Lifecycle::Playing, Some(handle)) => handle,
            _ => return Err(ignored("pause")),
        };

        self.backend.pause(handle).map_err(|err| {
            log_backend_error(&err, "pause");
            PlayerError::from(err)
        })?;
        self.state.lifecycle = Lifecycle::Paused;
        Ok(())
    }

    /// Stop and rewind.
    ///
    /// Returns the ended event to raise: always for a loaded sound, and for
    /// an unloaded player when `stop_always_notifies` is set.
    pub fn stop(&mut self) -> Option<PlaybackEnded> {
        if self.state.is_disposed() {
            return None;
        }

        let handle = self.state.loaded_handle;
        match handle {
            Some(handle) if self.state.lifecycle.holds_handle() => {
                self.backend_call("stop", |backend| backend.stop(handle));
                self.state.lifecycle = Lifecycle::Stopped;
            }
            _ if !self.stop_always_notifies => return None,
            _ => {}
        }

        Some(PlaybackEnded {
            handle,
            reason: EndReason::Stopped,
        })
    }

    /// Store the raw request and, while playing, apply the derived rate.
    pub fn change_pitch(&mut self, requested: f32) -> Result<(), PlayerError> {
        if self.state.is_disposed() {
            return Err(ignored("change_pitch"));
        }

        let rate = compute_rate(
            requested,
            self.capabilities.pitch_mode,
            self.state.base_tempo,
        )?;
        self.state.pitch_request = Some(requested);

        if let (Lifecycle::Playing, Some(handle)) =
            (self.state.lifecycle, self.state.loaded_handle)
        {
            self.backend_call("set_rate", |backend| backend.set_rate(handle, rate));
        }
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f64) {
        if self.state.is_disposed() {
            return;
        }
        self.state.volume = volume;
        self.apply_gains();
    }

    pub fn set_balance(&mut self, balance: f64) {
        if self.state.is_disposed() {
            return;
        }
        self.state.balance = balance;
        self.apply_gains();
    }

    fn apply_gains(&mut self) {
        if let (Lifecycle::Playing, Some(handle)) =
            (self.state.lifecycle, self.state.loaded_handle)
        {
            let gains = self.gains();
            self.backend_call("set_gains", |backend| backend.set_gains(handle, gains));
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        if self.state.is_disposed() {
            return;
        }
        self.state.looping = looping;
        if let Some(handle) = self.state.loaded_handle {
            self.backend_call("set_looping", |backend| backend.set_looping(handle, looping));
        }
    }

    /// Whether `seek` can move the play position right now.
    pub fn can_seek(&self) -> bool {
        self.capabilities.can_seek && self.state.loaded_handle.is_some()
    }

    pub fn seek(&mut self, position: Duration) -> Result<(), PlayerError> {
        let Some(handle) = self.state.loaded_handle else {
            return Err(ignored("seek"));
        };
        if !self.capabilities.can_seek {
            log::debug!(
                "[PlaybackStateMachine] {} backend cannot seek; ignoring",
                self.backend.name()
            );
            return Err(ignored("seek"));
        }

        self.backend.seek(handle, position).map_err(|err| {
            log_backend_error(&err, "seek");
            PlayerError::from(err)
        })
    }

    pub fn duration(&self) -> Option<Duration> {
        self.state
            .loaded_handle
            .and_then(|handle| self.backend.duration(handle))
    }

    pub fn current_position(&self) -> Option<Duration> {
        self.state
            .loaded_handle
            .and_then(|handle| self.backend.position(handle))
    }

    /// Stop (reporting the ended event) and release everything.
    ///
    /// Idempotent: a disposed machine returns `None`.
    pub fn dispose(&mut self) -> Option<PlaybackEnded> {
        if self.state.is_disposed() {
            return None;
        }
        let ended = self.stop();
        self.teardown();
        ended
    }

    /// Release every resource without reporting anything.
    pub fn teardown(&mut self) {
        if self.state.is_disposed() {
            return;
        }
        if self.state.lifecycle.is_active() {
            if let Some(handle) = self.state.loaded_handle {
                self.backend_call("stop on teardown", |backend| backend.stop(handle));
            }
        }
        self.release_current();
        self.cache.discard();
        self.backend.shutdown();
        self.state.lifecycle = Lifecycle::Disposed;
        log::info!("[PlaybackStateMachine] Disposed");
    }

    // ========================================================================
    // BACKEND NOTIFICATIONS
    // ========================================================================

    /// Fold an asynchronous backend notification into the lifecycle.
    ///
    /// Notifications for handles other than the current one are stale and
    /// ignored, as is everything after dispose.
    pub fn on_backend_event(&mut self, event: BackendEvent) -> Option<PlaybackEnded> {
        if self.state.is_disposed() {
            log::debug!("[PlaybackStateMachine] Disposed; dropping {:?}", event);
            return None;
        }

        match event {
            BackendEvent::LoadComplete(handle) if self.is_current(handle) => {
                self.state.ready = true;
                None
            }
            BackendEvent::PlaybackEnded(handle)
                if self.is_current(handle) && self.state.lifecycle == Lifecycle::Playing =>
            {
                self.state.lifecycle = Lifecycle::Stopped;
                Some(PlaybackEnded {
                    handle: Some(handle),
                    reason: EndReason::Completed,
                })
            }
            other => {
                log::debug!("[PlaybackStateMachine] Ignoring {:?}", other);
                None
            }
        }
    }

    fn is_current(&self, handle: SoundHandle) -> bool {
        self.state.loaded_handle == Some(handle)
    }

    fn release_current(&mut self) {
        if let Some(handle) = self.state.loaded_handle.take() {
            self.backend_call("release", |backend| backend.release(handle));
        }
        self.state.ready = false;
        if self.state.lifecycle.holds_handle() {
            self.state.lifecycle = Lifecycle::Unloaded;
        }
    }

    /// Run a fire-and-forget backend primitive, logging failures.
    fn backend_call<F>(&mut self, context: &str, call: F)
    where
        F: FnOnce(&mut dyn AudioBackend) -> Result<(), BackendError>,
    {
        if let Err(err) = call(self.backend.as_mut()) {
            log_backend_error(&err, context);
        }
    }
}

impl Drop for PlaybackStateMachine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn load_failed(path: &Path, err: &BackendError) -> PlayerError {
    PlayerError::LoadFailed {
        source: path.display().to_string(),
        reason: err.message(),
    }
}

#[cfg(test)]
mod tests;
