//! Player: the public playback contract.
//!
//! A `Player` composes the playback state machine with a backend strategy
//! and the PlaybackEnded event hub. Caller-driven calls and backend
//! notifications are serialized through one mutex around the machine;
//! ended events are raised after that mutex is released, on the thread
//! that caused them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::control::ChannelGains;
use crate::engine::backend::{
    create_backend, AudioBackend, BackendCapabilities, BackendEvent, SoundHandle,
};
use crate::error::{log_player_error, PlayerError};
use crate::events::{EventHub, PlaybackEnded};
use crate::playback::{Lifecycle, PlaybackStateMachine, PlayerState, SoundSource};

mod subscriptions;

struct PlayerInner {
    machine: Mutex<PlaybackStateMachine>,
    events: EventHub,
}

impl PlayerInner {
    fn lock(&self) -> Result<MutexGuard<'_, PlaybackStateMachine>, PlayerError> {
        self.machine.lock().map_err(|_| PlayerError::LockPoisoned {
            component: "player".to_string(),
        })
    }

    fn raise(&self, ended: Option<PlaybackEnded>) {
        if let Some(event) = ended {
            log::debug!("[Player] PlaybackEnded {:?}", event);
            self.events.emit(event);
        }
    }

    /// Entry point for backend notifications.
    fn on_backend_event(&self, event: BackendEvent) {
        let ended = match self.lock() {
            Ok(mut machine) => machine.on_backend_event(event),
            Err(err) => {
                log_player_error(&err, "backend notification");
                None
            }
        };
        self.raise(ended);
    }
}

pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    /// Create a player with the backend selected by `config`.
    pub fn new(config: PlayerConfig) -> Result<Self, PlayerError> {
        let backend = create_backend(&config)?;
        Ok(Self::with_backend(backend, config))
    }

    /// Create a player driving a caller-supplied backend.
    pub fn with_backend(backend: Box<dyn AudioBackend>, config: PlayerConfig) -> Self {
        let inner = Arc::new(PlayerInner {
            machine: Mutex::new(PlaybackStateMachine::new(backend, &config)),
            events: EventHub::new(),
        });

        let weak: Weak<PlayerInner> = Arc::downgrade(&inner);
        let sink = Arc::new(move |event: BackendEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_backend_event(event);
            }
        });
        inner
            .machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_event_sink(sink);

        Self { inner }
    }

    /// Run a fire-and-forget operation; ignored calls are only traced.
    fn run<F>(&self, operation: &str, f: F)
    where
        F: FnOnce(&mut PlaybackStateMachine) -> Result<(), PlayerError>,
    {
        let result = self.inner.lock().and_then(|mut machine| f(&mut *machine));
        match result {
            Ok(()) => {}
            Err(PlayerError::OperationIgnored { .. }) => {
                log::debug!("[Player] {} ignored", operation)
            }
            Err(err) => log_player_error(&err, operation),
        }
    }

    fn read<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&PlaybackStateMachine) -> R,
    {
        match self.inner.lock() {
            Ok(machine) => Some(f(&*machine)),
            Err(err) => {
                log_player_error(&err, "read");
                None
            }
        }
    }

    fn with_state<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&PlayerState) -> R,
    {
        self.read(|machine| f(machine.state()))
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load a sound, replacing the current one. Returns `false` on failure.
    pub fn load<S: Into<SoundSource>>(&self, source: S) -> bool {
        self.report_load(self.try_load(source))
    }

    /// Load a sound with the base tempo used by ratio-mode pitch control.
    pub fn load_with_tempo<S: Into<SoundSource>>(&self, source: S, base_tempo: f32) -> bool {
        self.report_load(self.load_inner(source.into(), Some(base_tempo)))
    }

    /// Like [`Player::load`] but keeps the failure.
    pub fn try_load<S: Into<SoundSource>>(&self, source: S) -> Result<SoundHandle, PlayerError> {
        self.load_inner(source.into(), None)
    }

    fn load_inner(
        &self,
        source: SoundSource,
        base_tempo: Option<f32>,
    ) -> Result<SoundHandle, PlayerError> {
        self.inner.lock()?.load(source, base_tempo)
    }

    fn report_load(&self, result: Result<SoundHandle, PlayerError>) -> bool {
        match result {
            Ok(_) => true,
            Err(err) => {
                log_player_error(&err, "load");
                false
            }
        }
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    pub fn play(&self) {
        self.run("play", PlaybackStateMachine::play);
    }

    pub fn pause(&self) {
        self.run("pause", PlaybackStateMachine::pause);
    }

    /// Stop, rewind and raise PlaybackEnded.
    pub fn stop(&self) {
        let ended = match self.inner.lock() {
            Ok(mut machine) => machine.stop(),
            Err(err) => {
                log_player_error(&err, "stop");
                None
            }
        };
        self.inner.raise(ended);
    }

    /// Stop, release the sound and every backend resource.
    ///
    /// Safe to call repeatedly; later calls do nothing.
    pub fn dispose(&self) {
        let ended = match self.inner.lock() {
            Ok(mut machine) => machine.dispose(),
            Err(err) => {
                log_player_error(&err, "dispose");
                None
            }
        };
        self.inner.raise(ended);
    }

    pub fn seek(&self, position: Duration) {
        self.run("seek", |machine| machine.seek(position));
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    /// Request a pitch change.
    ///
    /// The raw value is kept (see [`Player::pitch_factor`]); the backend
    /// receives the derived rate now if playing, otherwise at the next play.
    ///
    /// # Errors
    /// `PlayerError::InvalidConfiguration` when a ratio-mode backend has no
    /// base tempo. Calls on a disposed player succeed without effect.
    pub fn change_pitch(&self, amount: f32) -> Result<(), PlayerError> {
        match self.inner.lock()?.change_pitch(amount) {
            Err(PlayerError::OperationIgnored { .. }) => Ok(()),
            other => other,
        }
    }

    pub fn volume(&self) -> f64 {
        self.with_state(|state| state.volume).unwrap_or_default()
    }

    /// Store the volume as given; gains use it clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f64) {
        self.run("set_volume", |machine| {
            machine.set_volume(volume);
            Ok(())
        });
    }

    pub fn balance(&self) -> f64 {
        self.with_state(|state| state.balance).unwrap_or_default()
    }

    /// Store the balance as given; gains use it clamped to `[-1, 1]`.
    pub fn set_balance(&self, balance: f64) {
        self.run("set_balance", |machine| {
            machine.set_balance(balance);
            Ok(())
        });
    }

    pub fn gains(&self) -> ChannelGains {
        self.read(PlaybackStateMachine::gains)
            .unwrap_or(ChannelGains::SILENT)
    }

    pub fn is_looping(&self) -> bool {
        self.with_state(|state| state.looping).unwrap_or(false)
    }

    pub fn set_looping(&self, looping: bool) {
        self.run("set_looping", |machine| {
            machine.set_looping(looping);
            Ok(())
        });
    }

    /// Last requested pitch, unclamped.
    pub fn pitch_factor(&self) -> f32 {
        self.with_state(PlayerState::pitch_factor)
            .unwrap_or(crate::control::DEFAULT_PITCH_FACTOR)
    }

    /// Rate the backend receives for the current request.
    pub fn playback_rate(&self) -> f32 {
        self.read(PlaybackStateMachine::playback_rate)
            .unwrap_or(crate::control::DEFAULT_PITCH_FACTOR)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn is_playing(&self) -> bool {
        self.lifecycle() == Lifecycle::Playing
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.read(PlaybackStateMachine::lifecycle)
            .unwrap_or(Lifecycle::Disposed)
    }

    /// The backend reported the current sound as fully loaded.
    pub fn is_ready(&self) -> bool {
        self.with_state(|state| state.ready).unwrap_or(false)
    }

    pub fn can_seek(&self) -> bool {
        self.read(PlaybackStateMachine::can_seek).unwrap_or(false)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.read(PlaybackStateMachine::duration).flatten()
    }

    pub fn current_position(&self) -> Option<Duration> {
        self.read(PlaybackStateMachine::current_position).flatten()
    }

    pub fn capabilities(&self) -> Option<BackendCapabilities> {
        self.read(PlaybackStateMachine::capabilities)
    }

    pub fn backend_name(&self) -> &'static str {
        self.read(PlaybackStateMachine::backend_name)
            .unwrap_or("unavailable")
    }

    /// Snapshot of the full player state.
    pub fn state(&self) -> Option<PlayerState> {
        self.with_state(PlayerState::clone)
    }
}

impl Drop for Player {
    /// Releases the sound and backend without raising PlaybackEnded.
    fn drop(&mut self) {
        self.inner
            .machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .teardown();
        self.inner.events.clear();
    }
}
