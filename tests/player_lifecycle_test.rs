//! Integration tests for the Player facade
//!
//! These tests drive the public contract against the deterministic stub
//! backend, covering:
//! - Constant-power gain properties
//! - Lifecycle transitions and PlaybackEnded counting
//! - Pitch storage vs. the rate the backend receives
//! - Dispose/drop resource release

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use simple_audio_player::{
    compute_gains, BackendCall, BackendCapabilities, EndReason, Lifecycle, PitchMode,
    PlaybackEnded, Player, PlayerConfig, PlayerError, StubBackend, StubProbe,
};

fn player_with(backend: StubBackend) -> (Player, StubProbe) {
    let probe = backend.probe();
    (
        Player::with_backend(Box::new(backend), PlayerConfig::default()),
        probe,
    )
}

fn pooled_player() -> (Player, StubProbe) {
    player_with(StubBackend::pooled())
}

fn count_endings(player: &Player) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    player.on_playback_ended(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    count
}

fn releases(probe: &StubProbe) -> usize {
    probe.count(|call| matches!(call, BackendCall::Release(_)))
}

// ============================================================================
// GAINS
// ============================================================================

#[test]
fn test_constant_power_across_range() {
    for vi in 0..=10 {
        for bi in -10..=10 {
            let volume = vi as f64 / 10.0;
            let balance = bi as f64 / 10.0;
            let gains = compute_gains(volume, balance);
            let power = (gains.left as f64).powi(2) + (gains.right as f64).powi(2);
            assert!(
                (power - volume * volume).abs() < 1e-5,
                "power {} != {} at v={}, b={}",
                power,
                volume * volume,
                volume,
                balance
            );
        }
    }
}

#[test]
fn test_gain_extremes_and_clamping() {
    let center = compute_gains(0.8, 0.0);
    let expected = 0.8 * std::f64::consts::FRAC_1_SQRT_2;
    assert!((center.left as f64 - expected).abs() < 1e-6);
    assert!((center.right as f64 - expected).abs() < 1e-6);

    let left = compute_gains(0.8, -1.0);
    assert!((left.left - 0.8).abs() < 1e-6);
    assert!(left.right.abs() < 1e-6);

    let right = compute_gains(0.8, 1.0);
    assert!(right.left.abs() < 1e-6);
    assert!((right.right - 0.8).abs() < 1e-6);

    assert_eq!(compute_gains(1.5, 0.0), compute_gains(1.0, 0.0));
    assert_eq!(compute_gains(0.5, -5.0), compute_gains(0.5, -1.0));
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_fresh_player_defaults() {
    let (player, _) = pooled_player();
    assert_eq!(player.lifecycle(), Lifecycle::Unloaded);
    assert_eq!(player.volume(), 0.5);
    assert_eq!(player.balance(), 0.0);
    assert_eq!(player.pitch_factor(), 1.0);
    assert!(!player.is_playing());
}

#[test]
fn test_load_then_dispose_raises_at_most_once() {
    let (player, probe) = pooled_player();
    let endings = count_endings(&player);

    assert!(player.load("kick.wav"));
    player.dispose();

    assert_eq!(endings.load(Ordering::SeqCst), 1);
    assert_eq!(releases(&probe), 1);
    assert!(probe.loaded_handles().is_empty());
    assert_eq!(player.lifecycle(), Lifecycle::Disposed);
}

#[test]
fn test_stop_play_stop_raises_twice() {
    let (player, _) = pooled_player();
    assert!(player.load("kick.wav"));
    let endings = count_endings(&player);

    player.stop();
    player.play();
    assert!(player.is_playing());
    player.stop();

    assert_eq!(endings.load(Ordering::SeqCst), 2);
    assert_eq!(player.lifecycle(), Lifecycle::Stopped);
}

#[test]
fn test_pause_on_paused_or_stopped_is_silent() {
    let (player, probe) = pooled_player();
    assert!(player.load("kick.wav"));
    player.play();
    player.pause();
    assert_eq!(player.lifecycle(), Lifecycle::Paused);

    probe.clear_calls();
    player.pause();
    assert_eq!(player.lifecycle(), Lifecycle::Paused);
    assert!(probe.calls().is_empty());

    player.stop();
    probe.clear_calls();
    player.pause();
    assert_eq!(player.lifecycle(), Lifecycle::Stopped);
    assert!(probe.calls().is_empty());
}

#[test]
fn test_direct_rate_pitch_keeps_raw_value() {
    let (player, probe) = pooled_player();
    assert!(player.load("kick.wav"));

    player.change_pitch(3.0).unwrap();
    player.play();

    assert_eq!(player.pitch_factor(), 3.0);
    assert_eq!(player.playback_rate(), 2.0);
    let played_rate = probe.calls().iter().find_map(|call| match call {
        BackendCall::Play { rate, .. } => Some(*rate),
        _ => None,
    });
    assert_eq!(played_rate, Some(2.0));
}

#[test]
fn test_inverted_rate_range_rejects_pitch_and_keeps_player_usable() {
    let (player, probe) = player_with(StubBackend::new(BackendCapabilities {
        can_seek: false,
        pitch_mode: PitchMode::DirectRate { min: 2.0, max: 0.5 },
        restarts_on_play: true,
    }));
    assert!(player.load("kick.wav"));

    assert!(matches!(
        player.change_pitch(1.5),
        Err(PlayerError::InvalidConfiguration { .. })
    ));
    player.play();

    assert_eq!(player.lifecycle(), Lifecycle::Playing);
    assert_eq!(player.pitch_factor(), 1.0);
    assert_eq!(
        probe.count(|call| matches!(call, BackendCall::Play { rate, .. } if *rate == 1.0)),
        1
    );
    player.stop();
    assert_eq!(player.lifecycle(), Lifecycle::Stopped);
}

#[test]
fn test_ratio_pitch_without_tempo_is_invalid() {
    let (player, _) = player_with(StubBackend::streaming());
    assert!(player.load("loop.wav"));
    assert!(matches!(
        player.change_pitch(140.0),
        Err(PlayerError::InvalidConfiguration { .. })
    ));

    assert!(player.load_with_tempo("loop.wav", 70.0));
    player.change_pitch(140.0).unwrap();
    assert_eq!(player.playback_rate(), 2.0);
}

#[test]
fn test_dispose_is_idempotent() {
    let (player, probe) = pooled_player();
    assert!(player.load("kick.wav"));
    let endings = count_endings(&player);

    player.dispose();
    player.dispose();

    assert_eq!(releases(&probe), 1);
    assert_eq!(endings.load(Ordering::SeqCst), 1);
    assert_eq!(
        probe.count(|call| *call == BackendCall::Shutdown),
        1
    );
}

#[test]
fn test_second_load_releases_first_exactly_once() {
    let (player, probe) = pooled_player();
    let first = player.try_load("kick.wav").unwrap();
    let second = player.try_load("snare.wav").unwrap();

    assert_ne!(first, second);
    assert_eq!(
        probe.count(|call| *call == BackendCall::Release(first)),
        1
    );
    assert_eq!(probe.loaded_handles(), vec![second]);

    let calls = probe.calls();
    let released_at = calls
        .iter()
        .position(|call| *call == BackendCall::Release(first))
        .unwrap();
    let acquired_at = calls
        .iter()
        .position(|call| matches!(call, BackendCall::Acquire { handle: Some(h), .. } if *h == second))
        .unwrap();
    assert!(released_at < acquired_at);
}

#[test]
fn test_failed_load_returns_false_without_ending() {
    let (player, probe) = pooled_player();
    probe.reject_source("missing.wav");
    let endings = count_endings(&player);

    assert!(!player.load("missing.wav"));
    assert_eq!(player.lifecycle(), Lifecycle::Unloaded);
    assert_eq!(endings.load(Ordering::SeqCst), 0);
    assert!(matches!(
        player.try_load("missing.wav"),
        Err(PlayerError::LoadFailed { .. })
    ));
}

#[test]
fn test_drop_releases_handle_without_ending() {
    let (player, probe) = pooled_player();
    assert!(player.load("kick.wav"));
    player.play();
    let endings = count_endings(&player);

    drop(player);

    assert!(probe.loaded_handles().is_empty());
    assert_eq!(endings.load(Ordering::SeqCst), 0);
}

#[test]
fn test_stop_before_load_raises_spurious_ending() {
    let (player, _) = pooled_player();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    player.on_playback_ended(move |event| sink.lock().unwrap().push(*event));

    player.stop();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![PlaybackEnded {
            handle: None,
            reason: EndReason::Stopped
        }]
    );
}

#[test]
fn test_stop_before_load_can_be_silenced() {
    let backend = StubBackend::pooled();
    let config = PlayerConfig {
        stop_always_notifies: false,
        ..PlayerConfig::default()
    };
    let player = Player::with_backend(Box::new(backend), config);
    let endings = count_endings(&player);

    player.stop();
    assert_eq!(endings.load(Ordering::SeqCst), 0);
}

// ============================================================================
// PARAMETERS WHILE PLAYING
// ============================================================================

#[test]
fn test_volume_write_while_playing_updates_gains() {
    let (player, probe) = pooled_player();
    let handle = player.try_load("kick.wav").unwrap();
    player.play();

    player.set_volume(2.0);
    assert_eq!(player.volume(), 2.0);
    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::SetGains {
            handle,
            gains: compute_gains(1.0, 0.0)
        })
    );
    assert_eq!(player.gains(), compute_gains(1.0, 0.0));
}

#[test]
fn test_operations_after_dispose_are_ignored() {
    let (player, probe) = pooled_player();
    assert!(player.load("kick.wav"));
    player.dispose();
    probe.clear_calls();

    assert!(!player.load("snare.wav"));
    player.play();
    player.pause();
    player.stop();
    player.set_volume(0.9);
    assert!(player.change_pitch(1.5).is_ok());
    player.seek(Duration::from_millis(10));

    assert!(probe.calls().is_empty());
    assert_eq!(player.lifecycle(), Lifecycle::Disposed);
    assert_eq!(player.volume(), 0.5);
}

#[test]
fn test_seek_and_position_on_streaming_backend() {
    let (player, probe) = player_with(StubBackend::streaming());
    probe.set_duration(Duration::from_secs(4));
    assert!(!player.can_seek());
    assert!(player.load("loop.wav"));
    assert!(player.can_seek());

    player.seek(Duration::from_secs(2));
    assert_eq!(player.current_position(), Some(Duration::from_secs(2)));
    assert_eq!(player.duration(), Some(Duration::from_secs(4)));

    player.stop();
    assert_eq!(player.current_position(), Some(Duration::ZERO));
}
