use std::io::Cursor;
use std::path::PathBuf;

use super::*;
use crate::engine::backend::{BackendCall, StubBackend, StubProbe};

fn machine_with(backend: StubBackend, config: &PlayerConfig) -> (PlaybackStateMachine, StubProbe) {
    let probe = backend.probe();
    (PlaybackStateMachine::new(Box::new(backend), config), probe)
}

fn pooled() -> (PlaybackStateMachine, StubProbe) {
    machine_with(StubBackend::pooled(), &PlayerConfig::default())
}

fn streaming() -> (PlaybackStateMachine, StubProbe) {
    machine_with(StubBackend::streaming(), &PlayerConfig::default())
}

fn loaded(machine: &mut PlaybackStateMachine) -> SoundHandle {
    machine.load(SoundSource::from("kick.wav"), None).unwrap()
}

fn is_release(call: &BackendCall) -> bool {
    matches!(call, BackendCall::Release(_))
}

#[test]
fn test_load_moves_to_loaded() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);

    assert_eq!(machine.lifecycle(), Lifecycle::Loaded);
    assert_eq!(machine.state().loaded_handle, Some(handle));
    assert_eq!(probe.loaded_handles(), vec![handle]);
}

#[test]
fn test_failed_load_leaves_unloaded() {
    let (mut machine, probe) = pooled();
    probe.reject_source("broken.wav");

    let result = machine.load(SoundSource::from("broken.wav"), None);
    assert!(matches!(result, Err(PlayerError::LoadFailed { .. })));
    assert_eq!(machine.lifecycle(), Lifecycle::Unloaded);
    assert!(machine.state().loaded_handle.is_none());
}

#[test]
fn test_failed_reload_releases_previous_handle() {
    let (mut machine, probe) = pooled();
    let first = loaded(&mut machine);
    probe.reject_source("broken.wav");

    assert!(machine.load(SoundSource::from("broken.wav"), None).is_err());
    assert_eq!(machine.lifecycle(), Lifecycle::Unloaded);
    assert!(probe.loaded_handles().is_empty());
    assert_eq!(probe.count(|call| *call == BackendCall::Release(first)), 1);
}

#[test]
fn test_reload_releases_before_acquiring() {
    let (mut machine, probe) = pooled();
    let first = loaded(&mut machine);
    probe.clear_calls();

    let second = machine.load(SoundSource::from("snare.wav"), None).unwrap();
    let calls = probe.calls();
    assert_eq!(calls[0], BackendCall::Release(first));
    assert_eq!(
        calls[1],
        BackendCall::Acquire {
            path: PathBuf::from("snare.wav"),
            handle: Some(second)
        }
    );
    assert_eq!(probe.count(is_release), 1);
}

#[test]
fn test_load_while_playing_stops_quietly() {
    let (mut machine, probe) = pooled();
    let first = loaded(&mut machine);
    machine.play().unwrap();

    machine.load(SoundSource::from("snare.wav"), None).unwrap();
    assert_eq!(machine.lifecycle(), Lifecycle::Loaded);
    assert_eq!(probe.count(|call| *call == BackendCall::Stop(first)), 1);
}

#[test]
fn test_play_sends_gains_and_rate() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);
    machine.play().unwrap();

    assert_eq!(machine.lifecycle(), Lifecycle::Playing);
    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::Play {
            handle,
            gains: compute_gains(0.5, 0.0),
            rate: 1.0
        })
    );
}

#[test]
fn test_play_without_sound_is_ignored() {
    let (mut machine, probe) = pooled();
    assert!(matches!(
        machine.play(),
        Err(PlayerError::OperationIgnored { .. })
    ));
    assert_eq!(machine.lifecycle(), Lifecycle::Unloaded);
    assert!(probe.calls().is_empty());
}

#[test]
fn test_play_while_playing_restarts_only_on_restarting_backends() {
    let (mut pooled, pooled_probe) = pooled();
    loaded(&mut pooled);
    pooled.play().unwrap();
    pooled.play().unwrap();
    assert_eq!(
        pooled_probe.count(|call| matches!(call, BackendCall::Play { .. })),
        2
    );

    let (mut streaming, streaming_probe) = streaming();
    loaded(&mut streaming);
    streaming.play().unwrap();
    assert!(streaming.play().is_err());
    assert_eq!(
        streaming_probe.count(|call| matches!(call, BackendCall::Play { .. })),
        1
    );
    assert_eq!(streaming.lifecycle(), Lifecycle::Playing);
}

#[test]
fn test_pause_only_from_playing() {
    let (mut machine, probe) = pooled();
    loaded(&mut machine);
    machine.play().unwrap();
    machine.pause().unwrap();
    assert_eq!(machine.lifecycle(), Lifecycle::Paused);

    probe.clear_calls();
    assert!(machine.pause().is_err());
    machine.stop();
    probe.clear_calls();
    assert!(machine.pause().is_err());
    assert_eq!(machine.lifecycle(), Lifecycle::Stopped);
    assert!(probe.calls().is_empty());
}

#[test]
fn test_stop_reports_ended_with_handle() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);
    machine.play().unwrap();

    let ended = machine.stop();
    assert_eq!(
        ended,
        Some(PlaybackEnded {
            handle: Some(handle),
            reason: EndReason::Stopped
        })
    );
    assert_eq!(machine.lifecycle(), Lifecycle::Stopped);
    assert_eq!(probe.count(|call| *call == BackendCall::Stop(handle)), 1);
}

#[test]
fn test_stop_unloaded_follows_config() {
    let (mut machine, probe) = pooled();
    assert_eq!(
        machine.stop(),
        Some(PlaybackEnded {
            handle: None,
            reason: EndReason::Stopped
        })
    );
    assert!(probe.calls().is_empty());

    let config = PlayerConfig {
        stop_always_notifies: false,
        ..PlayerConfig::default()
    };
    let (mut quiet, _) = machine_with(StubBackend::pooled(), &config);
    assert_eq!(quiet.stop(), None);
    assert_eq!(quiet.lifecycle(), Lifecycle::Unloaded);
}

#[test]
fn test_change_pitch_direct_rate_keeps_raw_value() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);
    machine.change_pitch(3.0).unwrap();
    assert_eq!(machine.state().pitch_factor(), 3.0);
    assert!(probe.calls().iter().all(|c| !matches!(c, BackendCall::SetRate { .. })));

    machine.play().unwrap();
    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::Play {
            handle,
            gains: compute_gains(0.5, 0.0),
            rate: 2.0
        })
    );

    machine.change_pitch(0.1).unwrap();
    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::SetRate { handle, rate: 0.5 })
    );
    assert_eq!(machine.state().pitch_factor(), 0.1);
}

#[test]
fn test_change_pitch_ratio_needs_tempo() {
    let (mut machine, _) = streaming();
    loaded(&mut machine);
    assert!(matches!(
        machine.change_pitch(150.0),
        Err(PlayerError::InvalidConfiguration { .. })
    ));
    assert_eq!(machine.state().pitch_request, None);
}

#[test]
fn test_change_pitch_ratio_divides_by_tempo() {
    let (mut machine, probe) = streaming();
    let handle = machine
        .load(SoundSource::from("loop.wav"), Some(120.0))
        .unwrap();
    machine.play().unwrap();
    machine.change_pitch(180.0).unwrap();

    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::SetRate { handle, rate: 1.5 })
    );
    assert_eq!(machine.playback_rate(), 1.5);
}

#[test]
fn test_ratio_mode_defaults_to_unity_rate() {
    let (mut machine, probe) = streaming();
    let handle = machine
        .load(SoundSource::from("loop.wav"), Some(96.0))
        .unwrap();
    machine.play().unwrap();
    assert!(probe.calls().contains(&BackendCall::Play {
        handle,
        gains: compute_gains(0.5, 0.0),
        rate: 1.0
    }));
}

#[test]
fn test_volume_and_balance_apply_only_while_playing() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);
    machine.set_volume(0.8);
    assert_eq!(probe.count(|c| matches!(c, BackendCall::SetGains { .. })), 0);

    machine.play().unwrap();
    machine.set_balance(-1.0);
    assert_eq!(
        probe.calls().last(),
        Some(&BackendCall::SetGains {
            handle,
            gains: compute_gains(0.8, -1.0)
        })
    );
    assert_eq!(machine.state().volume, 0.8);
}

#[test]
fn test_out_of_range_levels_are_stored_raw() {
    let (mut machine, _) = pooled();
    machine.set_volume(1.7);
    machine.set_balance(-4.0);
    assert_eq!(machine.state().volume, 1.7);
    assert_eq!(machine.state().balance, -4.0);
    assert_eq!(machine.gains(), compute_gains(1.0, -1.0));
}

#[test]
fn test_natural_completion_stops_current_handle() {
    let (mut machine, _) = pooled();
    let handle = loaded(&mut machine);
    machine.play().unwrap();

    let ended = machine.on_backend_event(BackendEvent::PlaybackEnded(handle));
    assert_eq!(
        ended,
        Some(PlaybackEnded {
            handle: Some(handle),
            reason: EndReason::Completed
        })
    );
    assert_eq!(machine.lifecycle(), Lifecycle::Stopped);
}

#[test]
fn test_stale_notifications_are_ignored() {
    let (mut machine, _) = pooled();
    let old = loaded(&mut machine);
    let current = machine.load(SoundSource::from("b.wav"), None).unwrap();
    machine.play().unwrap();

    assert_eq!(machine.on_backend_event(BackendEvent::PlaybackEnded(old)), None);
    assert_eq!(machine.on_backend_event(BackendEvent::LoadComplete(old)), None);
    assert!(!machine.state().ready);
    assert_eq!(machine.lifecycle(), Lifecycle::Playing);

    machine.on_backend_event(BackendEvent::LoadComplete(current));
    assert!(machine.state().ready);
}

#[test]
fn test_completion_after_stop_is_not_reported_twice() {
    let (mut machine, _) = pooled();
    let handle = loaded(&mut machine);
    machine.play().unwrap();
    assert!(machine.stop().is_some());
    assert_eq!(
        machine.on_backend_event(BackendEvent::PlaybackEnded(handle)),
        None
    );
}

#[test]
fn test_dispose_releases_once_and_is_terminal() {
    let (mut machine, probe) = pooled();
    let handle = loaded(&mut machine);
    machine.play().unwrap();

    assert!(machine.dispose().is_some());
    assert!(machine.dispose().is_none());
    assert_eq!(machine.lifecycle(), Lifecycle::Disposed);
    assert_eq!(probe.count(is_release), 1);
    assert_eq!(probe.count(|c| *c == BackendCall::Shutdown), 1);

    assert!(machine.play().is_err());
    assert!(machine.load(SoundSource::from("x.wav"), None).is_err());
    assert!(machine.change_pitch(1.2).is_err());
    machine.set_volume(0.1);
    assert_eq!(machine.state().volume, 0.5);
    assert_eq!(
        machine.on_backend_event(BackendEvent::PlaybackEnded(handle)),
        None
    );
}

#[test]
fn test_dispose_survives_release_failure() {
    let (mut machine, probe) = pooled();
    loaded(&mut machine);
    probe.fail_releases(true);

    machine.dispose();
    assert_eq!(machine.lifecycle(), Lifecycle::Disposed);
    assert!(probe.loaded_handles().is_empty());
}

#[test]
fn test_drop_releases_without_dispose() {
    let (mut machine, probe) = pooled();
    loaded(&mut machine);
    drop(machine);
    assert!(probe.loaded_handles().is_empty());
    assert_eq!(probe.count(|c| *c == BackendCall::Shutdown), 1);
}

#[test]
fn test_seek_respects_capability() {
    let (mut pooled, pooled_probe) = pooled();
    loaded(&mut pooled);
    assert!(!pooled.can_seek());
    assert!(pooled.seek(Duration::from_millis(100)).is_err());
    assert_eq!(
        pooled_probe.count(|c| matches!(c, BackendCall::Seek { .. })),
        0
    );

    let (mut streaming, _) = streaming();
    assert!(!streaming.can_seek());
    loaded(&mut streaming);
    assert!(streaming.can_seek());
    streaming.seek(Duration::from_millis(100)).unwrap();
    assert_eq!(
        streaming.current_position(),
        Some(Duration::from_millis(100))
    );
    assert_eq!(streaming.duration(), Some(Duration::from_secs(1)));
}

#[test]
fn test_looping_is_applied_on_load() {
    let (mut machine, probe) = streaming();
    machine.set_looping(true);
    let handle = loaded(&mut machine);
    assert!(probe.calls().contains(&BackendCall::SetLooping {
        handle,
        looping: true
    }));
}

#[test]
fn test_stream_source_is_cached_and_cleaned() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlayerConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..PlayerConfig::default()
    };
    let (mut machine, probe) = machine_with(StubBackend::pooled(), &config);

    machine
        .load(SoundSource::stream(Cursor::new(vec![0u8; 16])), None)
        .unwrap();
    let cached = match &probe.calls()[0] {
        BackendCall::Acquire { path, .. } => path.clone(),
        other => panic!("Expected Acquire, got {:?}", other),
    };
    assert!(cached.starts_with(dir.path()));
    assert!(cached.exists());

    machine.load(SoundSource::from("file.wav"), None).unwrap();
    assert!(!cached.exists());
}

#[test]
fn test_dispose_deletes_cached_stream() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlayerConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..PlayerConfig::default()
    };
    let (mut machine, probe) = machine_with(StubBackend::pooled(), &config);
    machine
        .load(SoundSource::stream(Cursor::new(vec![1u8; 4])), None)
        .unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    machine.dispose();
    assert!(probe.loaded_handles().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
