//! Output device shared by the real backends.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated
//! `sap-output` thread for its whole life. That thread doubles as the
//! notification relay: it drains ended reports from the audio callback and
//! forwards backend events to the installed sink, so sinks never run on the
//! audio callback or inside a backend call. It also frees the voices the
//! callback retires.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::config::OutputConfig;
use crate::engine::backend::{BackendEvent, EventSinkSlot};
use crate::error::BackendError;

use super::mixer::{Mixer, MixerCommand, MixerEvent};
use super::voice::Voice;

/// Message for the relay loop.
pub enum RelayMessage {
    /// Deliver an event from the relay thread
    Notify(BackendEvent),
    Shutdown,
}

pub struct OutputDevice {
    commands: Producer<MixerCommand>,
    relay: Sender<RelayMessage>,
    closed: bool,
}

impl OutputDevice {
    /// Open the default output device on a fresh output thread.
    ///
    /// Blocks until the stream is running or failed to open.
    pub fn open(
        config: &OutputConfig,
        max_voices: usize,
        sink: EventSinkSlot,
    ) -> Result<Self, BackendError> {
        let (commands, command_rx) = RingBuffer::new(config.command_queue_capacity.max(1));
        let (event_tx, event_rx) = RingBuffer::new(config.event_queue_capacity.max(1));
        let (garbage_tx, garbage_rx) =
            RingBuffer::new(config.command_queue_capacity.max(max_voices).max(1));
        let (relay, relay_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let poll = Duration::from_millis(config.relay_poll_ms.max(1));

        thread::Builder::new()
            .name("sap-output".to_string())
            .spawn(move || {
                let mixer = Mixer::new(max_voices, command_rx, event_tx, garbage_tx);
                let stream = match create_output_stream(mixer) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                run_relay(event_rx, garbage_rx, relay_rx, &sink, poll);
                drop(stream);
                log::info!("[Output] Output thread exiting");
            })
            .map_err(|err| BackendError::StreamOpenFailed {
                reason: format!("Failed to spawn output thread: {}", err),
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| BackendError::StreamOpenFailed {
                reason: "Output thread exited before reporting".to_string(),
            })??;

        log::info!("[Output] Output stream running at {} Hz", sample_rate);

        Ok(Self {
            commands,
            relay,
            closed: false,
        })
    }

    /// Queue a command for the audio callback.
    pub fn send(&mut self, command: MixerCommand) -> Result<(), BackendError> {
        self.commands
            .push(command)
            .map_err(|PushError::Full(_)| BackendError::QueueFull)
    }

    /// Deliver an event to the sink from the relay thread.
    pub fn notify(&self, event: BackendEvent) {
        if self.relay.send(RelayMessage::Notify(event)).is_err() {
            log::warn!("[Output] Relay gone, dropping {:?}", event);
        }
    }

    /// Stop the relay and let the output thread drop the stream.
    ///
    /// Does not wait for the thread: the relay may be delivering into a
    /// sink that is blocked on the caller.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.relay.send(RelayMessage::Shutdown);
        }
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Forward callback reports and queued events until shut down.
pub(crate) fn run_relay(
    mut events: Consumer<MixerEvent>,
    mut garbage: Consumer<Box<Voice>>,
    messages: Receiver<RelayMessage>,
    sink: &EventSinkSlot,
    poll: Duration,
) {
    loop {
        while let Ok(MixerEvent::Finished(handle)) = events.pop() {
            sink.deliver(BackendEvent::PlaybackEnded(handle));
        }
        // Retired voices may hold the last reference to a sample buffer
        while let Ok(voice) = garbage.pop() {
            drop(voice);
        }

        match messages.recv_timeout(poll) {
            Ok(RelayMessage::Notify(event)) => sink.deliver(event),
            Ok(RelayMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn create_output_stream(mut mixer: Mixer) -> Result<(cpal::Stream, u32), BackendError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BackendError::StreamOpenFailed {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| BackendError::StreamOpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels_count = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;

    let err_fn = |err| log::error!("[Output] Output stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer.render(data, channels_count, sample_rate);
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(BackendError::StreamOpenFailed {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            })
        }
    }
    .map_err(|e| BackendError::StreamOpenFailed {
        reason: format!("{:?}", e),
    })?;

    stream.play().map_err(|e| BackendError::StreamOpenFailed {
        reason: format!("Failed to start output stream: {:?}", e),
    })?;

    Ok((stream, sample_rate))
}
