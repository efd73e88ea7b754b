//! PlaybackEnded notification and its subscribers.
//!
//! Listeners registered with [`EventHub::add_listener`] run synchronously on
//! the thread that caused the transition (the caller of `stop`, or the
//! backend relay for natural completion). Async consumers subscribe to the
//! same events through a tokio broadcast channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::engine::backend::SoundHandle;

const BROADCAST_CAPACITY: usize = 32;

/// Why playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// `stop()` or dispose
    Stopped,
    /// The sound reached its natural end
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackEnded {
    /// Handle that was current, if any
    pub handle: Option<SoundHandle>,
    pub reason: EndReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&PlaybackEnded) + Send + Sync>;

pub struct EventHub {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    broadcast: broadcast::Sender<PlaybackEnded>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            broadcast,
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PlaybackEnded) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEnded> {
        self.broadcast.subscribe()
    }

    /// Stream of ended events; lagged receivers skip what they missed.
    pub fn stream(&self) -> impl Stream<Item = PlaybackEnded> + Unpin {
        BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok())
    }

    /// Notify every listener, then broadcast.
    ///
    /// Listeners are invoked outside the registry lock so they may add or
    /// remove listeners.
    pub fn emit(&self, event: PlaybackEnded) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(&event);
        }

        // No receivers is fine
        let _ = self.broadcast.send(event);
    }
}
