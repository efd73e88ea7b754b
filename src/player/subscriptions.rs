use futures::Stream;
use tokio::sync::broadcast;

use crate::events::{ListenerId, PlaybackEnded};

use super::Player;

impl Player {
    // ========================================================================
    // PLAYBACK ENDED SUBSCRIPTIONS
    // ========================================================================

    /// Register a synchronous listener.
    ///
    /// It runs on the thread that ended playback: the caller of `stop` or
    /// `dispose`, or the backend's notification thread for natural
    /// completion. The listener may call back into the player.
    pub fn on_playback_ended<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PlaybackEnded) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEnded> {
        self.inner.events.subscribe()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn ended_stream(&self) -> impl Stream<Item = PlaybackEnded> + Unpin {
        self.inner.events.stream()
    }
}
