//! Engine module housing the backend strategies.
//!
//! `backend` defines the [`AudioBackend`] trait the playback state machine
//! drives, plus the pooled, streaming and stub implementations.

pub mod backend;

pub use backend::{
    create_backend, AudioBackend, BackendCapabilities, BackendEvent, EventSink, EventSinkSlot,
    PooledBackend, SoundHandle, StreamingBackend, StubBackend,
};
