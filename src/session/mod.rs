//! Live session management
//!
//! This module provides the `SessionRegistry` abstraction that manages:
//! - Per-session streaming state keyed by session id
//! - Chunk-ordered transcription (one serialized task per session)
//! - Partial transcript events back to the channel
//! - Finalization (transcript join + insight build) with unconditional teardown

mod events;
mod registry;

pub use events::SessionEvent;
pub use registry::{SessionRegistry, StartAck};
