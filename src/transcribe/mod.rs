//! Transcription adapter
//!
//! `Transcriber` turns an audio reference (path or raw bytes) into text. It
//! owns normalization to the engine's native format and the single decode
//! fallback; the engine itself sits behind the `SpeechEngine` trait so the
//! orchestration layer never talks to a concrete backend.

mod adapter;
mod engine;

pub use adapter::{Transcriber, TranscriptionError};
pub use engine::{AudioPayload, NatsSpeechEngine, SpeechEngine, SpeechEngineError};
