//! Audio decoding and encoding
//!
//! Normalizes whatever container/codec arrives (uploads, downloads, live
//! chunks) into the speech engine's native format: mono f32 PCM at 16kHz.

pub mod decode;
pub mod wav;

pub use decode::{decode_to_mono_pcm, ENGINE_SAMPLE_RATE};
pub use wav::write_wav_mono_16k;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio decode failed: {0}")]
    Decode(String),
    #[error("resample failed: {0}")]
    Resample(String),
    #[error("wav write failed: {0}")]
    WavWrite(String),
}
