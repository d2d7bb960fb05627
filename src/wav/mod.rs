mod reader;
mod writer;

pub use reader::{WavHeader, WavReader};
pub use writer::WavWriter;

use thiserror::Error;

/// Errors raised while parsing or producing the PCM container.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated header (need 44 bytes, got {0})")]
    Truncated(usize),
    #[error("bad container magic: expected {expected:?}")]
    BadMagic { expected: &'static str },
    #[error("unsupported format tag {0} (uncompressed PCM only)")]
    NotPcm(u16),
    #[error("header field `{0}` must be non-zero")]
    ZeroField(&'static str),
}
