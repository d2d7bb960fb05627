mod mfcc;
mod spectrum;
mod window;

pub use mfcc::MfccExtractor;
pub use spectrum::PowerSpectrum;
pub use window::HammingWindow;

use thiserror::Error;

/// Errors raised by the DSP front end.
#[derive(Debug, Error)]
pub enum DspError {
    /// Rejected construction parameters. Non-recoverable: fix the config.
    #[error("config: {0}")]
    Config(&'static str),
    /// Input frame shorter than the configured window.
    #[error("frame too short (need {need} samples, got {got})")]
    FrameTooShort { need: usize, got: usize },
    /// Signal length is not a multiple of the hop size.
    #[error("signal length ({len}) must be a multiple of hop size ({hop})")]
    BadSignalLength { len: usize, hop: usize },
}
