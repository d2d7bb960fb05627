//! Tuning constants shared across the pipeline.

/// CODEBOOK_FORMAT_VERSION is the on-disk version of the serialized codebook.
pub const CODEBOOK_FORMAT_VERSION: u8 = 1;

/// ENGINE_SAMPLE_RATE is the sample rate every recording is expected to use.
pub const ENGINE_SAMPLE_RATE: u32 = 8_000;

/// ANALYSIS_WINDOW_SIZE is the number of samples per analysis frame (power of two).
pub const ANALYSIS_WINDOW_SIZE: usize = 512;

/// ANALYSIS_HOP_SIZE is the stride between overlapping frames (50% overlap).
pub const ANALYSIS_HOP_SIZE: usize = ANALYSIS_WINDOW_SIZE / 2;

/// MFCC_MIN_FREQ is the lower edge of the mel filter bank in Hz.
pub const MFCC_MIN_FREQ: f64 = 2.0;

/// MFCC_MAX_FREQ is the upper edge of the mel filter bank in Hz (Nyquist at 8 kHz).
pub const MFCC_MAX_FREQ: f64 = 4_000.0;

/// MFCC_FILTER_COUNT is the number of triangular mel filters.
pub const MFCC_FILTER_COUNT: usize = 15;

/// MFCC_COEFFICIENT_COUNT is the number of cepstral coefficients kept per frame.
///
/// The zeroth (energy) coefficient is dropped, so this is `MFCC_FILTER_COUNT - 1`.
pub const MFCC_COEFFICIENT_COUNT: usize = MFCC_FILTER_COUNT - 1;

/// CODEBOOK_CLUSTER_COUNT is the number of centroids in a trained speaker model.
pub const CODEBOOK_CLUSTER_COUNT: usize = 64;

/// KMEANS_MAX_ITERATIONS bounds the training loop when the MQE keeps improving.
pub const KMEANS_MAX_ITERATIONS: usize = 10;

/// VERIFIER_DEFAULT_MAX_DISTORTION is the inclusive acceptance threshold.
///
/// A claim is accepted when it owns the globally best codebook *and* that
/// distortion is `<=` this bound.
pub const VERIFIER_DEFAULT_MAX_DISTORTION: f64 = 500.0;

/// DECODE_PROGRESS_INTERVAL: a progress event is emitted every this many raw samples.
pub(crate) const DECODE_PROGRESS_INTERVAL: usize = 1_000;

/// EXTRACT_PROGRESS_INTERVAL: a progress event is emitted every this many MFCC frames.
pub(crate) const EXTRACT_PROGRESS_INTERVAL: usize = 20;

/// WAV_HEADER_LEN is the size of the fixed RIFF/WAVE header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// MEL_LOG_FLOOR: filter-bank outputs are clamped here before the log to avoid log(0).
pub(crate) const MEL_LOG_FLOOR: f64 = 1.0;
