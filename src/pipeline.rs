//! Enrollment and scoring pipelines.
//!
//! Turns a stored recording into features and, for enrollment, into a
//! trained codebook handed to the store. Every stage reports progress and
//! honors cooperative cancellation through a [`TaskContext`]; a cancelled
//! enrollment writes nothing.

use std::{io::Read, path::Path};

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    config::VoxprintConfig,
    constants::{DECODE_PROGRESS_INTERVAL, EXTRACT_PROGRESS_INTERVAL},
    dsp::{DspError, MfccExtractor},
    features::FeatureSequence,
    store::{CodebookStore, StoreError},
    task::{ProgressEvent, TaskContext, TaskError},
    vq::{Codebook, KMeans, TrainError},
    wav::{WavError, WavReader},
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Wav(#[from] WavError),
    #[error(transparent)]
    Dsp(#[from] DspError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("recording too short: {got} samples, need at least {need}")]
    TooShort { need: usize, got: usize },
    #[error("recording sample rate {got} Hz, engine expects {expected} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },
}

type PipelineResult<T> = Result<T, TaskError<PipelineError>>;

fn fail<T>(e: impl Into<PipelineError>) -> PipelineResult<T> {
    Err(TaskError::Failed(e.into()))
}

/// Decode every sample from `reader`, truncated to a whole number of
/// analysis windows. Emits [`ProgressEvent::SamplesDecoded`] and checks
/// cancellation every [`DECODE_PROGRESS_INTERVAL`] samples.
pub fn read_samples<R: Read + std::io::Seek>(
    reader: &mut WavReader<R>,
    window_size: usize,
    ctx: &TaskContext,
) -> PipelineResult<Vec<f64>> {
    let mut samples = Vec::with_capacity(reader.header().sample_count());

    loop {
        let sample = match reader.next_sample() {
            Ok(Some(s)) => s,
            Ok(None) => break,
            Err(e) => return fail(e),
        };
        samples.push(f64::from(sample));
        if samples.len() % DECODE_PROGRESS_INTERVAL == 0 {
            ctx.checkpoint()?;
            ctx.emit(ProgressEvent::SamplesDecoded(samples.len()));
        }
    }

    let window_count = samples.len() / window_size;
    if window_count < 2 {
        return fail(PipelineError::TooShort {
            need: window_size * 2,
            got: samples.len(),
        });
    }
    samples.truncate(window_count * window_size);
    ctx.emit(ProgressEvent::SamplesDecoded(samples.len()));

    log_levels(&samples, window_size);
    Ok(samples)
}

/// Per-window RMS levels, logged at debug as a quick signal sanity check.
fn log_levels(samples: &[f64], window_size: usize) {
    let mut levels: SmallVec<f64, 64> = samples
        .chunks_exact(window_size)
        .map(|w| {
            let mean_sq = w.iter().map(|s| s * s).sum::<f64>() / w.len() as f64;
            mean_sq.sqrt()
        })
        .collect();
    levels.sort_by(|a, b| a.total_cmp(b));
    let median = levels[levels.len() / 2];
    debug!(
        "{} windows, rms median {median:.1}, peak {:.1}",
        levels.len(),
        levels[levels.len() - 1],
    );
}

/// Extract one MFCC vector per analysis hop. Emits
/// [`ProgressEvent::FramesExtracted`] and checks cancellation every
/// [`EXTRACT_PROGRESS_INTERVAL`] frames.
pub fn extract_features(
    extractor: &mut MfccExtractor,
    samples: &[f64],
    ctx: &TaskContext,
) -> PipelineResult<FeatureSequence> {
    let hop = extractor.hop_size();
    let mut features = FeatureSequence::new(extractor.num_coefficients());

    let mut pos = 0;
    while pos + hop < samples.len() {
        match extractor.process_window(samples, pos) {
            Ok(v) => features.push(v),
            Err(e) => return fail(e),
        }
        pos += hop;
        if features.len() % EXTRACT_PROGRESS_INTERVAL == 0 {
            ctx.checkpoint()?;
            ctx.emit(ProgressEvent::FramesExtracted(features.len()));
        }
    }
    ctx.emit(ProgressEvent::FramesExtracted(features.len()));
    Ok(features)
}

/// Train a codebook on `features`, reporting per-pass quantization error.
pub fn train_codebook(
    features: &FeatureSequence,
    config: &VoxprintConfig,
    ctx: &TaskContext,
) -> PipelineResult<Codebook> {
    ctx.checkpoint()?;
    let mut rng = match config.trainer.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut trainer = match KMeans::new(
        config.trainer.cluster_count,
        features,
        config.trainer.max_iterations,
        &mut rng,
    ) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    trainer.run_observed(|iteration, quantization_error| {
        ctx.emit(ProgressEvent::TrainingIteration {
            iteration,
            quantization_error,
        });
    });
    ctx.checkpoint()?;
    info!(
        "trained {} clusters, final qe {:.3}",
        trainer.cluster_count(),
        trainer.quantization_error(),
    );
    Ok(trainer.into_codebook())
}

/// Features for a recording on disk: decode then extract.
pub fn features_from_file(
    path: &Path,
    config: &VoxprintConfig,
    ctx: &TaskContext,
) -> PipelineResult<FeatureSequence> {
    let mut reader = match WavReader::open(path) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let header = reader.header();
    if header.sample_rate != config.mfcc.sample_rate {
        return fail(PipelineError::SampleRateMismatch {
            expected: config.mfcc.sample_rate,
            got: header.sample_rate,
        });
    }
    debug!(
        "{}: {} Hz, {} samples",
        path.display(),
        header.sample_rate,
        header.sample_count(),
    );

    let mut extractor = match MfccExtractor::new(&config.mfcc) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };
    let samples = read_samples(&mut reader, extractor.window_size(), ctx)?;
    extract_features(&mut extractor, &samples, ctx)
}

/// Full enrollment: recording → features → codebook → store.
///
/// The store write is the last step, after the final cancellation check, so
/// a cancelled or failed enrollment leaves no record behind.
pub fn enroll<S: CodebookStore>(
    identity: &str,
    recording: &Path,
    config: &VoxprintConfig,
    store: &S,
    ctx: &TaskContext,
) -> PipelineResult<Codebook> {
    let features = features_from_file(recording, config, ctx)?;
    info!(
        "'{identity}': {} feature frames of dimension {}",
        features.len(),
        features.dimension(),
    );
    let codebook = train_codebook(&features, config, ctx)?;
    ctx.checkpoint()?;
    if let Err(e) = store.insert(identity, &codebook) {
        return fail(e);
    }
    Ok(codebook)
}
