//! Voxprint – public crate root
//! ============================
//! Text-independent **speaker verification**: MFCC front-end + vector
//! quantization back-end.
//!
//! * Enrollment decodes a PCM recording, extracts mel-cepstral features and
//!   trains a k-means codebook that is persisted per speaker.
//! * Verification scores a fresh recording against every enrolled codebook
//!   and accepts a claimed identity only when it is the closest model within
//!   the configured distortion ceiling.
//!
//! The library is self-contained: feed it WAV files (8 kHz mono i16 by
//! default), receive [`VerificationResult`]s.
#![deny(unsafe_code)]

/* ────────────────────────  sub-modules  ─────────────────────────────── */
pub mod config;
pub mod constants;
pub mod dsp;
pub mod eval;
pub mod features;
pub mod pipeline;
pub mod store;
pub mod task;
pub mod verify;
pub mod vq;
pub mod wav;

/* ────────────── public façade & re-exports ───────────────────────────── */
pub use config::VoxprintConfig;
pub use features::FeatureSequence;
pub use store::{CodebookStore, FsCodebookStore, StoreError};
pub use verify::VerificationResult;
pub use vq::{Codebook, ModelLoad, ModelSave};
pub use wav::{WavReader, WavWriter};

use std::path::Path;

use task::{TaskContext, TaskError};

/* ───────────────────────── facade engine ─────────────────────────────── */

/// Instant-use verification engine over a filesystem model store.
///
/// Wraps the enrollment and verification pipelines with one configuration
/// and one store, for callers that do not need task-level progress control.
pub struct Voxprint {
    config: VoxprintConfig,
    store: FsCodebookStore,
}

impl Voxprint {
    /// Engine with models stored under `store_dir`.
    pub fn open<P: AsRef<Path>>(
        config: VoxprintConfig,
        store_dir: P,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            config,
            store: FsCodebookStore::open(store_dir)?,
        })
    }

    pub fn config(&self) -> &VoxprintConfig {
        &self.config
    }

    pub fn store(&self) -> &FsCodebookStore {
        &self.store
    }

    /// Train and persist a codebook for `identity` from a recording.
    pub fn enroll(
        &self,
        identity: &str,
        recording: &Path,
    ) -> Result<Codebook, pipeline::PipelineError> {
        strip_cancel(pipeline::enroll(
            identity,
            recording,
            &self.config,
            &self.store,
            &TaskContext::detached(),
        ))
    }

    /// Decide a claimed identity for a recording.
    pub fn verify(
        &self,
        identity: &str,
        recording: &Path,
    ) -> Result<VerificationResult, EngineError> {
        let features = strip_cancel(pipeline::features_from_file(
            recording,
            &self.config,
            &TaskContext::detached(),
        ))?;
        let candidates = self.store.load_all()?;
        Ok(verify::decide(
            verify::verify(identity, &features, &candidates),
            self.config.verifier.max_distortion,
        ))
    }
}

/// Facade-level error: pipeline or store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A detached context never cancels, so only real failures remain.
fn strip_cancel<T, E>(r: Result<T, TaskError<E>>) -> Result<T, E> {
    match r {
        Ok(v) => Ok(v),
        Err(TaskError::Failed(e)) => Err(e),
        Err(TaskError::Cancelled) => unreachable!("detached context cannot be cancelled"),
    }
}
