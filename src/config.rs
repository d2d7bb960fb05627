//! Engine configuration.
//!
//! Every knob has a `Default` mirroring [`crate::constants`], so
//! `VoxprintConfig::default()` is a working 8 kHz profile. The CLI can layer
//! a TOML file on top via [`VoxprintConfig::load`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ANALYSIS_WINDOW_SIZE, CODEBOOK_CLUSTER_COUNT, ENGINE_SAMPLE_RATE, KMEANS_MAX_ITERATIONS,
    MFCC_COEFFICIENT_COUNT, MFCC_FILTER_COUNT, MFCC_MAX_FREQ, MFCC_MIN_FREQ,
    VERIFIER_DEFAULT_MAX_DISTORTION,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
}

/// MFCC front-end parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    /// Expected sample rate of every input recording.
    pub sample_rate: u32,
    /// Analysis frame length in samples; must be a power of two >= 32.
    pub window_size: usize,
    /// Cepstral coefficients kept per frame.
    pub num_coefficients: usize,
    /// Keep the zeroth (energy) coefficient. Off by default.
    pub keep_first_coefficient: bool,
    /// Lower edge of the mel filter bank, Hz.
    pub min_freq: f64,
    /// Upper edge of the mel filter bank, Hz.
    pub max_freq: f64,
    /// Number of triangular mel filters.
    pub num_filters: usize,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: ENGINE_SAMPLE_RATE,
            window_size: ANALYSIS_WINDOW_SIZE,
            num_coefficients: MFCC_COEFFICIENT_COUNT,
            keep_first_coefficient: false,
            min_freq: MFCC_MIN_FREQ,
            max_freq: MFCC_MAX_FREQ,
            num_filters: MFCC_FILTER_COUNT,
        }
    }
}

/// Codebook training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Centroids per codebook.
    pub cluster_count: usize,
    /// Upper bound on k-means passes.
    pub max_iterations: usize,
    /// Seed for centroid initialization. `None` seeds from entropy;
    /// setting it makes training fully deterministic.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            cluster_count: CODEBOOK_CLUSTER_COUNT,
            max_iterations: KMEANS_MAX_ITERATIONS,
            seed: None,
        }
    }
}

/// Decision parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Inclusive upper bound on the best average distortion for an accept.
    pub max_distortion: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_distortion: VERIFIER_DEFAULT_MAX_DISTORTION,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxprintConfig {
    pub mfcc: MfccConfig,
    pub trainer: TrainerConfig,
    pub verifier: VerifierConfig,
}

impl VoxprintConfig {
    /// Read a TOML profile from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_8khz_profile() {
        let c = VoxprintConfig::default();
        assert_eq!(c.mfcc.sample_rate, 8000);
        assert_eq!(c.mfcc.window_size, 512);
        assert_eq!(c.mfcc.num_coefficients, 14);
        assert_eq!(c.trainer.cluster_count, 64);
        assert_eq!(c.trainer.max_iterations, 10);
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let c: VoxprintConfig =
            toml::from_str("[trainer]\ncluster_count = 4\nseed = 7\n").unwrap();
        assert_eq!(c.trainer.cluster_count, 4);
        assert_eq!(c.trainer.seed, Some(7));
        assert_eq!(c.mfcc.window_size, 512);
    }
}
