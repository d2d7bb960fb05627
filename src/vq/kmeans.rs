//! k-means codebook trainer.
//!
//! Seeding draws K *distinct* vectors from the training sequence using a
//! caller-supplied RNG, so training is reproducible when the caller seeds it.
//! Each pass assigns every vector to its nearest centroid by squared
//! Euclidean distance and rebuilds a fresh arena of accumulators; centroids
//! are replaced wholesale between passes, never mutated while being read.
//! The loop stops as soon as the mean quantization error (MQE) fails to
//! *strictly* decrease, or after `max_iterations` passes.

use log::{debug, warn};
use rand::Rng;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use thiserror::Error;

use super::Codebook;
use crate::features::FeatureSequence;

/// Rejected training inputs. Fail fast; fix the parameters and retry.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("cluster count must be at least 1")]
    ZeroClusters,
    #[error("max iterations must be at least 1")]
    ZeroIterations,
    #[error("training features must not be empty")]
    EmptyFeatures,
    #[error("need at least {need} feature vectors to seed {need} distinct clusters, got {got}")]
    TooFewVectors { need: usize, got: usize },
}

/// Vectors per parallel work unit. Chunks are merged in index order, so the
/// reduction is deterministic regardless of scheduling.
#[cfg(feature = "rayon")]
const ASSIGN_CHUNK: usize = 512;

/// One converged cluster with its final-pass accumulators.
#[derive(Debug, Clone)]
pub struct TrainedCluster {
    center: Vec<f64>,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
    count: usize,
}

impl TrainedCluster {
    /// Centroid used during the final assignment pass.
    pub fn center(&self) -> &[f64] {
        &self.center
    }

    /// Mean of the members assigned in the final pass, or the centroid when
    /// the cluster ended up empty.
    pub fn mean(&self) -> Vec<f64> {
        if self.count == 0 {
            return self.center.clone();
        }
        let n = self.count as f64;
        self.sum.iter().map(|s| s / n).collect()
    }

    /// Per-dimension variance of the final members (`E[x²] − E[x]²`).
    pub fn variance(&self) -> Vec<f64> {
        if self.count == 0 {
            return vec![0.0; self.center.len()];
        }
        let n = self.count as f64;
        self.sq_sum
            .iter()
            .zip(&self.sum)
            .map(|(sq, s)| sq / n - (s / n) * (s / n))
            .collect()
    }

    /// Members assigned in the final pass.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Per-pass accumulator arena entry, rebuilt from scratch each iteration.
#[derive(Clone)]
struct Accumulator {
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
    count: usize,
}

impl Accumulator {
    fn zeroed(dim: usize) -> Self {
        Self {
            sum: vec![0.0; dim],
            sq_sum: vec![0.0; dim],
            count: 0,
        }
    }

    fn add(&mut self, v: &[f64]) {
        for (s, &x) in self.sum.iter_mut().zip(v) {
            *s += x;
        }
        for (s, &x) in self.sq_sum.iter_mut().zip(v) {
            *s += x * x;
        }
        self.count += 1;
    }

    fn merge(&mut self, other: &Accumulator) {
        for (s, o) in self.sum.iter_mut().zip(&other.sum) {
            *s += o;
        }
        for (s, o) in self.sq_sum.iter_mut().zip(&other.sq_sum) {
            *s += o;
        }
        self.count += other.count;
    }
}

/// Result of one full assignment pass.
struct Pass {
    total_qe: f64,
    accums: Vec<Accumulator>,
}

pub struct KMeans<'a> {
    features: &'a FeatureSequence,
    k: usize,
    max_iterations: usize,
    centroids: Vec<Vec<f64>>,
    clusters: Vec<TrainedCluster>,
    final_qe: f64,
    trained: bool,
}

impl<'a> KMeans<'a> {
    /// Validate inputs and seed `k` distinct centroids from `features`.
    pub fn new<R: Rng + ?Sized>(
        k: usize,
        features: &'a FeatureSequence,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<Self, TrainError> {
        if k < 1 {
            return Err(TrainError::ZeroClusters);
        }
        if max_iterations < 1 {
            return Err(TrainError::ZeroIterations);
        }
        if features.is_empty() {
            return Err(TrainError::EmptyFeatures);
        }
        if features.len() < k {
            return Err(TrainError::TooFewVectors {
                need: k,
                got: features.len(),
            });
        }

        // distinct start points: reject and resample on duplicate draws
        let mut picked: Vec<usize> = Vec::with_capacity(k);
        while picked.len() < k {
            let idx = rng.random_range(0..features.len());
            if !picked.contains(&idx) {
                picked.push(idx);
            }
        }
        let centroids = picked
            .into_iter()
            .map(|i| features.get(i).to_vec())
            .collect();

        Ok(Self {
            features,
            k,
            max_iterations,
            centroids,
            clusters: Vec::new(),
            final_qe: 0.0,
            trained: false,
        })
    }

    /// Run assignment passes until the MQE stops strictly decreasing or the
    /// iteration bound is hit, then freeze the model.
    pub fn run(&mut self) {
        self.run_observed(|_, _| {});
    }

    /// Like [`run`](Self::run), calling `observe(iteration, qe)` after every
    /// pass.
    pub fn run_observed<F: FnMut(usize, f64)>(&mut self, mut observe: F) {
        let mut prev_qe = f64::MAX;
        let mut last_pass: Option<Pass> = None;
        let mut iteration = 0;

        loop {
            // adjust centroids from the previous pass, except on the first
            if let Some(pass) = &last_pass {
                self.centroids = pass
                    .accums
                    .iter()
                    .zip(&self.centroids)
                    .map(|(acc, old)| {
                        if acc.count == 0 {
                            // empty cluster keeps its centroid instead of
                            // collapsing to NaN
                            warn!("cluster went empty on iteration {iteration}; keeping centroid");
                            old.clone()
                        } else {
                            let n = acc.count as f64;
                            acc.sum.iter().map(|s| s / n).collect()
                        }
                    })
                    .collect();
            }

            let pass = self.assign();
            iteration += 1;
            debug!(
                "k-means iteration {iteration}/{}: qe={:.3} (diff {:.3})",
                self.max_iterations,
                pass.total_qe,
                prev_qe - pass.total_qe,
            );
            observe(iteration, pass.total_qe);

            let qe = pass.total_qe;
            let improved = qe < prev_qe;
            last_pass = Some(pass);
            if improved {
                prev_qe = qe;
            }
            if !improved || iteration >= self.max_iterations {
                break;
            }
        }

        // freeze: pair the centroids of the final pass with its accumulators
        let pass = match last_pass {
            Some(p) => p,
            // unreachable: the first iteration always executes
            None => return,
        };
        self.clusters = self
            .centroids
            .iter()
            .zip(pass.accums)
            .map(|(center, acc)| TrainedCluster {
                center: center.clone(),
                sum: acc.sum,
                sq_sum: acc.sq_sum,
                count: acc.count,
            })
            .collect();
        self.final_qe = pass.total_qe;
        self.trained = true;
    }

    /// One assignment pass over every feature vector.
    fn assign(&self) -> Pass {
        let dim = self.features.dimension();

        #[cfg(feature = "rayon")]
        {
            // fixed chunking + in-order merge keeps the reduction
            // deterministic under any rayon schedule
            let partials: Vec<Pass> = self
                .features
                .vectors()
                .par_chunks(ASSIGN_CHUNK)
                .map(|chunk| {
                    let mut pass = Pass {
                        total_qe: 0.0,
                        accums: vec![Accumulator::zeroed(dim); self.k],
                    };
                    for v in chunk {
                        self.assign_one(v, &mut pass);
                    }
                    pass
                })
                .collect();

            let mut merged = Pass {
                total_qe: 0.0,
                accums: vec![Accumulator::zeroed(dim); self.k],
            };
            for p in partials {
                merged.total_qe += p.total_qe;
                for (m, a) in merged.accums.iter_mut().zip(&p.accums) {
                    m.merge(a);
                }
            }
            merged
        }

        #[cfg(not(feature = "rayon"))]
        {
            let mut pass = Pass {
                total_qe: 0.0,
                accums: vec![Accumulator::zeroed(dim); self.k],
            };
            for v in self.features.iter() {
                self.assign_one(v, &mut pass);
            }
            pass
        }
    }

    #[inline]
    fn assign_one(&self, v: &[f64], pass: &mut Pass) {
        let mut min_dist = f64::MAX;
        let mut winner = 0;
        for (j, c) in self.centroids.iter().enumerate() {
            let d = squared_distance(c, v);
            if d < min_dist {
                min_dist = d;
                winner = j;
            }
        }
        pass.total_qe += min_dist;
        pass.accums[winner].add(v);
    }

    pub fn cluster_count(&self) -> usize {
        self.k
    }

    /// Cluster `i` of the converged model.
    ///
    /// # Panics
    /// If called before [`run`](Self::run) completed — querying an
    /// unconverged model is a programming error.
    pub fn cluster(&self, i: usize) -> &TrainedCluster {
        self.check_trained();
        &self.clusters[i]
    }

    /// Final-pass member means of every cluster.
    ///
    /// # Panics
    /// If called before [`run`](Self::run) completed.
    pub fn means(&self) -> Vec<Vec<f64>> {
        self.check_trained();
        self.clusters.iter().map(TrainedCluster::mean).collect()
    }

    /// Total quantization error of the final pass.
    ///
    /// # Panics
    /// If called before [`run`](Self::run) completed.
    pub fn quantization_error(&self) -> f64 {
        self.check_trained();
        self.final_qe
    }

    /// Freeze the converged centroids into a [`Codebook`].
    ///
    /// # Panics
    /// If called before [`run`](Self::run) completed.
    pub fn into_codebook(self) -> Codebook {
        self.check_trained();
        Codebook::new(
            self.clusters
                .iter()
                .map(|c| c.center().to_vec())
                .collect(),
        )
    }

    fn check_trained(&self) {
        assert!(
            self.trained,
            "k-means model queried before training completed"
        );
    }
}

/// Squared Euclidean distance; the metric both training and scoring minimize.
#[inline]
pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/* ───────────────────────────── tests ──────────────────────────────── */
