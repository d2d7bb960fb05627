//! Distortion scoring and the accept/reject decision.
//!
//! A claim is verified by scoring the utterance against every enrolled
//! codebook. The claim is accepted only when it is the globally closest
//! model *and* that best distortion is within the configured ceiling, so an
//! impostor cannot pass merely by being "close enough" to the claimed voice
//! while matching someone else better.

use indexmap::IndexMap;
use log::{debug, info};

use crate::{features::FeatureSequence, vq::Codebook};

/// Mean over all frames of the squared Euclidean distance to the nearest
/// centroid. Lower is better; 0.0 for an empty sequence.
pub fn average_distortion(features: &FeatureSequence, codebook: &Codebook) -> f64 {
    if features.is_empty() {
        return 0.0;
    }
    let total: f64 = features
        .iter()
        .map(|v| {
            codebook
                .centroids()
                .iter()
                .map(|c| crate::vq::squared_distance(v, c))
                .fold(f64::MAX, f64::min)
        })
        .sum();
    total / features.len() as f64
}

/// Outcome of a verification attempt. Never an error: an unknown claim or a
/// poor match is a rejection, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    /// Claimed identity, as given.
    pub claim: String,
    pub accepted: bool,
    /// Distortion of the closest enrolled model. Lower is better. This is
    /// reported for rejections too, so callers always see a comparable score.
    pub distortion: f64,
    /// Identity of the closest enrolled model, when any model was scored.
    pub best_match: Option<String>,
}

/// Score `features` against every candidate and decide the claim.
///
/// Candidates are keyed by speaker identity; insertion order is preserved so
/// ties resolve deterministically to the earliest-enrolled speaker.
pub fn verify(
    claim: &str,
    features: &FeatureSequence,
    candidates: &IndexMap<String, Codebook>,
) -> VerificationResult {
    let mut best: Option<(&str, f64)> = None;

    for (identity, codebook) in candidates {
        let distortion = average_distortion(features, codebook);
        debug!("distortion against '{identity}': {distortion:.3}");
        match best {
            Some((_, d)) if distortion >= d => {}
            _ => best = Some((identity, distortion)),
        }
    }

    match best {
        Some((identity, distortion)) => VerificationResult {
            claim: claim.to_owned(),
            // the threshold gate is applied by the caller via `decide`
            accepted: identity == claim,
            distortion,
            best_match: Some(identity.to_owned()),
        },
        None => VerificationResult {
            claim: claim.to_owned(),
            accepted: false,
            distortion: f64::MAX,
            best_match: None,
        },
    }
}

/// Apply the distortion ceiling to a scored result. The boundary is
/// inclusive: a distortion exactly at the ceiling still passes.
pub fn decide(mut result: VerificationResult, max_distortion: f64) -> VerificationResult {
    result.accepted = result.accepted && result.distortion <= max_distortion;
    info!(
        "claim '{}': {} (distortion {:.3}, ceiling {:.3})",
        result.claim,
        if result.accepted { "ACCEPT" } else { "REJECT" },
        result.distortion,
        max_distortion,
    );
    result
}
