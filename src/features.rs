//! Ordered, fixed-dimension sequence of cepstral feature vectors.

use serde::{Deserialize, Serialize};

/// Feature vectors for one recording. Every vector shares one dimension;
/// pushing a mismatched vector is a programming error and panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSequence {
    dimension: usize,
    vectors: Vec<Vec<f64>>,
}

impl FeatureSequence {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension >= 1, "feature dimension must be at least 1");
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Build a sequence from extractor output.
    pub fn from_vectors(dimension: usize, vectors: Vec<Vec<f64>>) -> Self {
        let mut seq = Self::new(dimension);
        for v in vectors {
            seq.push(v);
        }
        seq
    }

    /// Append one vector.
    ///
    /// # Panics
    /// If `vector.len()` differs from the sequence dimension.
    pub fn push(&mut self, vector: Vec<f64>) {
        assert_eq!(
            vector.len(),
            self.dimension,
            "feature vector dimension mismatch"
        );
        self.vectors.push(vector);
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> &[f64] {
        &self.vectors[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.vectors.iter().map(Vec::as_slice)
    }

    /// Backing storage, for chunked parallel scans.
    #[inline]
    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }
}
