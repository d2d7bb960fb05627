//! Hamming window, precomputed once per configuration.
//!
//! Modeled as plain data (coefficients + their sum) rather than a strategy
//! object: the spectrum stage multiplies by the coefficients and divides by
//! the sum, nothing more.

use std::f64::consts::PI;

/// Precomputed Hamming window `w[n] = 0.54 − 0.46·cos(2πn/(N−1))`.
pub struct HammingWindow {
    coeffs: Vec<f64>,
    sum: f64,
}

impl HammingWindow {
    pub fn new(len: usize) -> Self {
        let coeffs: Vec<f64> = (0..len)
            .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / (len - 1) as f64).cos())
            .collect();
        let sum = coeffs.iter().sum();
        Self { coeffs, sum }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Sum of all coefficients, used for power normalization.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Multiply `frame` element-wise by the window, in place.
    ///
    /// `frame` must be at least as long as the window; extra samples are left
    /// untouched.
    pub fn apply(&self, frame: &mut [f64]) {
        for (x, w) in frame.iter_mut().zip(&self.coeffs) {
            *x *= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn endpoints_and_peak() {
        let w = HammingWindow::new(512);
        // w[0] = w[N-1] = 0.08, peak near the middle approaches 1.0
        let mut frame = vec![1.0; 512];
        w.apply(&mut frame);
        assert_abs_diff_eq!(frame[0], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(frame[511], 0.08, epsilon = 1e-12);
        assert!(frame[255] > 0.99);
    }

    #[test]
    fn sum_matches_applied_coefficients() {
        let w = HammingWindow::new(64);
        let mut frame = vec![1.0; 64];
        w.apply(&mut frame);
        let applied: f64 = frame.iter().sum();
        assert_abs_diff_eq!(applied, w.sum(), epsilon = 1e-9);
    }
}
