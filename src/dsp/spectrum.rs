//! Normalized power spectrum of one windowed analysis frame.
//!
//! The FFT itself comes from `rustfft`; this stage owns the Hamming window,
//! the scratch buffer and the normalization. For each bin `j` the output is
//! `(re/Σw·2)² + (im/Σw·2)²` where `Σw` is the window coefficient sum, which
//! keeps frame energy independent of the window shape.

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::{DspError, HammingWindow};

pub struct PowerSpectrum {
    window_size: usize,
    window: HammingWindow,
    fft: Arc<dyn Fft<f64>>,
    // scratch, reused between calls
    windowed: Vec<f64>,
    fft_buf: Vec<Complex64>,
}

impl PowerSpectrum {
    /// `window_size` must be a power of two and at least 32.
    pub fn new(window_size: usize) -> Result<Self, DspError> {
        if window_size < 32 {
            return Err(DspError::Config("window size must be at least 32"));
        }
        if !window_size.is_power_of_two() {
            return Err(DspError::Config("window size must be a power of two"));
        }
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_size);
        Ok(Self {
            window_size,
            window: HammingWindow::new(window_size),
            fft,
            windowed: vec![0.0; window_size],
            fft_buf: vec![Complex64::ZERO; window_size],
        })
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Window `frame`, transform it and write the normalized power of every
    /// bin into `out` (`out.len() == window_size`).
    pub fn transform(&mut self, frame: &[f64], out: &mut [f64]) -> Result<(), DspError> {
        if frame.len() < self.window_size {
            return Err(DspError::FrameTooShort {
                need: self.window_size,
                got: frame.len(),
            });
        }
        debug_assert_eq!(out.len(), self.window_size);

        self.windowed.copy_from_slice(&frame[..self.window_size]);
        self.window.apply(&mut self.windowed);
        for (dst, &x) in self.fft_buf.iter_mut().zip(&self.windowed) {
            *dst = Complex64::new(x, 0.0);
        }
        self.fft.process(&mut self.fft_buf);

        let norm = 2.0 / self.window.sum();
        for (o, c) in out.iter_mut().zip(&self.fft_buf) {
            let re = c.re * norm;
            let im = c.im * norm;
            *o = re * re + im * im;
        }
        Ok(())
    }
}

/* ───────────────────────────── tests ──────────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn rejects_bad_window_sizes() {
        assert!(PowerSpectrum::new(16).is_err());
        assert!(PowerSpectrum::new(500).is_err());
        assert!(PowerSpectrum::new(512).is_ok());
    }

    #[test]
    fn rejects_short_frames() {
        let mut ps = PowerSpectrum::new(64).unwrap();
        let mut out = vec![0.0; 64];
        let err = ps.transform(&[0.0; 63], &mut out).unwrap_err();
        assert!(matches!(err, DspError::FrameTooShort { need: 64, got: 63 }));
    }

    #[test]
    fn power_is_nonnegative_and_peaks_at_tone_bin() {
        let n = 256;
        let bin = 16;
        let frame: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * bin as f64 * i as f64 / n as f64).sin())
            .collect();

        let mut ps = PowerSpectrum::new(n).unwrap();
        let mut power = vec![0.0; n];
        ps.transform(&frame, &mut power).unwrap();

        assert!(power.iter().all(|&p| p >= 0.0));
        let max_bin = power[..n / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_bin, bin);
    }

    #[test]
    fn silence_transforms_to_zero_power() {
        let mut ps = PowerSpectrum::new(32).unwrap();
        let mut out = vec![1.0; 32];
        ps.transform(&[0.0; 32], &mut out).unwrap();
        assert!(out.iter().all(|&p| p == 0.0));
    }
}
