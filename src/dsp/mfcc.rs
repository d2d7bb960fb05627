//! **Mel-frequency cepstral coefficient** extractor.
//!
//! One instance is built per configuration and reused for every frame: the
//! mel filter bank, the DCT matrix and all scratch buffers are precomputed in
//! [`MfccExtractor::new`]. Per-window pipeline:
//!
//! 1. normalized power spectrum of the Hamming-windowed frame
//! 2. truncate to the `window_size/2 + 1` unique bins (Nyquist limit)
//! 3. triangular mel filter bank
//! 4. floor + log, scaled to dB (`10/ln 10`)
//! 5. DCT-II down to the cepstral coefficients

use log::debug;

use super::{DspError, PowerSpectrum};
use crate::config::MfccConfig;

pub struct MfccExtractor {
    window_size: usize,
    hop_size: usize,
    num_coefficients: usize,

    // cached DSP bits
    spectrum: PowerSpectrum,
    filter_bank: Vec<Vec<f64>>, // [filter][spectrum_bin], bins = window_size/2 + 1
    dct: Vec<Vec<f64>>,         // [coefficient][filter]

    // scratch, reused between calls
    power: Vec<f64>,
    mel_energies: Vec<f64>,
}

impl MfccExtractor {
    /// Validate the configuration and precompute the transform matrices.
    ///
    /// Fails fast with [`DspError::Config`]; a rejected configuration is not
    /// recoverable at runtime.
    pub fn new(cfg: &MfccConfig) -> Result<Self, DspError> {
        let spectrum = PowerSpectrum::new(cfg.window_size)?;
        let bins = cfg.window_size / 2 + 1;

        if cfg.sample_rate < 1 {
            return Err(DspError::Config("sample rate must be at least 1"));
        }
        if cfg.num_filters < 2 || cfg.num_filters > bins {
            return Err(DspError::Config(
                "filter count must be in [2, window_size/2 + 1]",
            ));
        }
        if cfg.num_coefficients < 1 || cfg.num_coefficients >= cfg.num_filters {
            return Err(DspError::Config(
                "coefficient count must be in [1, filter count)",
            ));
        }
        if cfg.min_freq <= 0.0 || cfg.min_freq > cfg.max_freq || cfg.max_freq > 88_200.0 {
            return Err(DspError::Config(
                "frequency range must satisfy 0 < min <= max <= 88200",
            ));
        }

        let filter_bank = build_filter_bank(cfg, bins);
        // filters past Nyquist were dropped above; the DCT basis and the
        // coefficient bound both follow the reduced count
        let num_filters = filter_bank.len();
        if num_filters != cfg.num_filters {
            debug!(
                "mel filter bank reduced from {} to {} filters (Nyquist limit)",
                cfg.num_filters, num_filters
            );
        }
        if cfg.num_coefficients >= num_filters {
            return Err(DspError::Config(
                "coefficient count exceeds usable filter count after Nyquist reduction",
            ));
        }
        let dct = build_dct(num_filters, cfg.num_coefficients, cfg.keep_first_coefficient);

        Ok(Self {
            window_size: cfg.window_size,
            hop_size: cfg.window_size / 2,
            num_coefficients: cfg.num_coefficients,
            spectrum,
            filter_bank,
            dct,
            power: vec![0.0; cfg.window_size],
            mel_energies: vec![0.0; num_filters],
        })
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Stride between consecutive overlapping windows (`window_size / 2`).
    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Length of every returned coefficient vector.
    #[inline]
    pub fn num_coefficients(&self) -> usize {
        self.num_coefficients
    }

    /// Cepstral coefficients of the window starting at `offset`.
    ///
    /// `signal.len() - offset` must cover a whole window.
    pub fn process_window(&mut self, signal: &[f64], offset: usize) -> Result<Vec<f64>, DspError> {
        let avail = signal.len().saturating_sub(offset);
        if avail < self.window_size {
            return Err(DspError::FrameTooShort {
                need: self.window_size,
                got: avail,
            });
        }

        self.spectrum
            .transform(&signal[offset..offset + self.window_size], &mut self.power)?;

        // unique bins only; the rest are symmetrically redundant
        let bins = self.window_size / 2 + 1;
        let spectrum = &self.power[..bins];

        // filter bank -> dB-scaled log energies
        let db_scale = 10.0 / std::f64::consts::LN_10;
        for (e, filter) in self.mel_energies.iter_mut().zip(&self.filter_bank) {
            let acc: f64 = filter.iter().zip(spectrum).map(|(w, p)| w * p).sum();
            *e = acc.max(crate::constants::MEL_LOG_FLOOR).ln() * db_scale;
        }

        // DCT down to the cepstrum
        let out = self
            .dct
            .iter()
            .map(|row| row.iter().zip(&self.mel_energies).map(|(d, e)| d * e).sum())
            .collect();
        Ok(out)
    }

    /// Slide a 50%-overlap window across `signal`.
    ///
    /// The signal length must be a multiple of the hop size; the result holds
    /// exactly `signal.len()/hop_size − 1` coefficient vectors.
    pub fn process(&mut self, signal: &[f64]) -> Result<Vec<Vec<f64>>, DspError> {
        if signal.len() % self.hop_size != 0 {
            return Err(DspError::BadSignalLength {
                len: signal.len(),
                hop: self.hop_size,
            });
        }
        let count = (signal.len() / self.hop_size).saturating_sub(1);
        let mut frames = Vec::with_capacity(count);
        let mut pos = 0;
        while pos + self.hop_size < signal.len() {
            frames.push(self.process_window(signal, pos)?);
            pos += self.hop_size;
        }
        Ok(frames)
    }
}

/* ─────────────────────── transform construction ─────────────────────── */

/// Mel scale: `mel(f) = 2595·log10(1 + f/700)`.
#[inline]
fn lin_to_mel(freq: f64) -> f64 {
    2595.0 * (1.0 + freq / 700.0).log10()
}

/// Inverse mel scale: `700·(10^(m/2595) − 1)`.
#[inline]
fn mel_to_lin(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// `num_filters + 2` boundary points, equally spaced on the mel scale and
/// forced back onto the exact min/max frequency at the ends.
fn filter_boundaries(min_freq: f64, max_freq: f64, num_filters: usize) -> Vec<f64> {
    let min_mel = lin_to_mel(min_freq);
    let max_mel = lin_to_mel(max_freq);
    let delta_mel = (max_mel - min_mel) / (num_filters + 1) as f64;

    let mut bounds: Vec<f64> = (0..num_filters + 2)
        .map(|i| mel_to_lin(min_mel + i as f64 * delta_mel))
        .collect();
    bounds[0] = min_freq;
    bounds[num_filters + 1] = max_freq;
    bounds
}

fn build_filter_bank(cfg: &MfccConfig, bins: usize) -> Vec<Vec<f64>> {
    let bounds = filter_boundaries(cfg.min_freq, cfg.max_freq, cfg.num_filters);
    let nyquist = cfg.sample_rate as f64 / 2.0;

    // drop filters whose boundaries exceed the Nyquist frequency
    let mut num_filters = cfg.num_filters;
    for (i, &b) in bounds.iter().enumerate().take(bounds.len() - 1).skip(1) {
        if b > nyquist {
            num_filters = i - 1;
            break;
        }
    }

    let base_freq = cfg.sample_rate as f64 / cfg.window_size as f64;
    (1..=num_filters)
        .map(|i| {
            (0..bins)
                .map(|j| filter_weight(i, base_freq * j as f64, &bounds))
                .collect()
        })
        .collect()
}

/// Weight of triangular filter `i` (1-indexed) at `freq`. The triangle spans
/// `[bounds[i-1], bounds[i+1]]`, peaks at `bounds[i]` and has height
/// `2/(end − start)` so its area is normalized.
fn filter_weight(i: usize, freq: f64, bounds: &[f64]) -> f64 {
    let start = bounds[i - 1];
    let center = bounds[i];
    let end = bounds[i + 1];
    let height = 2.0 / (end - start);

    if freq < start || freq > end {
        0.0
    } else if freq < center {
        (freq - start) * (height / (center - start))
    } else {
        height + (freq - center) * (-height / (end - center))
    }
}

/// Type-II DCT basis, `num_coefficients × num_filters`. Row 0 is scaled by
/// `1/√n`, the rest by `√(2/n)`. When the DC coefficient is dropped the rows
/// start at basis index 1 instead, so the output length stays
/// `num_coefficients`.
fn build_dct(num_filters: usize, num_coefficients: usize, keep_first: bool) -> Vec<Vec<f64>> {
    let n = num_filters as f64;
    let k = std::f64::consts::PI / n;
    let w1 = 1.0 / n.sqrt();
    let w2 = (2.0 / n).sqrt();

    let first_row = if keep_first { 0 } else { 1 };
    (first_row..first_row + num_coefficients)
        .map(|i| {
            let w = if i == 0 { w1 } else { w2 };
            (0..num_filters)
                .map(|j| w * (k * i as f64 * (j as f64 + 0.5)).cos())
                .collect()
        })
        .collect()
}

/* ───────────────────────────── tests ──────────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MfccConfig;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn cfg() -> MfccConfig {
        MfccConfig::default()
    }

    #[test]
    fn default_config_is_accepted() {
        assert!(MfccExtractor::new(&cfg()).is_ok());
    }

    #[test]
    fn invalid_configs_fail_at_construction() {
        let mut c = cfg();
        c.window_size = 500;
        assert!(MfccExtractor::new(&c).is_err());

        let mut c = cfg();
        c.num_filters = 1;
        assert!(MfccExtractor::new(&c).is_err());

        let mut c = cfg();
        c.num_coefficients = c.num_filters;
        assert!(MfccExtractor::new(&c).is_err());

        let mut c = cfg();
        c.min_freq = 0.0;
        assert!(MfccExtractor::new(&c).is_err());

        let mut c = cfg();
        c.max_freq = 100_000.0;
        assert!(MfccExtractor::new(&c).is_err());

        let mut c = cfg();
        c.min_freq = 2_000.0;
        c.max_freq = 1_000.0;
        assert!(MfccExtractor::new(&c).is_err());
    }

    #[test]
    fn mel_scale_round_trip() {
        for f in [2.0, 440.0, 1000.0, 4000.0] {
            assert_abs_diff_eq!(mel_to_lin(lin_to_mel(f)), f, epsilon = 1e-9);
        }
    }

    #[test]
    fn boundaries_are_strictly_increasing_and_pinned() {
        let bounds = filter_boundaries(2.0, 4000.0, 15);
        assert_eq!(bounds.len(), 17);
        assert_eq!(bounds[0], 2.0);
        assert_eq!(bounds[16], 4000.0);
        for w in bounds.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn filter_weights_are_nonnegative() {
        let e = MfccExtractor::new(&cfg()).unwrap();
        for filter in &e.filter_bank {
            assert!(filter.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn process_window_returns_configured_dimension() {
        for window_size in [32usize, 128, 512, 1024] {
            let c = MfccConfig {
                window_size,
                num_filters: 12,
                num_coefficients: 8,
                ..cfg()
            };
            let mut e = MfccExtractor::new(&c).unwrap();
            let signal = vec![0.25; window_size * 2];
            let v = e.process_window(&signal, 0).unwrap();
            assert_eq!(v.len(), 8);
        }
    }

    #[test]
    fn process_window_rejects_short_tail() {
        let mut e = MfccExtractor::new(&cfg()).unwrap();
        let signal = vec![0.0; 600];
        assert!(e.process_window(&signal, 0).is_ok());
        assert!(matches!(
            e.process_window(&signal, 100),
            Err(DspError::FrameTooShort { need: 512, got: 500 })
        ));
    }

    #[test]
    fn process_requires_hop_multiple_and_counts_frames() {
        let mut e = MfccExtractor::new(&cfg()).unwrap();
        assert!(matches!(
            e.process(&vec![0.0; 1000]),
            Err(DspError::BadSignalLength { len: 1000, hop: 256 })
        ));

        // 8000 Hz mono, truncated to a multiple of 512: 3840 usable samples
        // at hop 256 -> 3840/256 - 1 = 14 vectors.
        let signal: Vec<f64> = (0..3840).map(|i| (i as f64 * 0.01).sin()).collect();
        let frames = e.process(&signal).unwrap();
        assert_eq!(frames.len(), 14);
        assert!(frames.iter().all(|f| f.len() == e.num_coefficients()));
    }

    #[test]
    fn distinct_tones_map_to_distinct_cepstra() {
        let c = cfg();
        let mut e = MfccExtractor::new(&c).unwrap();
        let low: Vec<f64> = (0..1024)
            .map(|i| (2.0 * PI * 200.0 * i as f64 / 8000.0).sin())
            .collect();
        let high: Vec<f64> = (0..1024)
            .map(|i| (2.0 * PI * 3000.0 * i as f64 / 8000.0).sin())
            .collect();
        let a = e.process_window(&low, 0).unwrap();
        let b = e.process_window(&high, 0).unwrap();
        let dist: f64 = a.iter().zip(&b).map(|(x, y)| (x - y) * (x - y)).sum();
        assert!(dist > 1.0, "cepstra should separate tones, got {dist}");
    }
}
