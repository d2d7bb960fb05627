//! Offline cross-comparison harness.
//!
//! Points the pipeline at a directory holding one subdirectory per speaker,
//! each with a training recording and a verification recording. Trains one
//! codebook per speaker, scores every verification recording against every
//! codebook, and reports the resulting distortion matrix with summary
//! statistics. Low same-speaker distortion and a small same/cross ratio mean
//! the front end separates the speakers well.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    config::VoxprintConfig,
    pipeline::{self, PipelineError},
    task::{TaskContext, TaskError},
    verify::average_distortion,
    vq::Codebook,
};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("need at least 2 speaker directories under {root}, found {got}")]
    TooFewSpeakers { root: PathBuf, got: usize },
}

type EvalResult<T> = Result<T, TaskError<EvalError>>;

fn lift<T>(r: Result<T, TaskError<PipelineError>>) -> EvalResult<T> {
    r.map_err(|e| match e {
        TaskError::Cancelled => TaskError::Cancelled,
        TaskError::Failed(p) => TaskError::Failed(EvalError::Pipeline(p)),
    })
}

/// Square distortion matrix: row `i` is speaker `i`'s verification recording
/// scored against every speaker's codebook.
pub struct CrossComparison {
    speakers: Vec<String>,
    matrix: Vec<Vec<f64>>,
}

/// Summary statistics derived from a [`CrossComparison`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalStats {
    pub speaker_count: usize,
    /// Mean of the diagonal: each speaker against their own model.
    pub same_speaker_mean: f64,
    /// Mean of the off-diagonal entries.
    pub cross_speaker_mean: f64,
    /// `same / cross`; well below 1.0 for a discriminative front end.
    pub ratio: f64,
}

impl CrossComparison {
    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    pub fn distortion(&self, verify: usize, model: usize) -> f64 {
        self.matrix[verify][model]
    }

    pub fn stats(&self) -> EvalStats {
        let n = self.speakers.len();
        let diagonal: f64 = (0..n).map(|i| self.matrix[i][i]).sum();
        let total: f64 = self.matrix.iter().flatten().sum();
        let same = diagonal / n as f64;
        let cross = (total - diagonal) / (n * n - n) as f64;
        EvalStats {
            speaker_count: n,
            same_speaker_mean: same,
            cross_speaker_mean: cross,
            ratio: same / cross,
        }
    }

    /// Aligned text table plus the summary lines.
    pub fn render_text(&self) -> String {
        let width = self
            .speakers
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(8);

        let mut out = String::new();
        let _ = write!(out, "{:>width$}", "");
        for name in &self.speakers {
            let _ = write!(out, " {name:>width$}");
        }
        out.push('\n');
        for (name, row) in self.speakers.iter().zip(&self.matrix) {
            let _ = write!(out, "{name:>width$}");
            for d in row {
                let _ = write!(out, " {d:>width$.1}");
            }
            out.push('\n');
        }

        let stats = self.stats();
        let _ = writeln!(out, "speakers:            {}", stats.speaker_count);
        let _ = writeln!(out, "same-speaker mean:   {:.2}", stats.same_speaker_mean);
        let _ = writeln!(out, "cross-speaker mean:  {:.2}", stats.cross_speaker_mean);
        let _ = writeln!(out, "same/cross ratio:    {:.3}", stats.ratio);
        out
    }

    /// CSV with a header row; rows are verification speakers.
    pub fn render_csv(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "speaker,{}", self.speakers.join(","));
        for (name, row) in self.speakers.iter().zip(&self.matrix) {
            let cells: Vec<String> = row.iter().map(|d| d.to_string()).collect();
            let _ = writeln!(out, "{name},{}", cells.join(","));
        }
        out
    }
}

/// Speaker subdirectories of `root`, name-sorted, hidden entries skipped.
fn speaker_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>, io::Error> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.starts_with('.') => dirs.push((name.to_owned(), path)),
            _ => {}
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Train on `<speaker>/<training_name>`, score every
/// `<speaker>/<verify_name>` against every trained codebook.
pub fn cross_compare(
    root: &Path,
    training_name: &str,
    verify_name: &str,
    config: &VoxprintConfig,
    ctx: &TaskContext,
) -> EvalResult<CrossComparison> {
    let dirs = match speaker_dirs(root) {
        Ok(d) => d,
        Err(e) => return Err(TaskError::Failed(e.into())),
    };
    if dirs.len() < 2 {
        return Err(TaskError::Failed(EvalError::TooFewSpeakers {
            root: root.to_path_buf(),
            got: dirs.len(),
        }));
    }

    let mut speakers = Vec::with_capacity(dirs.len());
    let mut codebooks: Vec<Codebook> = Vec::with_capacity(dirs.len());
    let mut verify_features = Vec::with_capacity(dirs.len());
    for (name, dir) in dirs {
        debug!("evaluating '{name}' in {}", dir.display());
        let training = lift(pipeline::features_from_file(
            &dir.join(training_name),
            config,
            ctx,
        ))?;
        codebooks.push(lift(pipeline::train_codebook(&training, config, ctx))?);
        verify_features.push(lift(pipeline::features_from_file(
            &dir.join(verify_name),
            config,
            ctx,
        ))?);
        speakers.push(name);
    }

    let matrix: Vec<Vec<f64>> = verify_features
        .iter()
        .map(|features| {
            codebooks
                .iter()
                .map(|cb| average_distortion(features, cb))
                .collect()
        })
        .collect();

    for (i, name) in speakers.iter().enumerate() {
        let row = &matrix[i];
        let best = row
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, _)| j)
            .unwrap_or(i);
        info!(
            "'{name}': self {:.2}, best '{}' at {:.2}",
            row[i], speakers[best], row[best],
        );
    }

    Ok(CrossComparison { speakers, matrix })
}
