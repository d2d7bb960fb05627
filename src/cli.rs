//! Command line interface for the voxprint speaker verification engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voxprint speaker verification CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional TOML configuration file overriding the built-in defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the voxprint CLI
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enroll a speaker from a recording
    Enroll(EnrollCommand),

    /// Verify a claimed identity against the enrolled speakers
    Verify(VerifyCommand),

    /// Cross-compare a corpus of speaker directories
    Evaluate(EvaluateCommand),

    /// Inspect an enrolled speaker model
    Inspect(InspectCommand),
}

/// Train and store a codebook for one speaker
#[derive(Parser, Debug)]
pub struct EnrollCommand {
    /// Speaker identity to enroll
    pub identity: String,

    /// Path to the enrollment recording (8 kHz mono PCM WAV)
    pub recording: PathBuf,

    /// Directory holding enrolled models
    #[arg(short, long, default_value = "models")]
    pub store: PathBuf,
}

/// Score a recording against every enrolled speaker and decide a claim
#[derive(Parser, Debug)]
pub struct VerifyCommand {
    /// Claimed speaker identity
    pub identity: String,

    /// Path to the recording to verify
    pub recording: PathBuf,

    /// Directory holding enrolled models
    #[arg(short, long, default_value = "models")]
    pub store: PathBuf,

    /// Distortion ceiling override for the accept decision
    #[arg(long)]
    pub max_distortion: Option<f64>,
}

/// Batch evaluation over a corpus directory
#[derive(Parser, Debug)]
pub struct EvaluateCommand {
    /// Directory with one subdirectory per speaker
    pub corpus: PathBuf,

    /// Training recording file name inside each speaker directory
    #[arg(long, default_value = "long.wav")]
    pub training: String,

    /// Verification recording file name inside each speaker directory
    #[arg(long, default_value = "short.wav")]
    pub verification: String,

    /// Write the distortion matrix as CSV to this path
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

/// Print the stored model for one speaker
#[derive(Parser, Debug)]
pub struct InspectCommand {
    /// Speaker identity to inspect
    pub identity: String,

    /// Directory holding enrolled models
    #[arg(short, long, default_value = "models")]
    pub store: PathBuf,
}
