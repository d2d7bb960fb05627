//! Voxprint CLI binary
//! Text-independent speaker verification over MFCC + vector quantization

use anyhow::{Context, Result, bail};
use clap::Parser;
use env_logger::Env;
use log::info;

use voxprint::{
    FsCodebookStore, VoxprintConfig,
    pipeline,
    store::CodebookStore,
    task::{ProgressEvent, Task, TaskError},
    verify,
};

mod cli;
use cli::{Cli, Commands, EnrollCommand, EvaluateCommand, InspectCommand, VerifyCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => VoxprintConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VoxprintConfig::default(),
    };

    match cli.command {
        Commands::Enroll(cmd) => enroll(cmd, config),
        Commands::Verify(cmd) => verify_claim(cmd, config),
        Commands::Evaluate(cmd) => evaluate(cmd, config),
        Commands::Inspect(cmd) => inspect(cmd),
    }
}

fn enroll(cmd: EnrollCommand, config: VoxprintConfig) -> Result<()> {
    info!("enrolling '{}' from {}", cmd.identity, cmd.recording.display());
    let task = {
        let identity = cmd.identity.clone();
        let recording = cmd.recording.clone();
        let store_dir = cmd.store.clone();
        Task::spawn(move |ctx| {
            let store = FsCodebookStore::open(&store_dir)
                .map_err(|e| TaskError::Failed(pipeline::PipelineError::Store(e)))?;
            pipeline::enroll(&identity, &recording, &config, &store, ctx)
        })
    };

    for event in task.events() {
        match event {
            ProgressEvent::SamplesDecoded(n) => info!("decoded {n} samples"),
            ProgressEvent::FramesExtracted(n) => info!("extracted {n} frames"),
            ProgressEvent::TrainingIteration {
                iteration,
                quantization_error,
            } => info!("training pass {iteration}, qe {quantization_error:.3}"),
        }
    }

    let codebook = match task.join() {
        Ok(cb) => cb,
        Err(TaskError::Cancelled) => bail!("enrollment cancelled"),
        Err(TaskError::Failed(e)) => return Err(e).context("enrollment failed"),
    };
    println!(
        "enrolled '{}': {} centroids of dimension {}",
        cmd.identity,
        codebook.len(),
        codebook.dimension(),
    );
    Ok(())
}

fn verify_claim(cmd: VerifyCommand, mut config: VoxprintConfig) -> Result<()> {
    if let Some(ceiling) = cmd.max_distortion {
        config.verifier.max_distortion = ceiling;
    }

    let store = FsCodebookStore::open(&cmd.store)?;
    let candidates = store.load_all()?;
    if candidates.is_empty() {
        bail!("no speakers enrolled in {}", cmd.store.display());
    }

    let features = match pipeline::features_from_file(
        &cmd.recording,
        &config,
        &voxprint::task::TaskContext::detached(),
    ) {
        Ok(f) => f,
        Err(TaskError::Cancelled) => bail!("verification cancelled"),
        Err(TaskError::Failed(e)) => return Err(e).context("feature extraction failed"),
    };

    let result = verify::decide(
        verify::verify(&cmd.identity, &features, &candidates),
        config.verifier.max_distortion,
    );
    println!(
        "{} claim '{}' (distortion {:.2}, closest: {})",
        if result.accepted { "ACCEPT" } else { "REJECT" },
        result.claim,
        result.distortion,
        result.best_match.as_deref().unwrap_or("<none>"),
    );
    if !result.accepted {
        std::process::exit(1);
    }
    Ok(())
}

fn evaluate(cmd: EvaluateCommand, config: VoxprintConfig) -> Result<()> {
    let comparison = match voxprint::eval::cross_compare(
        &cmd.corpus,
        &cmd.training,
        &cmd.verification,
        &config,
        &voxprint::task::TaskContext::detached(),
    ) {
        Ok(c) => c,
        Err(TaskError::Cancelled) => bail!("evaluation cancelled"),
        Err(TaskError::Failed(e)) => return Err(e).context("evaluation failed"),
    };

    print!("{}", comparison.render_text());
    if let Some(path) = cmd.csv {
        std::fs::write(&path, comparison.render_csv())
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote distortion matrix to {}", path.display());
    }
    Ok(())
}

fn inspect(cmd: InspectCommand) -> Result<()> {
    let store = FsCodebookStore::open(&cmd.store)?;
    let codebook = store.load(&cmd.identity)?;
    println!(
        "'{}': format v{}, {} centroids of dimension {}",
        cmd.identity,
        codebook.version,
        codebook.len(),
        codebook.dimension(),
    );
    for (i, centroid) in codebook.centroids().iter().enumerate() {
        let energy: f64 = centroid.iter().map(|c| c * c).sum::<f64>().sqrt();
        println!("  centroid {i:3}: norm {energy:.3}");
    }
    Ok(())
}
