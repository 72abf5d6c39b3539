//! scanscribe CLI
//!
//! Front end for the acquisition and recognition pipeline: an interactive
//! shell that owns the session, plus one-shot `recognize` and `batch`
//! commands for scripting
//!
//! Copyright (c) 2025 Michael A Wright

mod shell;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scribe_core::{
    BatchReport, Capabilities, Coordinator, DirectoryCamera, FileExporter, ImageCodec, Notice,
    PdfRenderer, RecognitionEngine, ScribeConfig, SessionStatus, UpdateReceiver, WorkerEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("BUILT_GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILT_TIME_UTC"),
    " on ",
    env!("BUILT_HOST"),
    ")"
);

#[derive(Parser)]
#[command(name = "scanscribe")]
#[command(version = VERSION)]
#[command(about = "Acquire images from files, folders or a camera and extract their text", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session (default)
    Shell,

    /// Recognize one image, or several as a batch
    Recognize {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        outputs: Outputs,
    },

    /// Recognize every image in a folder
    Batch {
        /// Folder to scan (not recursive)
        dir: PathBuf,

        #[command(flatten)]
        outputs: Outputs,

        /// Print the batch summary as JSON instead of the text
        #[arg(long)]
        json: bool,
    },

    /// Show which optional backends are available
    Capabilities,
}

#[derive(clap::Args)]
struct Outputs {
    /// Also save the text to this file
    #[arg(long)]
    text_out: Option<PathBuf>,

    /// Also save the text as a PDF document
    #[arg(long)]
    pdf_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ScribeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let capabilities = Capabilities::detect();

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let (coordinator, updates) = build_coordinator(&config, capabilities)?;
            shell::run(coordinator, updates).await
        }
        Commands::Recognize { files, outputs } => {
            recognize(&config, capabilities, files, outputs).await
        }
        Commands::Batch { dir, outputs, json } => {
            batch(&config, capabilities, dir, outputs, json).await
        }
        Commands::Capabilities => {
            let report = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "commit": env!("BUILT_GIT_COMMIT_HASH"),
                "target": built_info::TARGET,
                "profile": built_info::PROFILE,
                "scanner": capabilities.supports_scanner(),
                "tesseract_engine": capabilities.supports_tesseract(),
                "camera_frames_dir": config.camera.frames_dir,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn build_coordinator(
    config: &ScribeConfig,
    capabilities: Capabilities,
) -> Result<(Coordinator, UpdateReceiver)> {
    let engine = build_engine(config)?;
    let codec = ImageCodec::new(config.batch.extensions.iter().cloned());
    let camera = Arc::new(DirectoryCamera::new(config.camera.frames_dir.clone(), codec));
    let renderer = Arc::new(PdfRenderer::new(&config.export));
    let exporter = Arc::new(FileExporter::new(renderer, &config.export));
    Ok(Coordinator::new(
        config,
        engine,
        camera,
        exporter,
        capabilities,
    ))
}

#[cfg(feature = "tesseract")]
fn build_engine(config: &ScribeConfig) -> Result<Arc<dyn RecognitionEngine>> {
    Ok(Arc::new(scribe_core::TesseractEngine::new(&config.engine)))
}

#[cfg(not(feature = "tesseract"))]
fn build_engine(_config: &ScribeConfig) -> Result<Arc<dyn RecognitionEngine>> {
    bail!("scanscribe was built without the `tesseract` feature; no recognition engine is available")
}

fn announce(notice: &Notice) {
    eprintln!("{notice}");
}

#[derive(Default)]
struct Drained {
    report: Option<BatchReport>,
    errors: usize,
}

/// Apply updates until the coordinator owes nothing, echoing notices
async fn drain(coordinator: &mut Coordinator, updates: &mut UpdateReceiver) -> Drained {
    let mut drained = Drained::default();
    while coordinator.is_busy() {
        let Some(event) = updates.recv().await else {
            break;
        };
        if let WorkerEvent::BatchFinished(report) = &event {
            drained.report = Some(report.clone());
        }
        if let Some(notice) = coordinator.apply(event) {
            if notice.is_error() {
                drained.errors += 1;
            }
            announce(&notice);
        }
    }
    drained
}

async fn recognize(
    config: &ScribeConfig,
    capabilities: Capabilities,
    files: Vec<PathBuf>,
    outputs: Outputs,
) -> Result<()> {
    let (mut coordinator, mut updates) = build_coordinator(config, capabilities)?;
    let single = files.len() == 1;

    announce(&coordinator.select_files(files)?);
    drain(&mut coordinator, &mut updates).await;
    if single {
        if coordinator.current_image().is_none() {
            bail!("{}", last_error(&coordinator));
        }
        announce(&coordinator.run_recognition()?);
        drain(&mut coordinator, &mut updates).await;
    }
    if coordinator.status() == SessionStatus::Failed {
        bail!("{}", last_error(&coordinator));
    }

    print!("{}", coordinator.result_text());
    save_outputs(&mut coordinator, &mut updates, outputs).await?;
    coordinator.shutdown().await;
    Ok(())
}

async fn batch(
    config: &ScribeConfig,
    capabilities: Capabilities,
    dir: PathBuf,
    outputs: Outputs,
    json: bool,
) -> Result<()> {
    let (mut coordinator, mut updates) = build_coordinator(config, capabilities)?;

    announce(
        &coordinator
            .open_folder(&dir)
            .with_context(|| format!("reading folder {}", dir.display()))?,
    );
    let drained = drain(&mut coordinator, &mut updates).await;
    let Some(report) = drained.report else {
        if drained.errors > 0 {
            bail!("cannot process folder {}", dir.display());
        }
        // nothing to process
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", coordinator.result_text());
    }
    save_outputs(&mut coordinator, &mut updates, outputs).await?;
    coordinator.shutdown().await;
    Ok(())
}

async fn save_outputs(
    coordinator: &mut Coordinator,
    updates: &mut UpdateReceiver,
    outputs: Outputs,
) -> Result<()> {
    if let Some(path) = outputs.text_out {
        announce(&coordinator.export_plain_text(path)?);
    }
    if let Some(path) = outputs.pdf_out {
        announce(&coordinator.export_document(path)?);
    }
    let drained = drain(coordinator, updates).await;
    if drained.errors > 0 {
        bail!("{} export(s) failed", drained.errors);
    }
    Ok(())
}

fn last_error(coordinator: &Coordinator) -> String {
    coordinator
        .session()
        .last_error()
        .unwrap_or("recognition failed")
        .to_string()
}
