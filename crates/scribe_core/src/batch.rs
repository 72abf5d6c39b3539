//! Batch job processing
//!
//! A batch walks its files strictly in input order, recognizing each one and
//! appending a headed entry to the combined text. A file that fails to decode
//! or recognize leaves an error marker and the batch moves on.

use crate::error::{Result, ScribeError};
use crate::imaging::ImageCodec;
use crate::ocr::RecognitionEngine;
use crate::types::RunId;
use crate::worker::WorkerEvent;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Progress after one file of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub run: RunId,
    /// Files attempted so far, successful or not
    pub completed: usize,
    pub total: usize,
    /// The file just finished
    pub current: PathBuf,
}

/// Final outcome of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub run: RunId,
    /// Combined text with per-file headers and error markers
    pub text: String,
    /// Files recognized successfully
    pub processed: usize,
    /// Files that produced an error marker
    pub failed: usize,
    pub total: usize,
    /// The job stopped early on request
    pub cancelled: bool,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Batch processing complete: {}/{} files processed",
            self.processed, self.total
        );
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Accumulator for one batch run
#[derive(Debug)]
pub struct BatchJob {
    run: RunId,
    paths: Vec<PathBuf>,
    completed: usize,
    processed: usize,
    failed: usize,
    accumulated: String,
    separator: String,
}

impl BatchJob {
    pub fn new(run: RunId, paths: Vec<PathBuf>, separator_width: usize) -> Self {
        Self {
            run,
            paths,
            completed: 0,
            processed: 0,
            failed: 0,
            accumulated: String::new(),
            separator: "=".repeat(separator_width),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn total(&self) -> usize {
        self.paths.len()
    }

    /// Append the recognized text of `path`
    pub fn record_success(&mut self, path: &Path, text: &str) -> BatchProgress {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.accumulated.push('\n');
        self.accumulated.push_str(&self.separator);
        self.accumulated.push_str("\nFILE: ");
        self.accumulated.push_str(&name);
        self.accumulated.push('\n');
        self.accumulated.push_str(&self.separator);
        self.accumulated.push('\n');
        self.accumulated.push_str(text);
        self.accumulated.push('\n');
        self.processed += 1;
        self.advance(path)
    }

    /// Append an error marker for `path`
    pub fn record_failure(&mut self, path: &Path, error: &ScribeError) -> BatchProgress {
        self.accumulated
            .push_str(&format!("\nERROR processing {}: {}\n", path.display(), error));
        self.failed += 1;
        self.advance(path)
    }

    pub fn finish(self, cancelled: bool) -> BatchReport {
        BatchReport {
            run: self.run,
            text: self.accumulated,
            processed: self.processed,
            failed: self.failed,
            total: self.paths.len(),
            cancelled,
        }
    }

    fn advance(&mut self, path: &Path) -> BatchProgress {
        self.completed += 1;
        BatchProgress {
            run: self.run,
            completed: self.completed,
            total: self.paths.len(),
            current: path.to_path_buf(),
        }
    }
}

/// Decode and recognize a single file
fn recognize_file(codec: &ImageCodec, engine: &dyn RecognitionEngine, path: &Path) -> Result<String> {
    let image = codec.decode_path(path)?;
    engine.recognize(&image)
}

/// Drive `job` to completion, reporting through `events`
///
/// Each file is handed to a blocking thread and awaited before the next one
/// starts, so entries land in input order. `cancel` is checked between files.
pub(crate) async fn run_batch(
    mut job: BatchJob,
    engine: Arc<dyn RecognitionEngine>,
    codec: ImageCodec,
    cancel: CancellationToken,
    events: UnboundedSender<WorkerEvent>,
) {
    info!(run = %job.run(), files = job.total(), engine = engine.name(), "batch started");
    let paths = job.paths().to_vec();
    let mut cancelled = false;

    for path in paths {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let engine = engine.clone();
        let codec = codec.clone();
        let file = path.clone();
        let outcome = tokio::task::spawn_blocking(move || recognize_file(&codec, engine.as_ref(), &file))
            .await
            .unwrap_or_else(|e| Err(ScribeError::Engine(format!("recognition task failed: {e}"))));

        let progress = match outcome {
            Ok(text) => job.record_success(&path, &text),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "batch entry failed");
                job.record_failure(&path, &e)
            }
        };
        if events.send(WorkerEvent::BatchProgress(progress)).is_err() {
            // nobody is listening any more; the session is gone
            cancelled = true;
            break;
        }
    }

    let report = job.finish(cancelled);
    info!(
        run = %report.run,
        processed = report.processed,
        failed = report.failed,
        total = report.total,
        cancelled = report.cancelled,
        "batch finished"
    );
    let _ = events.send(WorkerEvent::BatchFinished(report));
}
