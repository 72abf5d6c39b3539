//! Recognition worker
//!
//! Runs decoding, recognition, batch jobs and file writes off the UI loop.
//! Nothing here touches session state: every task ends by sending a
//! [`WorkerEvent`] down the update channel, and the loop that owns the
//! coordinator applies it.

use crate::batch::{run_batch, BatchJob, BatchProgress, BatchReport};
use crate::error::{Result, ScribeError};
use crate::export::{ExportFormat, ExportSink};
use crate::imaging::ImageCodec;
use crate::ocr::RecognitionEngine;
use crate::session::RecognitionTicket;
use crate::sources::enumerate_folder;
use crate::types::{RasterImage, RunId};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Receiving end of the update channel, owned by the UI loop
pub type UpdateReceiver = UnboundedReceiver<WorkerEvent>;

/// Results delivered from background tasks to the UI loop
#[derive(Debug)]
pub enum WorkerEvent {
    /// A selected file finished decoding
    ImageDecoded {
        request: u64,
        path: PathBuf,
        result: Result<RasterImage>,
    },
    /// A folder chosen for batch processing was listed
    FolderListed {
        request: u64,
        dir: PathBuf,
        result: Result<Vec<PathBuf>>,
    },
    /// A single-image recognition finished
    Recognized { run: RunId, result: Result<String> },
    /// One more file of a batch is done
    BatchProgress(BatchProgress),
    /// A batch job finished (or was cancelled)
    BatchFinished(BatchReport),
    /// A captured camera frame was written to disk
    CaptureSaved { path: PathBuf, result: Result<()> },
    /// An export finished
    Exported {
        format: ExportFormat,
        path: PathBuf,
        result: Result<()>,
    },
}

pub struct RecognitionWorker {
    engine: Arc<dyn RecognitionEngine>,
    codec: ImageCodec,
    events: UnboundedSender<WorkerEvent>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl RecognitionWorker {
    /// Create a worker and the receiving end of its update channel
    pub fn new(engine: Arc<dyn RecognitionEngine>, codec: ImageCodec) -> (Self, UpdateReceiver) {
        let (events, updates) = mpsc::unbounded_channel();
        let worker = Self {
            engine,
            codec,
            events,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        };
        (worker, updates)
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Number of background tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Decode `path` in the background
    pub fn decode(&self, request: u64, path: PathBuf) {
        let codec = self.codec.clone();
        let file = path.clone();
        let failed = path.clone();
        self.run_blocking(
            move || codec.decode_path(&file),
            move |message| ScribeError::decode(failed, message),
            move |result| WorkerEvent::ImageDecoded {
                request,
                path,
                result,
            },
        );
    }

    /// List the recognized images inside `dir` in the background
    pub fn list_folder(&self, request: u64, dir: PathBuf) {
        let codec = self.codec.clone();
        let folder = dir.clone();
        let failed = dir.clone();
        self.run_blocking(
            move || enumerate_folder(&folder, &codec),
            move |message| ScribeError::io(failed, io::Error::other(message)),
            move |result| WorkerEvent::FolderListed {
                request,
                dir,
                result,
            },
        );
    }

    /// Recognize the ticket's image snapshot in the background
    pub fn recognize(&self, ticket: RecognitionTicket) {
        let engine = self.engine.clone();
        let RecognitionTicket { run, image } = ticket;
        debug!(run = %run, image = %image.id(), "recognition dispatched");
        self.run_blocking(
            move || engine.recognize(&image),
            ScribeError::Engine,
            move |result| WorkerEvent::Recognized { run, result },
        );
    }

    /// Start a batch job; the returned token cancels it between files
    pub fn start_batch(&self, job: BatchJob) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        self.tracker.spawn(run_batch(
            job,
            self.engine.clone(),
            self.codec.clone(),
            cancel.clone(),
            self.events.clone(),
        ));
        cancel
    }

    /// Write a captured frame to `path` in the background
    pub fn save_capture(&self, image: RasterImage, path: PathBuf) {
        let codec = self.codec.clone();
        let file = path.clone();
        let failed = path.clone();
        self.run_blocking(
            move || codec.encode(&image, &file),
            move |message| ScribeError::io(failed, io::Error::other(message)),
            move |result| WorkerEvent::CaptureSaved { path, result },
        );
    }

    /// Run an export in the background
    pub fn export(
        &self,
        sink: Arc<dyn ExportSink>,
        format: ExportFormat,
        text: String,
        path: PathBuf,
    ) {
        let file = path.clone();
        let failed = path.clone();
        self.run_blocking(
            move || match format {
                ExportFormat::PlainText => sink.export_plain_text(&text, &file),
                ExportFormat::Document => sink.export_document(&text, &file),
            },
            move |message| ScribeError::io(failed, io::Error::other(message)),
            move |result| WorkerEvent::Exported {
                format,
                path,
                result,
            },
        );
    }

    /// Run `work` on a blocking thread and send its outcome as an event
    ///
    /// A panicking task still produces an event: `on_panic` turns the join
    /// failure into the error the waiting session expects.
    fn run_blocking<T, W, P, D>(&self, work: W, on_panic: P, deliver: D)
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T> + Send + 'static,
        P: FnOnce(String) -> ScribeError + Send + 'static,
        D: FnOnce(Result<T>) -> WorkerEvent + Send + 'static,
    {
        let events = self.events.clone();
        self.tracker.spawn(async move {
            let result = match tokio::task::spawn_blocking(work).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "background task panicked");
                    Err(on_panic(format!("background task failed: {e}")))
                }
            };
            let _ = events.send(deliver(result));
        });
    }

    /// Cancel every batch and wait for all background tasks to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "waiting for background tasks");
        }
        self.tracker.wait().await;
        // reopen so a worker that outlives shutdown can still be used
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::test_support::{solid_image, write_image, StubEngine};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_recognition_result_delivered_on_channel() {
        let (worker, mut updates) =
            RecognitionWorker::new(Arc::new(StubEngine::default()), ImageCodec::default());
        let mut session = SessionState::new();
        session.set_image(solid_image(7, 3, 0));
        let ticket = session.begin_recognition().unwrap();
        let run = ticket.run;

        worker.recognize(ticket);
        match updates.recv().await.unwrap() {
            WorkerEvent::Recognized { run: got, result } => {
                assert_eq!(got, run);
                assert_eq!(result.unwrap(), "TEXT 7x3\n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_engine_failure_is_typed() {
        let (worker, mut updates) =
            RecognitionWorker::new(Arc::new(StubEngine::failing()), ImageCodec::default());
        let mut session = SessionState::new();
        session.set_image(solid_image(2, 2, 0));
        worker.recognize(session.begin_recognition().unwrap());

        match updates.recv().await.unwrap() {
            WorkerEvent::Recognized { result, .. } => {
                assert!(matches!(result, Err(ScribeError::Engine(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_engine_panic_becomes_engine_error() {
        let (worker, mut updates) =
            RecognitionWorker::new(Arc::new(StubEngine::panicking()), ImageCodec::default());
        let mut session = SessionState::new();
        session.set_image(solid_image(2, 2, 0));
        let ticket = session.begin_recognition().unwrap();
        let run = ticket.run;
        worker.recognize(ticket);

        match updates.recv().await.unwrap() {
            WorkerEvent::Recognized { run: got, result } => {
                assert_eq!(got, run);
                let err = result.unwrap_err();
                assert!(matches!(err, ScribeError::Engine(_)));
                assert!(err.to_string().contains("background task failed"));
            }
            other => panic!("unexpected {other:?}"),
        }
        worker.shutdown().await;
        assert_eq!(worker.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_decode_reports_request_id() {
        let dir = TempDir::new().unwrap();
        let path = write_image(dir.path(), "page.png", 5, 4);
        let (worker, mut updates) =
            RecognitionWorker::new(Arc::new(StubEngine::default()), ImageCodec::default());

        worker.decode(9, path.clone());
        match updates.recv().await.unwrap() {
            WorkerEvent::ImageDecoded {
                request,
                path: got,
                result,
            } => {
                assert_eq!(request, 9);
                assert_eq!(got, path);
                assert_eq!(result.unwrap().dimensions(), (5, 4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_folder_listed_off_loop() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "b.png", 2, 2);
        write_image(dir.path(), "a.png", 2, 2);
        let (worker, mut updates) =
            RecognitionWorker::new(Arc::new(StubEngine::default()), ImageCodec::default());

        worker.list_folder(3, dir.path().to_path_buf());
        match updates.recv().await.unwrap() {
            WorkerEvent::FolderListed { request, result, .. } => {
                assert_eq!(request, 3);
                assert_eq!(result.unwrap().len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }

        worker.list_folder(4, dir.path().join("missing"));
        match updates.recv().await.unwrap() {
            WorkerEvent::FolderListed { result, .. } => assert!(result.is_err()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_joins_tasks() {
        let (worker, _updates) = RecognitionWorker::new(
            Arc::new(StubEngine::with_delay_per_pixel_column(
                std::time::Duration::from_millis(2),
            )),
            ImageCodec::default(),
        );
        let mut session = SessionState::new();
        session.set_image(solid_image(20, 1, 0));
        worker.recognize(session.begin_recognition().unwrap());
        assert_eq!(worker.active_tasks(), 1);

        worker.shutdown().await;
        assert_eq!(worker.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_batches() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| write_image(dir.path(), &format!("{i}.png"), 30, 1))
            .collect();
        let (worker, mut updates) = RecognitionWorker::new(
            Arc::new(StubEngine::with_delay_per_pixel_column(
                std::time::Duration::from_millis(2),
            )),
            ImageCodec::default(),
        );

        let token = worker.start_batch(BatchJob::new(RunId(1), paths, 10));
        worker.shutdown().await;
        assert!(token.is_cancelled());

        let mut finished = None;
        while let Ok(event) = updates.try_recv() {
            if let WorkerEvent::BatchFinished(report) = event {
                finished = Some(report);
            }
        }
        let report = finished.expect("batch reports even when cancelled");
        assert!(report.cancelled || report.processed == 5);
    }
}
