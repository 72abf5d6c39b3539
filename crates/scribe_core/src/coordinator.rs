//! The coordinator: UI-side owner of a session
//!
//! Exactly one loop owns a [`Coordinator`]. User actions call its methods,
//! which validate preconditions, update the session and dispatch work to the
//! [`RecognitionWorker`]. Background results come back as [`WorkerEvent`]s on
//! the update channel, and [`Coordinator::apply`] is the only place they are
//! written into the session.

use crate::batch::{BatchJob, BatchProgress};
use crate::camera::{CameraDevice, CameraSession};
use crate::capabilities::Capabilities;
use crate::config::{CameraSettings, ScribeConfig};
use crate::error::{Result, ScribeError};
use crate::export::{ExportFormat, ExportSink};
use crate::imaging::ImageCodec;
use crate::ocr::RecognitionEngine;
use crate::session::{Completion, SessionState, SessionStatus};
use crate::sources::Selection;
use crate::types::RasterImage;
use crate::worker::{RecognitionWorker, UpdateReceiver, WorkerEvent};
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A user-visible message produced by an action or a background result
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Progress(BatchProgress),
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(message) => f.write_str(message),
            Notice::Progress(p) => write!(
                f,
                "Processing {}/{}: {}",
                p.completed,
                p.total,
                file_label(&p.current)
            ),
            Notice::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

pub struct Coordinator {
    session: SessionState,
    worker: RecognitionWorker,
    codec: ImageCodec,
    camera_device: Arc<dyn CameraDevice>,
    camera: Option<CameraSession>,
    camera_settings: CameraSettings,
    exporter: Arc<dyn ExportSink>,
    capabilities: Capabilities,
    separator_width: usize,
    next_request: u64,
    pending_decode: Option<u64>,
    pending_listing: Option<u64>,
    pending_writes: usize,
    batch_cancel: Option<CancellationToken>,
}

impl Coordinator {
    /// Build a coordinator and the update channel its owner must drain
    pub fn new(
        config: &ScribeConfig,
        engine: Arc<dyn RecognitionEngine>,
        camera_device: Arc<dyn CameraDevice>,
        exporter: Arc<dyn ExportSink>,
        capabilities: Capabilities,
    ) -> (Self, UpdateReceiver) {
        let codec = ImageCodec::new(config.batch.extensions.iter().cloned());
        let (worker, updates) = RecognitionWorker::new(engine, codec.clone());
        info!(engine = worker.engine_name(), "coordinator ready");
        let coordinator = Self {
            session: SessionState::new(),
            worker,
            codec,
            camera_device,
            camera: None,
            camera_settings: config.camera.clone(),
            exporter,
            capabilities,
            separator_width: config.batch.separator_width,
            next_request: 0,
            pending_decode: None,
            pending_listing: None,
            pending_writes: 0,
            batch_cancel: None,
        };
        (coordinator, updates)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn result_text(&self) -> &str {
        self.session.result_text()
    }

    pub fn current_image(&self) -> Option<&RasterImage> {
        self.session.current_image()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn codec(&self) -> &ImageCodec {
        &self.codec
    }

    /// True while any background result is still owed to the session
    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
            || self.pending_decode.is_some()
            || self.pending_listing.is_some()
            || self.pending_writes > 0
    }

    // ---- acquisition -------------------------------------------------

    /// Load one file as the current image, or batch several
    pub fn select_files(&mut self, paths: Vec<PathBuf>) -> Result<Notice> {
        match Selection::from_paths(paths) {
            Selection::Empty => Ok(Notice::Info("No files selected".to_string())),
            Selection::Single(path) => {
                self.next_request += 1;
                let request = self.next_request;
                self.pending_decode = Some(request);
                self.session.begin_acquiring();
                let notice = Notice::Info(format!("Loading {}", file_label(&path)));
                self.worker.decode(request, path);
                Ok(notice)
            }
            Selection::Batch(paths) => self.start_batch(paths),
        }
    }

    /// Batch every recognized image directly inside `dir`
    ///
    /// The folder is listed in the background; the batch starts when the
    /// listing is applied.
    pub fn open_folder(&mut self, dir: &Path) -> Result<Notice> {
        if self.session.is_busy() {
            return Err(ScribeError::invalid_state(
                "recognition already in progress",
            ));
        }
        self.next_request += 1;
        let request = self.next_request;
        self.pending_listing = Some(request);
        self.worker.list_folder(request, dir.to_path_buf());
        Ok(Notice::Info(format!("Reading folder {}", dir.display())))
    }

    fn start_batch(&mut self, paths: Vec<PathBuf>) -> Result<Notice> {
        let run = self.session.begin_batch()?;
        let total = paths.len();
        let job = BatchJob::new(run, paths, self.separator_width);
        self.batch_cancel = Some(self.worker.start_batch(job));
        Ok(Notice::Info(format!("Processing {total} files")))
    }

    /// Stop the running batch after its current file
    pub fn cancel_batch(&mut self) -> Result<Notice> {
        let token = self
            .batch_cancel
            .as_ref()
            .ok_or_else(|| ScribeError::invalid_state("no batch is running"))?;
        token.cancel();
        Ok(Notice::Info(
            "Cancelling batch after the current file".to_string(),
        ))
    }

    /// Scanner acquisition falls back to file selection
    pub fn scan(&self) -> Result<Notice> {
        if !self.capabilities.supports_scanner() {
            return Err(ScribeError::invalid_state(
                "scanner support is not available on this system",
            ));
        }
        Ok(Notice::Info(
            "Scan the document with your scanner software, then load the scanned file with `open`"
                .to_string(),
        ))
    }

    // ---- camera --------------------------------------------------------

    pub fn camera_active(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraSession::is_active)
    }

    /// Target interval between preview ticks
    pub fn preview_interval(&self) -> Duration {
        self.camera_settings.preview_interval()
    }

    /// Open a camera (the configured default when `index` is `None`)
    pub fn open_camera(&mut self, index: Option<u32>) -> Result<Notice> {
        if self.camera.is_some() {
            return Err(ScribeError::invalid_state("camera is already open"));
        }
        let index = index.unwrap_or(self.camera_settings.device_index);
        self.session.begin_acquiring();
        match CameraSession::open(self.camera_device.as_ref(), index) {
            Ok(session) => {
                self.camera = Some(session);
                Ok(Notice::Info(format!(
                    "Camera {index} open - capture or close when ready"
                )))
            }
            Err(e) => {
                self.session.fail_acquiring(&e);
                Err(e)
            }
        }
    }

    /// Pull one preview frame; returns its dimensions when one was read
    ///
    /// Read failures are skipped: the preview simply tries again next tick.
    pub fn preview_tick(&mut self) -> Option<(u32, u32)> {
        let camera = self.camera.as_mut()?;
        let index = camera.index();
        match camera.preview_frame() {
            Ok(frame) => Some(frame.dimensions()),
            Err(e) => {
                warn!(camera = index, error = %e, "preview frame skipped");
                None
            }
        }
    }

    /// Take the latest preview frame as the current image and release the camera
    pub fn capture(&mut self) -> Result<Notice> {
        let camera = self
            .camera
            .take()
            .ok_or_else(|| ScribeError::invalid_state("camera is not open"))?;

        let frame = match camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                self.session.fail_acquiring(&e);
                return Err(e);
            }
        };

        let (width, height) = frame.dimensions();
        // a capture supersedes any file still decoding
        self.pending_decode = None;
        if self.camera_settings.save_captures {
            let name = format!("camera_capture_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
            let path = self.camera_settings.capture_dir.join(name);
            self.pending_writes += 1;
            self.worker.save_capture(frame.clone(), path);
        }
        self.session.set_image(frame);
        Ok(Notice::Info(format!("Image captured ({width}x{height})")))
    }

    /// Stop the preview without capturing
    pub fn close_camera(&mut self) -> Result<Notice> {
        let camera = self
            .camera
            .take()
            .ok_or_else(|| ScribeError::invalid_state("camera is not open"))?;
        camera.close();
        self.session.abandon_acquiring();
        Ok(Notice::Info("Camera closed".to_string()))
    }

    // ---- recognition and export ----------------------------------------

    /// Recognize the current image in the background
    pub fn run_recognition(&mut self) -> Result<Notice> {
        let ticket = self.session.begin_recognition()?;
        self.worker.recognize(ticket);
        Ok(Notice::Info("Running OCR analysis...".to_string()))
    }

    pub fn export_plain_text(&mut self, destination: PathBuf) -> Result<Notice> {
        self.export(ExportFormat::PlainText, destination)
    }

    pub fn export_document(&mut self, destination: PathBuf) -> Result<Notice> {
        self.export(ExportFormat::Document, destination)
    }

    fn export(&mut self, format: ExportFormat, destination: PathBuf) -> Result<Notice> {
        let text = self.session.result_text();
        if text.trim().is_empty() {
            return Err(ScribeError::invalid_state("No text to save. Run OCR first."));
        }
        let notice = Notice::Info(format!(
            "Saving {format} to {}",
            destination.display()
        ));
        self.pending_writes += 1;
        self.worker
            .export(self.exporter.clone(), format, text.to_string(), destination);
        Ok(notice)
    }

    /// Drop the image and result
    pub fn clear(&mut self) -> Notice {
        self.pending_decode = None;
        self.pending_listing = None;
        self.session.clear();
        Notice::Info("Ready - select an input method to begin".to_string())
    }

    // ---- update channel ------------------------------------------------

    /// Write a background result into the session
    ///
    /// Returns the notice to show the user, if any.
    pub fn apply(&mut self, event: WorkerEvent) -> Option<Notice> {
        match event {
            WorkerEvent::ImageDecoded {
                request,
                path,
                result,
            } => {
                if self.pending_decode != Some(request) {
                    debug!(request, path = %path.display(), "stale decode ignored");
                    return None;
                }
                self.pending_decode = None;
                match result {
                    Ok(image) => {
                        let (width, height) = image.dimensions();
                        self.session.set_image(image);
                        Some(Notice::Info(format!(
                            "Selected: {} ({width}x{height})",
                            file_label(&path)
                        )))
                    }
                    Err(e) => {
                        self.session.fail_acquiring(&e);
                        Some(Notice::Error(format!("Failed to load image: {e}")))
                    }
                }
            }

            WorkerEvent::FolderListed {
                request,
                dir,
                result,
            } => {
                if self.pending_listing != Some(request) {
                    debug!(request, dir = %dir.display(), "stale folder listing ignored");
                    return None;
                }
                self.pending_listing = None;
                match result {
                    Ok(files) if files.is_empty() => Some(Notice::Info(format!(
                        "No image files found in {}",
                        dir.display()
                    ))),
                    Ok(files) => Some(match self.start_batch(files) {
                        Ok(notice) => notice,
                        Err(e) => Notice::Error(format!("Cannot start batch: {e}")),
                    }),
                    Err(e) => Some(Notice::Error(format!("Cannot read folder: {e}"))),
                }
            }

            WorkerEvent::Recognized { run, result } => {
                let outcome = match &result {
                    Ok(_) => None,
                    Err(e) => Some(e.to_string()),
                };
                let completion = match result {
                    Ok(text) => self.session.complete_recognition(run, text),
                    Err(e) => self.session.fail_recognition(run, &e),
                };
                match (completion, outcome) {
                    (Ok(Completion::Applied), None) => {
                        Some(Notice::Info("OCR completed successfully".to_string()))
                    }
                    (Ok(Completion::Applied), Some(message)) => {
                        Some(Notice::Error(format!("OCR failed: {message}")))
                    }
                    (Ok(Completion::Superseded), _) => Some(Notice::Info(
                        "OCR result discarded: the image changed".to_string(),
                    )),
                    (Err(e), _) => {
                        warn!(run = %run, error = %e, "recognition result dropped");
                        None
                    }
                }
            }

            WorkerEvent::BatchProgress(progress) => Some(Notice::Progress(progress)),

            WorkerEvent::BatchFinished(report) => {
                self.batch_cancel = None;
                let summary = report.summary();
                match self.session.complete_batch(report.run, report.text) {
                    Ok(()) => Some(Notice::Info(summary)),
                    Err(e) => {
                        warn!(run = %report.run, error = %e, "batch result dropped");
                        None
                    }
                }
            }

            WorkerEvent::CaptureSaved { path, result } => {
                self.pending_writes = self.pending_writes.saturating_sub(1);
                Some(match result {
                    Ok(()) => Notice::Info(format!("Image captured: {}", file_label(&path))),
                    Err(e) => Notice::Error(format!("Failed to save capture: {e}")),
                })
            }

            WorkerEvent::Exported {
                format,
                path,
                result,
            } => {
                self.pending_writes = self.pending_writes.saturating_sub(1);
                Some(match result {
                    Ok(()) => Notice::Info(format!(
                        "{} saved: {}",
                        match format {
                            ExportFormat::PlainText => "Text",
                            ExportFormat::Document => "PDF",
                        },
                        path.display()
                    )),
                    Err(e) => Notice::Error(format!("Failed to save file: {e}")),
                })
            }
        }
    }

    /// Apply updates until nothing is owed to the session
    pub async fn settle(&mut self, updates: &mut UpdateReceiver) -> Vec<Notice> {
        let mut notices = Vec::new();
        while self.is_busy() {
            match updates.recv().await {
                Some(event) => notices.extend(self.apply(event)),
                None => break,
            }
        }
        notices
    }

    /// Release the camera, cancel batches and join every background task
    pub async fn shutdown(&mut self) {
        if let Some(camera) = self.camera.take() {
            camera.close();
            self.session.abandon_acquiring();
        }
        self.worker.shutdown().await;
        info!("coordinator shut down");
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
