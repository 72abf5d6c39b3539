//! Core acquisition and recognition pipeline for scanscribe
//!
//! This crate holds everything between "the user picked an image" and
//! "the recognized text is on disk": session state, the acquisition
//! sources (files, folders, camera), the background recognition worker,
//! batch jobs, and the export sinks. The front end owns a single
//! [`Coordinator`] and feeds it the updates produced by background tasks.

pub mod batch;
pub mod camera;
pub mod capabilities;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod imaging;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod session;
pub mod sources;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{BatchProgress, BatchReport};
pub use camera::{CameraDevice, CameraHandle, CameraSession, DirectoryCamera};
pub use capabilities::Capabilities;
pub use config::ScribeConfig;
pub use coordinator::{Coordinator, Notice};
pub use error::{Result, ScribeError};
pub use export::{ExportFormat, ExportSink, FileExporter};
pub use imaging::ImageCodec;
pub use ocr::RecognitionEngine;
#[cfg(feature = "tesseract")]
pub use ocr::TesseractEngine;
pub use pdf::{DocumentRenderer, PdfRenderer};
pub use session::{SessionState, SessionStatus};
pub use types::*;
pub use worker::{RecognitionWorker, UpdateReceiver, WorkerEvent};
