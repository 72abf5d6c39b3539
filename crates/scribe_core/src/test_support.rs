//! Deterministic collaborators for unit tests

use crate::camera::{CameraDevice, CameraHandle};
use crate::error::{Result, ScribeError};
use crate::export::{Block, ExportSink};
use crate::ocr::RecognitionEngine;
use crate::pdf::DocumentRenderer;
use crate::types::{ImageOrigin, RasterImage};
use chrono::Local;
use image::{DynamicImage, ImageBuffer, Luma};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn solid_image(width: u32, height: u32, level: u8) -> RasterImage {
    let pixels = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([level])));
    RasterImage::from_file(pixels, Path::new("solid.png"))
}

pub fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    ImageBuffer::from_pixel(width, height, Luma([200u8]))
        .save(&path)
        .unwrap();
    path
}

#[derive(Debug, Clone)]
enum StubMode {
    Describe,
    Fixed(String),
    Fail,
    Panic,
}

/// Engine that "recognizes" an image as `TEXT <w>x<h>\n`
#[derive(Debug)]
pub struct StubEngine {
    mode: StubMode,
    delay_per_column: Duration,
    calls: AtomicUsize,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self {
            mode: StubMode::Describe,
            delay_per_column: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

impl StubEngine {
    pub fn failing() -> Self {
        Self {
            mode: StubMode::Fail,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            mode: StubMode::Panic,
            ..Self::default()
        }
    }

    pub fn returning(text: &str) -> Self {
        Self {
            mode: StubMode::Fixed(text.to_string()),
            ..Self::default()
        }
    }

    /// Sleeps `delay` for every pixel column, so wide images are slow
    pub fn with_delay_per_pixel_column(delay: Duration) -> Self {
        Self {
            delay_per_column: delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn recognize(&self, image: &RasterImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay_per_column.is_zero() {
            std::thread::sleep(self.delay_per_column * image.width());
        }
        match &self.mode {
            StubMode::Describe => Ok(format!("TEXT {}x{}\n", image.width(), image.height())),
            StubMode::Fixed(text) => Ok(text.clone()),
            StubMode::Fail => Err(ScribeError::Engine("stub engine failure".to_string())),
            StubMode::Panic => panic!("stub engine crashed"),
        }
    }
}

/// Camera that counts opens and releases; frame `n` is `n` pixels wide
#[derive(Debug, Clone, Default)]
pub struct CountingCamera {
    opens: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    unavailable: bool,
    fail_reads: bool,
}

impl CountingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CameraDevice for CountingCamera {
    fn open(&self, index: u32) -> Result<Box<dyn CameraHandle>> {
        if self.unavailable {
            return Err(ScribeError::DeviceUnavailable {
                index,
                reason: "test device is unplugged".to_string(),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingHandle {
            index,
            reads: 0,
            fail_reads: self.fail_reads,
            releases: self.releases.clone(),
        }))
    }
}

struct CountingHandle {
    index: u32,
    reads: u32,
    fail_reads: bool,
    releases: Arc<AtomicUsize>,
}

impl CameraHandle for CountingHandle {
    fn read_frame(&mut self) -> Result<RasterImage> {
        if self.fail_reads {
            return Err(ScribeError::Capture("test frame unavailable".to_string()));
        }
        self.reads += 1;
        let pixels = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(self.reads, 1, Luma([90u8])));
        Ok(RasterImage::new(
            pixels,
            ImageOrigin::Camera {
                device: self.index,
                captured_at: Local::now(),
            },
        ))
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer that remembers what it was asked to render
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    blocks: Mutex<Vec<Block>>,
}

impl RecordingRenderer {
    pub fn last_blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }
}

impl DocumentRenderer for RecordingRenderer {
    fn render(&self, blocks: &[Block], _destination: &Path) -> Result<()> {
        *self.blocks.lock().unwrap() = blocks.to_vec();
        Ok(())
    }
}

/// Export sink that counts invocations, optionally failing every write
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, destination: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ScribeError::io(
                destination,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        Ok(())
    }
}

impl ExportSink for RecordingSink {
    fn export_plain_text(&self, _text: &str, destination: &Path) -> Result<()> {
        self.record(destination)
    }

    fn export_document(&self, _text: &str, destination: &Path) -> Result<()> {
        self.record(destination)
    }
}
