//! Camera acquisition
//!
//! A [`CameraDevice`] opens [`CameraHandle`]s; a [`CameraSession`] owns one
//! open handle for as long as the preview runs. The session releases its
//! handle exactly once, whichever way it ends: capture, close, or being
//! dropped along with the window that owned it.

use crate::error::{Result, ScribeError};
use crate::imaging::ImageCodec;
use crate::types::{ImageOrigin, RasterImage};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// An open camera
pub trait CameraHandle: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<RasterImage>;

    /// Release the device. Called exactly once per successful open.
    fn release(&mut self);
}

/// Something that can open cameras by index
pub trait CameraDevice: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CameraHandle>>;
}

/// A live preview on one camera
pub struct CameraSession {
    index: u32,
    handle: Option<Box<dyn CameraHandle>>,
    latest: Option<RasterImage>,
    frames: u64,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("index", &self.index)
            .field("active", &self.is_active())
            .field("frames", &self.frames)
            .finish()
    }
}

impl CameraSession {
    /// Open camera `index` on `device`
    pub fn open(device: &dyn CameraDevice, index: u32) -> Result<Self> {
        let handle = device.open(index)?;
        info!(camera = index, "camera opened");
        Ok(Self {
            index,
            handle: Some(handle),
            latest: None,
            frames: 0,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of preview frames read so far
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// The most recent preview frame, if any
    pub fn latest_frame(&self) -> Option<&RasterImage> {
        self.latest.as_ref()
    }

    /// Read one preview frame and keep it as the capture candidate
    pub fn preview_frame(&mut self) -> Result<&RasterImage> {
        let frame = self.read_one()?;
        self.frames += 1;
        Ok(self.latest.insert(frame))
    }

    /// Take the most recent frame (reading one if the preview never ran),
    /// then release the device
    pub fn capture(mut self) -> Result<RasterImage> {
        let frame = match self.latest.take() {
            Some(frame) => Ok(frame),
            None => self.read_one(),
        };
        self.release();
        frame
    }

    /// Stop the preview and release the device without capturing
    pub fn close(mut self) {
        self.release();
    }

    fn read_one(&mut self) -> Result<RasterImage> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ScribeError::invalid_state("camera is closed"))?;
        handle.read_frame()
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            info!(camera = self.index, frames = self.frames, "camera released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera backed by directories of still frames
///
/// Device `N` is `<root>/video<N>/`; its image files are served in name
/// order and the sequence restarts after the last one.
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    root: PathBuf,
    codec: ImageCodec,
}

impl DirectoryCamera {
    pub fn new(root: impl Into<PathBuf>, codec: ImageCodec) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    pub fn device_dir(&self, index: u32) -> PathBuf {
        self.root.join(format!("video{index}"))
    }
}

impl CameraDevice for DirectoryCamera {
    fn open(&self, index: u32) -> Result<Box<dyn CameraHandle>> {
        let dir = self.device_dir(index);
        let unavailable = |reason: String| ScribeError::DeviceUnavailable { index, reason };

        let entries = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| unavailable(format!("{}: {e}", dir.display())))?;

        let frames: Vec<PathBuf> = entries
            .into_iter()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.codec.is_supported(path))
            .collect();

        if frames.is_empty() {
            return Err(unavailable(format!("no frames in {}", dir.display())));
        }

        debug!(camera = index, frames = frames.len(), "frame directory opened");
        Ok(Box::new(DirectoryFeed {
            index,
            frames,
            next: 0,
            released: false,
        }))
    }
}

struct DirectoryFeed {
    index: u32,
    frames: Vec<PathBuf>,
    next: usize,
    released: bool,
}

impl DirectoryFeed {
    fn read(&self, path: &Path) -> Result<RasterImage> {
        let pixels = image::open(path)
            .map_err(|e| ScribeError::Capture(format!("{}: {e}", path.display())))?;
        Ok(RasterImage::new(
            pixels,
            ImageOrigin::Camera {
                device: self.index,
                captured_at: Local::now(),
            },
        ))
    }
}

impl CameraHandle for DirectoryFeed {
    fn read_frame(&mut self) -> Result<RasterImage> {
        if self.released {
            return Err(ScribeError::Capture("device already released".to_string()));
        }
        let path = self.frames[self.next % self.frames.len()].clone();
        self.next = self.next.wrapping_add(1);
        self.read(&path)
    }

    fn release(&mut self) {
        if self.released {
            warn!(camera = self.index, "release called twice");
        }
        self.released = true;
    }
}
