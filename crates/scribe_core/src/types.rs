//! Core types shared across the pipeline

use chrono::{DateTime, Local};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for an acquired image
///
/// Assigned once at acquisition time. Clones of a [`RasterImage`] keep the
/// id, so re-loading the same image is recognized as the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of a recognition or batch run within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an image came from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOrigin {
    /// Decoded from a file on disk
    File(PathBuf),
    /// Captured from a camera preview
    Camera {
        device: u32,
        captured_at: DateTime<Local>,
    },
}

impl fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageOrigin::File(path) => write!(
                f,
                "{}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            ImageOrigin::Camera {
                device,
                captured_at,
            } => write!(
                f,
                "camera {} at {}",
                device,
                captured_at.format("%H:%M:%S")
            ),
        }
    }
}

/// A decoded raster image
#[derive(Debug, Clone)]
pub struct RasterImage {
    id: ImageId,
    pixels: DynamicImage,
    origin: ImageOrigin,
}

impl RasterImage {
    /// Wrap decoded pixels, assigning a fresh id
    pub fn new(pixels: DynamicImage, origin: ImageOrigin) -> Self {
        Self {
            id: ImageId::new(),
            pixels,
            origin,
        }
    }

    /// Convenience constructor for images read from `path`
    pub fn from_file(pixels: DynamicImage, path: &Path) -> Self {
        Self::new(pixels, ImageOrigin::File(path.to_path_buf()))
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn origin(&self) -> &ImageOrigin {
        &self.origin
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Number of color channels (1 for gray, 3 for RGB, 4 for RGBA)
    pub fn channels(&self) -> u8 {
        self.pixels.color().channel_count()
    }

    /// Get image dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}
