//! Image decoding and encoding
//!
//! Thin wrapper over the `image` crate that knows which file extensions the
//! application accepts and maps codec failures onto [`ScribeError::Decode`].

use crate::error::{Result, ScribeError};
use crate::types::RasterImage;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Extensions accepted for selection and folder batches (case-insensitive)
pub const DEFAULT_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tiff", "bmp", "gif"];

#[derive(Debug, Clone)]
pub struct ImageCodec {
    extensions: Vec<String>,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()))
    }
}

impl ImageCodec {
    /// Create a codec accepting the given extensions (with or without a dot)
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` carries one of the recognized image extensions
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Decode an image file
    ///
    /// Multi-frame containers (GIF, multi-page TIFF) yield their first frame.
    pub fn decode_path(&self, path: &Path) -> Result<RasterImage> {
        let pixels = image::open(path).map_err(|e| ScribeError::decode(path, e))?;
        debug!(
            path = %path.display(),
            width = pixels.width(),
            height = pixels.height(),
            "decoded image"
        );
        Ok(RasterImage::from_file(pixels, path))
    }

    /// Encode `image` to `path`, format chosen from the extension
    pub fn encode(&self, image: &RasterImage, path: &Path) -> Result<()> {
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
            .unwrap_or(false);

        // JPEG has no alpha channel
        let result = if is_jpeg && image.pixels().color().has_alpha() {
            DynamicImage::ImageRgb8(image.pixels().to_rgb8()).save(path)
        } else {
            image.pixels().save(path)
        };

        result.map_err(|e| match e {
            image::ImageError::IoError(source) => ScribeError::io(path, source),
            other => ScribeError::decode(path, other),
        })
    }
}
