//! OCR module
//!
//! The [`RecognitionEngine`] trait is the seam between the coordinator and
//! whatever turns pixels into text. The shipped engine is Tesseract (via
//! leptess); tests plug in deterministic stubs.

use crate::error::Result;
use crate::types::RasterImage;

/// Converts a raster image to UTF-8 text
///
/// Implementations are called from blocking worker threads, never from the
/// UI loop, and may take arbitrarily long.
pub trait RecognitionEngine: Send + Sync {
    /// Short human-readable engine name, used in logs
    fn name(&self) -> &str;

    /// Recognize the text in `image`
    ///
    /// The returned text is passed through untouched; engines must not trim
    /// or otherwise normalize it.
    fn recognize(&self, image: &RasterImage) -> Result<String>;
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;

#[cfg(feature = "tesseract")]
mod tesseract {
    use super::RecognitionEngine;
    use crate::config::EngineSettings;
    use crate::error::{Result, ScribeError};
    use crate::preprocess::prepare_for_ocr;
    use crate::types::RasterImage;
    use leptess::LepTess;
    use std::path::PathBuf;

    /// Tesseract OCR engine
    ///
    /// A fresh Tesseract handle is created per call; `LepTess` is not `Sync`
    /// and initialization is cheap next to recognition itself.
    #[derive(Debug, Clone)]
    pub struct TesseractEngine {
        language: String,
        tessdata_dir: Option<PathBuf>,
        binarize: bool,
    }

    impl TesseractEngine {
        pub fn new(settings: &EngineSettings) -> Self {
            Self {
                language: settings.language.clone(),
                tessdata_dir: settings.tessdata_dir.clone(),
                binarize: settings.binarize,
            }
        }
    }

    impl RecognitionEngine for TesseractEngine {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(&self, image: &RasterImage) -> Result<String> {
            let gray = prepare_for_ocr(image.pixels(), self.binarize);

            // leptess wants an encoded image (PNG, JPEG, etc.), not raw pixels
            let mut png_bytes = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut png_bytes);
            gray.write_to(&mut cursor, image::ImageFormat::Png)
                .map_err(|e| ScribeError::Engine(format!("failed to encode image as PNG: {e}")))?;

            let data_path = self
                .tessdata_dir
                .as_ref()
                .and_then(|dir| dir.to_str());
            let mut tesseract = LepTess::new(data_path, &self.language).map_err(|e| {
                ScribeError::Engine(format!(
                    "failed to initialize Tesseract ({}): {e}. Is Tesseract installed?",
                    self.language
                ))
            })?;

            tesseract
                .set_image_from_mem(&png_bytes)
                .map_err(|e| ScribeError::Engine(format!("failed to load image into Tesseract: {e}")))?;

            tesseract
                .get_utf8_text()
                .map_err(|e| ScribeError::Engine(format!("failed to extract text from image: {e}")))
        }
    }

}
