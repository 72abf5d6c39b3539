//! Image preprocessing ahead of recognition
//!
//! - Grayscale conversion
//! - Optional global binarization (Otsu threshold)

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;

/// Prepare an image for the recognition engine
pub fn prepare_for_ocr(input: &DynamicImage, binarize: bool) -> GrayImage {
    let gray = input.to_luma8();
    if binarize {
        binarize_otsu(&gray)
    } else {
        gray
    }
}

/// Threshold a grayscale image at its Otsu level
pub fn binarize_otsu(input: &GrayImage) -> GrayImage {
    let level = otsu_level(input);
    let mut output = input.clone();
    for pixel in output.pixels_mut() {
        *pixel = if pixel[0] > level { Luma([255]) } else { Luma([0]) };
    }
    output
}
