//! Turn image files into the raw RGB frames the matrix expects.
//!
//! A frame is the image resized to the grid and flattened row by row,
//! three bytes (red, green, blue) per pixel.

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::{HEIGHT, IMAGE_SIZE, WIDTH};

/// Decode an image, drop any alpha channel and resize it to the grid.
///
/// The aspect ratio is not preserved.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("Cannot load image {}", path.display()))?
        .to_rgb8();

    Ok(imageops::resize(&img, WIDTH, HEIGHT, FilterType::CatmullRom))
}

pub fn image_to_bytes(img: &RgbImage) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(img.len());
    for y in 0..img.height() {
        for x in 0..img.width() {
            pixels.extend_from_slice(&img.get_pixel(x, y).0);
        }
    }
    pixels
}

/// Load `path` and return the raw frame, checked to be exactly one grid in size.
pub fn encode_file(path: &Path) -> Result<Vec<u8>> {
    let img = load_image(path)?;
    let data = image_to_bytes(&img);
    if data.len() != IMAGE_SIZE {
        bail!(
            "Image must be {} bytes ({}x{} RGB), got {}",
            IMAGE_SIZE,
            WIDTH,
            HEIGHT,
            data.len()
        );
    }
    Ok(data)
}
