//! Encoding rendered frames to image files.

use std::path::Path;

use image::{ImageBuffer, Rgba};

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,
}

fn to_image(
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, ScreenshotError> {
    ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(ScreenshotError::InvalidImageData)
}

/// Saves tightly packed RGBA8 pixels to `.png`, `.jpg` or `.jpeg`.
pub fn save_image(
    path: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ScreenshotError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img = to_image(data, width, height)?;

    match extension.as_str() {
        "png" => {
            img.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            // JPEG has no alpha
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => {
            return Err(ScreenshotError::UnsupportedFormat(extension));
        }
    }

    log::info!("saved {width}x{height} frame to {}", path.display());
    Ok(())
}

/// Encodes tightly packed RGBA8 pixels as PNG in memory.
pub fn encode_png(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScreenshotError> {
    let img = to_image(data, width, height)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
