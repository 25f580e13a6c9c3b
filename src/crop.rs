//! Server-side crop of uploaded images to the pixel box the console selected.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn pixel(name: &str, raw: &str) -> Result<u32, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("crop {name} is not a number: {raw:?}")))?;
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(AppError::BadRequest(format!("crop {name} out of range: {raw:?}")));
    }
    Ok(value.round() as u32)
}

impl CropBox {
    /// Builds a box from the optional `x`, `y`, `width`, `height` form fields.
    /// All four or none; fractional pixels are rounded.
    pub fn from_fields(
        x: Option<&str>,
        y: Option<&str>,
        width: Option<&str>,
        height: Option<&str>,
    ) -> Result<Option<CropBox>, AppError> {
        match [x, y, width, height].map(|v| v.map(str::trim).filter(|v| !v.is_empty())) {
            [None, None, None, None] => Ok(None),
            [Some(x), Some(y), Some(width), Some(height)] => {
                let area = CropBox {
                    x: pixel("x", x)?,
                    y: pixel("y", y)?,
                    width: pixel("width", width)?,
                    height: pixel("height", height)?,
                };
                if area.width == 0 || area.height == 0 {
                    return Err(AppError::BadRequest("crop box is empty".to_string()));
                }
                Ok(Some(area))
            }
            _ => Err(AppError::BadRequest(
                "crop needs x, y, width and height together".to_string(),
            )),
        }
    }
}

/// Decodes `bytes`, cuts out `area` (clipped to the image) and re-encodes
/// the result as JPEG.
pub fn crop_to_jpeg(bytes: &[u8], area: CropBox) -> Result<Vec<u8>, AppError> {
    let source = image::load_from_memory(bytes)
        .map_err(|e| AppError::BadRequest(format!("not a readable image: {e}")))?;
    if area.x >= source.width() || area.y >= source.height() {
        return Err(AppError::BadRequest(format!(
            "crop box starts outside the {}x{} image",
            source.width(),
            source.height()
        )));
    }
    let width = area.width.min(source.width() - area.x);
    let height = area.height.min(source.height() - area.y);

    let cropped = DynamicImage::ImageRgb8(source.crop_imm(area.x, area.y, width, height).to_rgb8());
    let mut out = Cursor::new(Vec::new());
    cropped
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| AppError::IoError(std::io::Error::other(e)))?;
    Ok(out.into_inner())
}

/// `beach.png` -> `beach.jpg`, for uploads re-encoded by [`crop_to_jpeg`].
pub fn jpeg_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{stem}.jpg")
}
