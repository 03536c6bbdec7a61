//! The crop rendering pipeline.
//!
//! Order of operations, matching how the URL options compose:
//!
//! 1. decode the source in the format its extension implies
//! 2. `trim` — strip a uniform-color border
//! 3. resize — one of:
//!    - both dimensions + `resize` token: scale to exactly WxH (distortion
//!      allowed)
//!    - both dimensions: scale to fill WxH, then crop at the quadrant
//!      anchor (default center)
//!    - one dimension: aspect-preserving scale
//!    - no dimensions: pass through (filter-only crop)
//! 4. filters, in the order their tokens appear in the path
//! 5. encode back to the source format
//!
//! `noupscale` caps step 3 so the source is never enlarged. Quality comes
//! from the `q` token when present, otherwise from the configured default;
//! it only affects lossy output (JPEG).

use super::CropRenderer;
use crate::url::{CropSpec, Quadrant};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to decode source image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode crop: {0}")]
    Encode(image::ImageError),
}

/// Default encoding quality when the crop path carries no `q` token.
pub const DEFAULT_QUALITY: u8 = 90;

/// Production renderer backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageRenderer {
    quality: u8,
}

impl ImageRenderer {
    /// `quality` is the fallback for crops without an explicit `q` token.
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl CropRenderer for ImageRenderer {
    fn render(&self, source: &[u8], ext: &str, spec: &CropSpec) -> Result<Vec<u8>, RenderError> {
        let format = supported_format(ext)?;
        let mut image =
            image::load_from_memory_with_format(source, format).map_err(RenderError::Decode)?;

        if spec.trim() {
            image = trim_border(&image);
        }
        image = resized(image, spec);
        for filter in spec.filters() {
            image = filter.apply(image);
        }

        encode(&image, format, spec.quality().unwrap_or(self.quality))
    }
}

/// Formats with both a decoder and an encoder compiled in. Anything else is
/// refused before decode rather than failing half way through.
fn supported_format(ext: &str) -> Result<ImageFormat, RenderError> {
    match ImageFormat::from_extension(ext) {
        Some(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)) => {
            Ok(f)
        }
        _ => Err(RenderError::UnsupportedFormat(ext.to_string())),
    }
}

fn resized(image: DynamicImage, spec: &CropSpec) -> DynamicImage {
    let (ow, oh) = image.dimensions();
    match (spec.width, spec.height) {
        (None, None) => image,
        (Some(w), None) => {
            let w = if spec.no_upscale() { w.min(ow) } else { w };
            image.resize(w, u32::MAX, FilterType::Lanczos3)
        }
        (None, Some(h)) => {
            let h = if spec.no_upscale() { h.min(oh) } else { h };
            image.resize(u32::MAX, h, FilterType::Lanczos3)
        }
        (Some(w), Some(h)) => {
            let (w, h) = if spec.no_upscale() {
                clamp_box(w, h, ow, oh)
            } else {
                (w, h)
            };
            if spec.resize() {
                image.resize_exact(w, h, FilterType::Lanczos3)
            } else {
                crop_to_fill(image, w, h, spec.quadrant().unwrap_or(Quadrant::Center))
            }
        }
    }
}

/// Shrink a target box that would upscale the source, preserving the box's
/// aspect ratio.
fn clamp_box(w: u32, h: u32, ow: u32, oh: u32) -> (u32, u32) {
    let scale = f64::max(w as f64 / ow as f64, h as f64 / oh as f64);
    if scale <= 1.0 {
        return (w, h);
    }
    (
        ((w as f64 / scale).round() as u32).max(1),
        ((h as f64 / scale).round() as u32).max(1),
    )
}

/// Scale so both dimensions cover the target, then crop the target window
/// at the anchor.
fn crop_to_fill(image: DynamicImage, w: u32, h: u32, anchor: Quadrant) -> DynamicImage {
    let (ow, oh) = image.dimensions();
    let scale = f64::max(w as f64 / ow as f64, h as f64 / oh as f64);
    let rw = ((ow as f64 * scale).round() as u32).max(w);
    let rh = ((oh as f64 * scale).round() as u32).max(h);
    let scaled = image.resize_exact(rw, rh, FilterType::Lanczos3);

    let x = match anchor {
        Quadrant::TopLeft | Quadrant::Left | Quadrant::BottomLeft => 0,
        Quadrant::Top | Quadrant::Center | Quadrant::Bottom => (rw - w) / 2,
        Quadrant::TopRight | Quadrant::Right | Quadrant::BottomRight => rw - w,
    };
    let y = match anchor {
        Quadrant::TopLeft | Quadrant::Top | Quadrant::TopRight => 0,
        Quadrant::Left | Quadrant::Center | Quadrant::Right => (rh - h) / 2,
        Quadrant::BottomLeft | Quadrant::Bottom | Quadrant::BottomRight => rh - h,
    };
    scaled.crop_imm(x, y, w, h)
}

/// Per-channel tolerance when deciding whether a pixel belongs to the
/// border color.
const TRIM_TOLERANCE: i16 = 12;

/// Strip the uniform-color border around the image, using the top-left
/// pixel as the border color. Returns the image unchanged when there is
/// nothing but border.
fn trim_border(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w < 3 || h < 3 {
        return image.clone();
    }

    let bg = *rgba.get_pixel(0, 0);
    let is_border = |x: u32, y: u32| {
        let p = rgba.get_pixel(x, y);
        p.0.iter()
            .zip(bg.0.iter())
            .all(|(a, b)| (*a as i16 - *b as i16).abs() <= TRIM_TOLERANCE)
    };
    let row_is_border = |y: u32| (0..w).all(|x| is_border(x, y));
    let col_is_border = |x: u32| (0..h).all(|y| is_border(x, y));

    let top = (0..h).find(|y| !row_is_border(*y));
    let Some(top) = top else {
        return image.clone();
    };
    let bottom = (0..h).rev().find(|y| !row_is_border(*y)).unwrap_or(top);
    let left = (0..w).find(|x| !col_is_border(*x)).unwrap_or(0);
    let right = (0..w).rev().find(|x| !col_is_border(*x)).unwrap_or(left);

    image.crop_imm(left, top, right - left + 1, bottom - top + 1)
}

fn encode(image: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            image.write_with_encoder(encoder).map_err(RenderError::Encode)?;
        }
        _ => image.write_to(&mut buffer, format).map_err(RenderError::Encode)?,
    }
    Ok(buffer.into_inner())
}
