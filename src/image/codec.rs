use super::ImageEncoder;
use crate::models::{FitMode, ResizeSpec, SourceMetadata};
use crate::policy::DEFAULT_ENCODER_METHOD;
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use libwebp_sys::WebPConfig;
use std::path::Path;

fn decode_error(path: &Path, message: impl ToString) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>> {
    ImageReader::open(path)
        .map_err(|e| decode_error(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))
}

/// Read dimensions and format without decoding pixel data.
pub fn read_source_metadata(path: &Path) -> Result<SourceMetadata> {
    let reader = open_reader(path)?;
    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    if format.is_none() {
        return Err(decode_error(path, "unrecognized image format"));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| decode_error(path, e))?;

    Ok(SourceMetadata {
        width,
        height,
        format,
    })
}

pub fn decode_source(path: &Path) -> Result<DynamicImage> {
    open_reader(path)?
        .decode()
        .map_err(|e| decode_error(path, e))
}

/// Output dimensions for `spec` applied to a `source_width` x `source_height` image.
pub fn target_dimensions(spec: &ResizeSpec, source_width: u32, source_height: u32) -> (u32, u32) {
    let sw = source_width.max(1) as f64;
    let sh = source_height.max(1) as f64;

    match (spec.fit, spec.width, spec.height) {
        (_, None, None) => (source_width, source_height),
        (FitMode::Cover, Some(w), Some(h)) => {
            if spec.allow_enlargement {
                (w, h)
            } else {
                (w.min(source_width), h.min(source_height))
            }
        }
        (_, width, height) => {
            let ratio_w = width.map(|w| w as f64 / sw);
            let ratio_h = height.map(|h| h as f64 / sh);
            let mut ratio = match (ratio_w, ratio_h) {
                (Some(rw), Some(rh)) => rw.min(rh),
                (Some(r), None) | (None, Some(r)) => r,
                (None, None) => 1.0,
            };
            if !spec.allow_enlargement {
                ratio = ratio.min(1.0);
            }
            let scale = |d: f64| ((d * ratio).round() as u32).max(1);
            (scale(sw), scale(sh))
        }
    }
}

pub fn apply_resize(image: &DynamicImage, spec: &ResizeSpec) -> DynamicImage {
    let (source_width, source_height) = image.dimensions();
    let (width, height) = target_dimensions(spec, source_width, source_height);

    if (width, height) == (source_width, source_height) {
        return image.clone();
    }

    match (spec.fit, spec.width, spec.height) {
        (FitMode::Cover, Some(_), Some(_)) => {
            image.resize_to_fill(width, height, FilterType::Lanczos3)
        }
        _ => image.resize_exact(width, height, FilterType::Lanczos3),
    }
}

/// Lossy WebP via libwebp. `method` is libwebp's effort knob (0 fast .. 6 best).
pub struct WebpEncoder {
    method: i32,
}

impl WebpEncoder {
    pub fn new() -> Self {
        Self::with_method(DEFAULT_ENCODER_METHOD)
    }

    pub fn with_method(method: i32) -> Self {
        Self {
            method: method.clamp(0, 6),
        }
    }

    fn encode_with(&self, encoder: webp::Encoder<'_>, quality: u8) -> Result<Vec<u8>> {
        let mut config = WebPConfig::new()
            .map_err(|_| Error::Encode("Failed to initialise WebP config".to_string()))?;
        config.lossless = 0;
        config.quality = quality as f32;
        config.method = self.method;

        let memory = encoder
            .encode_advanced(&config)
            .map_err(|e| Error::Encode(format!("WebP encoding failed: {:?}", e)))?;
        Ok(memory.to_vec())
    }
}

impl Default for WebpEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEncoder for WebpEncoder {
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();

        if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            self.encode_with(webp::Encoder::from_rgba(rgba.as_raw(), width, height), quality)
        } else {
            let rgb = image.to_rgb8();
            self.encode_with(webp::Encoder::from_rgb(rgb.as_raw(), width, height), quality)
        }
    }

    fn extension(&self) -> &'static str {
        "webp"
    }
}
