//! Data models and structures
//!
//! Defines the variant profiles, resize specifications and the results
//! recorded against an owning product or post asset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The four derivatives produced for every uploaded image, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Thumb,
    Medium,
    Large,
    Original,
}

impl VariantKind {
    pub const ALL: [VariantKind; 4] = [
        VariantKind::Thumb,
        VariantKind::Medium,
        VariantKind::Large,
        VariantKind::Original,
    ];

    /// Output filename for this variant, e.g. `shoe1_thumb.webp` or `original_shoe1.webp`.
    pub fn file_name(&self, base_name: &str, extension: &str) -> String {
        match self {
            VariantKind::Thumb => format!("{}_thumb.{}", base_name, extension),
            VariantKind::Medium => format!("{}_medium.{}", base_name, extension),
            VariantKind::Large => format!("{}_large.{}", base_name, extension),
            VariantKind::Original => format!("original_{}.{}", base_name, extension),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantKind::Thumb => "thumbnail",
            VariantKind::Medium => "medium",
            VariantKind::Large => "large",
            VariantKind::Original => "original",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Crop (center-anchored) so the output exactly fills the box.
    Cover,
    /// Fit entirely within the box, preserving aspect ratio.
    Inside,
}

/// Target bounding box for one variant. A missing dimension is derived from
/// the source aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub allow_enlargement: bool,
}

impl ResizeSpec {
    pub fn cover(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            fit: FitMode::Cover,
            allow_enlargement: true,
        }
    }

    pub fn inside(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            fit: FitMode::Inside,
            allow_enlargement: false,
        }
    }

    pub fn max_width(width: u32) -> Self {
        Self {
            width: Some(width),
            height: None,
            fit: FitMode::Inside,
            allow_enlargement: false,
        }
    }

    /// Shrink the box by `scale`, flooring each dimension and keeping at least one pixel.
    pub fn scaled(&self, scale: f64) -> Self {
        let shrink = |d: u32| ((d as f64 * scale).floor() as u32).max(1);
        Self {
            width: self.width.map(shrink),
            height: self.height.map(shrink),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

/// One encode of the (resized) source at a given quality and scale.
#[derive(Debug, Clone)]
pub struct EncodeAttempt {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub scale: f64,
}

impl EncodeAttempt {
    pub fn byte_len(&self) -> u64 {
        self.buffer.len() as u64
    }
}

/// A variant written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub byte_len: u64,
    pub quality: u8,
    pub scale: f64,
    /// False when the budget could not be met and the smallest attempt was kept.
    pub within_budget: bool,
}

/// Variant filenames as stored on the owning record (`sizes`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantFiles {
    pub original: Option<String>,
    pub thumb: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

impl VariantFiles {
    pub fn get(&self, kind: VariantKind) -> Option<&str> {
        match kind {
            VariantKind::Thumb => self.thumb.as_deref(),
            VariantKind::Medium => self.medium.as_deref(),
            VariantKind::Large => self.large.as_deref(),
            VariantKind::Original => self.original.as_deref(),
        }
    }

    pub fn set(&mut self, kind: VariantKind, file_name: String) {
        let slot = match kind {
            VariantKind::Thumb => &mut self.thumb,
            VariantKind::Medium => &mut self.medium,
            VariantKind::Large => &mut self.large,
            VariantKind::Original => &mut self.original,
        };
        *slot = Some(file_name);
    }
}

/// The full set of variants for one source image. `width`/`height` are the
/// dimensions of the encoded original variant, not of the upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariantSet {
    pub sizes: VariantFiles,
    pub width: u32,
    pub height: u32,
    pub variants: Vec<VariantResult>,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub target_bytes: u64,
    pub encoder_method: i32,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let output_dir = std::env::var("MEDIA_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let target_bytes = match std::env::var("MEDIA_TARGET_BYTES") {
            Ok(raw) => parse_target_bytes(&raw)?,
            Err(_) => crate::policy::DEFAULT_TARGET_BYTES,
        };

        let encoder_method = match std::env::var("MEDIA_ENCODER_METHOD") {
            Ok(raw) => parse_encoder_method(&raw)?,
            Err(_) => crate::policy::DEFAULT_ENCODER_METHOD,
        };

        Ok(Self {
            output_dir,
            target_bytes,
            encoder_method,
        })
    }
}

fn parse_target_bytes(raw: &str) -> crate::Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(crate::Error::Config(format!(
            "MEDIA_TARGET_BYTES must be a positive integer, got '{}'",
            raw
        ))),
        Ok(bytes) => Ok(bytes),
    }
}

fn parse_encoder_method(raw: &str) -> crate::Result<i32> {
    match raw.trim().parse::<i32>() {
        Ok(method) if (0..=6).contains(&method) => Ok(method),
        _ => Err(crate::Error::Config(format!(
            "MEDIA_ENCODER_METHOD must be between 0 and 6, got '{}'",
            raw
        ))),
    }
}
