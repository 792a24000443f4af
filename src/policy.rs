//! Search policy for size-constrained encoding
//!
//! The quality ladder, scale step and byte budget are plain values so callers
//! and tests can swap them without touching the search itself.

use crate::models::ResizeSpec;
use crate::{Error, Result};

pub const DEFAULT_TARGET_BYTES: u64 = 100 * 1024;
pub const DEFAULT_SCALE_STEP: f64 = 0.85;
pub const DEFAULT_MIN_SCALE: f64 = 0.4;
pub const DEFAULT_ENCODER_METHOD: i32 = 6;

pub const DEFAULT_QUALITIES: [u8; 15] = [
    85, 80, 75, 70, 65, 60, 55, 50, 45, 40, 35, 30, 25, 20, 15,
];

pub const LEGACY_START_QUALITY: u8 = 85;
pub const LEGACY_QUALITY_STEP: u8 = 10;
pub const LEGACY_MIN_QUALITY: u8 = 40;
pub const LEGACY_MAX_WIDTH: u32 = 1200;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePolicy {
    /// Tried in order; expected to be strictly descending.
    pub qualities: Vec<u8>,
    pub scale_step: f64,
    pub target_bytes: u64,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            qualities: DEFAULT_QUALITIES.to_vec(),
            scale_step: DEFAULT_SCALE_STEP,
            target_bytes: DEFAULT_TARGET_BYTES,
        }
    }
}

impl TranscodePolicy {
    pub fn with_target_bytes(mut self, target_bytes: u64) -> Self {
        self.target_bytes = target_bytes;
        self
    }

    pub fn with_qualities(mut self, qualities: Vec<u8>) -> Self {
        self.qualities = qualities;
        self
    }

    pub fn with_scale_step(mut self, scale_step: f64) -> Self {
        self.scale_step = scale_step;
        self
    }

    /// Quality-only policy of the older upload path: 85 down to 40 in steps
    /// of 10, the last step clamped to the floor.
    pub fn legacy() -> Self {
        let mut qualities = Vec::new();
        let mut quality = LEGACY_START_QUALITY;
        loop {
            qualities.push(quality);
            if quality <= LEGACY_MIN_QUALITY {
                break;
            }
            quality = quality
                .saturating_sub(LEGACY_QUALITY_STEP)
                .max(LEGACY_MIN_QUALITY);
        }

        Self {
            qualities,
            scale_step: DEFAULT_SCALE_STEP,
            target_bytes: DEFAULT_TARGET_BYTES,
        }
    }
}

/// Parameters for one size-constrained encode.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantOptions {
    pub label: String,
    pub target_bytes: u64,
    pub resize: Option<ResizeSpec>,
    pub allow_scale_down: bool,
    pub min_scale: f64,
    pub scale_step: f64,
}

impl VariantOptions {
    pub fn new(label: impl Into<String>, policy: &TranscodePolicy) -> Self {
        Self {
            label: label.into(),
            target_bytes: policy.target_bytes,
            resize: None,
            allow_scale_down: true,
            min_scale: DEFAULT_MIN_SCALE,
            scale_step: policy.scale_step,
        }
    }

    pub fn with_resize(mut self, resize: ResizeSpec) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn with_min_scale(mut self, min_scale: f64) -> Self {
        self.min_scale = min_scale;
        self
    }

    pub fn without_scale_down(mut self) -> Self {
        self.allow_scale_down = false;
        self
    }

    pub fn validate(&self, qualities: &[u8]) -> Result<()> {
        if qualities.is_empty() {
            return Err(Error::InvalidOptions(format!(
                "[{}] quality ladder is empty",
                self.label
            )));
        }
        if let Some(bad) = qualities.iter().find(|q| **q == 0 || **q > 100) {
            return Err(Error::InvalidOptions(format!(
                "[{}] quality {} outside 1..=100",
                self.label, bad
            )));
        }
        if qualities.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(Error::InvalidOptions(format!(
                "[{}] quality ladder must be strictly descending",
                self.label
            )));
        }
        if self.target_bytes == 0 {
            return Err(Error::InvalidOptions(format!(
                "[{}] target bytes must be positive",
                self.label
            )));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= 1.0) {
            return Err(Error::InvalidOptions(format!(
                "[{}] min scale {} outside (0, 1]",
                self.label, self.min_scale
            )));
        }
        if !(self.scale_step > 0.0 && self.scale_step < 1.0) {
            return Err(Error::InvalidOptions(format!(
                "[{}] scale step {} outside (0, 1)",
                self.label, self.scale_step
            )));
        }
        Ok(())
    }
}
