//! Image variant generation
//!
//! Decodes uploads, resizes them to the storefront's fixed profiles and
//! re-encodes each profile as lossy WebP under a byte budget.

pub mod codec;
pub mod locks;
pub mod mock;
pub mod processor;
pub mod search;
pub mod variants;

pub use codec::WebpEncoder;
pub use locks::PathLocks;
pub use mock::{MockEncoder, MockMediaProcessor};
pub use processor::MediaProcessor;
pub use search::{downscale_legacy, save_variant_under_target};
pub use variants::{delete_variant_set, generate_variant_set, sanitize_base_name};

use crate::models::{ImageVariantSet, VariantFiles, VariantResult};
use crate::Result;
use ::image::DynamicImage;
use async_trait::async_trait;
use std::path::Path;

/// Lossy codec used by the size search. Implementations are CPU-bound and
/// called from blocking contexts.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>>;

    /// File extension of the encoded output, without the dot.
    fn extension(&self) -> &'static str;
}

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn process_upload(
        &self,
        source: &Path,
        output_dir: &Path,
        base_name: &str,
    ) -> Result<ImageVariantSet>;

    async fn process_legacy(
        &self,
        source: &Path,
        output: &Path,
        max_width: u32,
    ) -> Result<VariantResult>;

    /// Best-effort removal; returns how many files were deleted.
    async fn delete_variants(&self, output_dir: &Path, files: Option<&VariantFiles>) -> usize;
}
