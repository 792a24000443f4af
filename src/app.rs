//! Application wiring for the media CLI.

use crate::image::{sanitize_base_name, MediaProcessor, MediaService, WebpEncoder};
use crate::models::{Config, ImageVariantSet, VariantFiles, VariantResult};
use crate::policy::TranscodePolicy;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runs uploads and deletions against one output root.
pub struct App {
    media: Box<dyn MediaService>,
    output_dir: PathBuf,
}

impl App {
    /// Build an app from a concrete media service; used by tests to inject mocks.
    pub fn with_services(media: Box<dyn MediaService>, output_dir: PathBuf) -> Self {
        Self { media, output_dir }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new(output_override: Option<PathBuf>) -> Result<Self> {
        let config = Config::from_env()?;
        let output_dir = output_override.unwrap_or(config.output_dir);

        let policy = TranscodePolicy::default().with_target_bytes(config.target_bytes);
        info!(
            "Media output: {} (target {} bytes, WebP method {})",
            output_dir.display(),
            policy.target_bytes,
            config.encoder_method
        );

        let media = MediaProcessor::with_encoder(
            Arc::new(WebpEncoder::with_method(config.encoder_method)),
            policy,
        );

        Ok(Self::with_services(Box::new(media), output_dir))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate the variant set for `source`. The base name defaults to the
    /// sanitized source file name.
    pub async fn process(&self, source: &Path, base_name: Option<&str>) -> Result<ImageVariantSet> {
        let base_name = match base_name {
            Some(name) => sanitize_base_name(name),
            None => {
                let file_name = source
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        Error::InvalidOptions(format!(
                            "Invalid source path: {}",
                            source.display()
                        ))
                    })?;
                sanitize_base_name(file_name)
            }
        };

        info!("Processing {} as '{}'", source.display(), base_name);
        let set = self
            .media
            .process_upload(source, &self.output_dir, &base_name)
            .await?;
        info!(
            "Generated variants for '{}' ({}x{})",
            base_name, set.width, set.height
        );
        Ok(set)
    }

    pub async fn legacy(
        &self,
        source: &Path,
        output: &Path,
        max_width: u32,
    ) -> Result<VariantResult> {
        self.media.process_legacy(source, output, max_width).await
    }

    pub async fn delete(&self, files: &VariantFiles) -> usize {
        let removed = self.media.delete_variants(&self.output_dir, Some(files)).await;
        info!(
            "Deleted {} variant file(s) from {}",
            removed,
            self.output_dir.display()
        );
        removed
    }
}
