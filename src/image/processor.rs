use super::codec::WebpEncoder;
use super::locks::PathLocks;
use super::search::downscale_legacy;
use super::variants::{delete_variant_set, generate_variant_set};
use super::{ImageEncoder, MediaService};
use crate::models::{ImageVariantSet, VariantFiles, VariantResult};
use crate::policy::TranscodePolicy;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct MediaProcessor {
    encoder: Arc<dyn ImageEncoder>,
    policy: TranscodePolicy,
    locks: PathLocks,
}

impl MediaProcessor {
    pub fn new(policy: TranscodePolicy) -> Self {
        Self::with_encoder(Arc::new(WebpEncoder::new()), policy)
    }

    pub fn with_encoder(encoder: Arc<dyn ImageEncoder>, policy: TranscodePolicy) -> Self {
        Self {
            encoder,
            policy,
            locks: PathLocks::new(),
        }
    }

    pub fn policy(&self) -> &TranscodePolicy {
        &self.policy
    }

    async fn run_blocking<T, F>(task: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
    }
}

#[async_trait]
impl MediaService for MediaProcessor {
    async fn process_upload(
        &self,
        source: &Path,
        output_dir: &Path,
        base_name: &str,
    ) -> Result<ImageVariantSet> {
        // The blocking task owns the guard, so a dropped caller cannot release
        // the lock while files are still being written.
        let guard = self.locks.lock(&output_dir.join(base_name)).await;

        Self::run_blocking({
            let encoder = self.encoder.clone();
            let policy = self.policy.clone();
            let source = source.to_path_buf();
            let output_dir = output_dir.to_path_buf();
            let base_name = base_name.to_string();
            move || {
                let _guard = guard;
                generate_variant_set(&*encoder, &source, &output_dir, &base_name, &policy)
            }
        })
        .await
    }

    async fn process_legacy(
        &self,
        source: &Path,
        output: &Path,
        max_width: u32,
    ) -> Result<VariantResult> {
        let guard = self.locks.lock(output).await;

        Self::run_blocking({
            let encoder = self.encoder.clone();
            let source = source.to_path_buf();
            let output = output.to_path_buf();
            move || {
                let _guard = guard;
                downscale_legacy(&*encoder, &source, &output, max_width)
            }
        })
        .await
    }

    async fn delete_variants(&self, output_dir: &Path, files: Option<&VariantFiles>) -> usize {
        let output_dir = output_dir.to_path_buf();
        let files = files.cloned();

        match tokio::task::spawn_blocking(move || delete_variant_set(&output_dir, files.as_ref()))
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Variant deletion task failed: {}", e);
                0
            }
        }
    }
}
