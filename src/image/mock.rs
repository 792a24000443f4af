use super::{ImageEncoder, MediaService};
use crate::models::{ImageVariantSet, VariantFiles, VariantKind, VariantResult};
use crate::Result;
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAttempt {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub byte_len: u64,
}

/// Encoder whose output size is `width * height * quality / divisor` bytes,
/// so search behaviour can be asserted exactly.
#[derive(Clone)]
pub struct MockEncoder {
    divisor: u64,
    attempts: Arc<Mutex<Vec<RecordedAttempt>>>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MockEncoder {
    pub fn new(divisor: u64) -> Self {
        Self {
            divisor: divisor.max(1),
            attempts: Arc::new(Mutex::new(Vec::new())),
            fail_after: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing(self) -> Self {
        self.failing_after(0)
    }

    /// Succeed for the first `calls` encodes, then fail every one after.
    pub fn failing_after(self, calls: usize) -> Self {
        *self.fail_after.lock().unwrap() = Some(calls);
        self
    }

    pub fn attempts(&self) -> Vec<RecordedAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

impl ImageEncoder for MockEncoder {
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if attempts.len() >= limit {
                return Err(crate::Error::Encode("Mock failure".to_string()));
            }
        }

        let (width, height) = image.dimensions();
        let byte_len = (width as u64 * height as u64 * quality as u64 / self.divisor).max(1);
        attempts.push(RecordedAttempt {
            width,
            height,
            quality,
            byte_len,
        });

        Ok(vec![0u8; byte_len as usize])
    }

    fn extension(&self) -> &'static str {
        "webp"
    }
}

/// In-memory `MediaService` for callers that only need plausible results.
pub struct MockMediaProcessor {
    process_count: Arc<Mutex<usize>>,
    deleted: Arc<Mutex<Vec<PathBuf>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockMediaProcessor {
    pub fn new() -> Self {
        Self {
            process_count: Arc::new(Mutex::new(0)),
            deleted: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_process_count(&self) -> usize {
        *self.process_count.lock().unwrap()
    }

    pub fn get_deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }
        Ok(())
    }
}

impl Default for MockMediaProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaService for MockMediaProcessor {
    async fn process_upload(
        &self,
        _source: &Path,
        output_dir: &Path,
        base_name: &str,
    ) -> Result<ImageVariantSet> {
        self.check_failure()?;
        *self.process_count.lock().unwrap() += 1;

        let mut sizes = VariantFiles::default();
        let mut variants = Vec::new();
        for kind in VariantKind::ALL {
            let file_name = kind.file_name(base_name, "webp");
            let (width, height) = match kind {
                VariantKind::Thumb => (150, 150),
                VariantKind::Medium => (800, 600),
                VariantKind::Large => (1600, 1200),
                VariantKind::Original => (2048, 1536),
            };
            variants.push(VariantResult {
                path: output_dir.join(&file_name),
                width,
                height,
                byte_len: 1024,
                quality: 85,
                scale: 1.0,
                within_budget: true,
            });
            sizes.set(kind, file_name);
        }

        Ok(ImageVariantSet {
            sizes,
            width: 2048,
            height: 1536,
            variants,
        })
    }

    async fn process_legacy(
        &self,
        _source: &Path,
        output: &Path,
        max_width: u32,
    ) -> Result<VariantResult> {
        self.check_failure()?;
        *self.process_count.lock().unwrap() += 1;

        Ok(VariantResult {
            path: output.to_path_buf(),
            width: max_width,
            height: max_width / 2,
            byte_len: 1024,
            quality: 85,
            scale: 1.0,
            within_budget: true,
        })
    }

    async fn delete_variants(&self, output_dir: &Path, files: Option<&VariantFiles>) -> usize {
        let Some(files) = files else {
            return 0;
        };

        let mut deleted = self.deleted.lock().unwrap();
        let before = deleted.len();
        for kind in VariantKind::ALL {
            if let Some(name) = files.get(kind) {
                deleted.push(output_dir.join(name));
            }
        }
        deleted.len() - before
    }
}
