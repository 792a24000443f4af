use super::codec::{decode_source, read_source_metadata};
use super::search::save_variant_under_target;
use super::ImageEncoder;
use crate::models::{ImageVariantSet, ResizeSpec, SourceMetadata, VariantFiles, VariantKind};
use crate::policy::{TranscodePolicy, VariantOptions, DEFAULT_MIN_SCALE};
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const THUMB_SIZE: u32 = 150;
pub const MEDIUM_SIZE: u32 = 800;
pub const LARGE_SIZE: u32 = 1600;
pub const ORIGINAL_MAX_SIZE: u32 = 2048;
pub const ORIGINAL_MIN_SCALE: f64 = 0.3;

/// Search options for one of the four fixed profiles.
pub fn profile_options(
    kind: VariantKind,
    source: &SourceMetadata,
    policy: &TranscodePolicy,
) -> VariantOptions {
    let options = VariantOptions::new(kind.to_string(), policy);
    match kind {
        VariantKind::Thumb => options
            .with_resize(ResizeSpec::cover(THUMB_SIZE, THUMB_SIZE))
            .without_scale_down(),
        VariantKind::Medium => options
            .with_resize(ResizeSpec::inside(MEDIUM_SIZE, MEDIUM_SIZE))
            .with_min_scale(DEFAULT_MIN_SCALE),
        VariantKind::Large => options
            .with_resize(ResizeSpec::inside(LARGE_SIZE, LARGE_SIZE))
            .with_min_scale(DEFAULT_MIN_SCALE),
        VariantKind::Original => options
            .with_resize(ResizeSpec::inside(
                source.width.min(ORIGINAL_MAX_SIZE),
                source.height.min(ORIGINAL_MAX_SIZE),
            ))
            .with_min_scale(ORIGINAL_MIN_SCALE),
    }
}

/// Turn an upload's original filename into a base name safe to embed in
/// variant filenames.
pub fn sanitize_base_name(upload_name: &str) -> String {
    let last_component = upload_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(upload_name);
    let stem = Path::new(last_component)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => info!("Rolled back {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to roll back {}: {}", path.display(), e),
        }
    }
}

/// Produce thumb, medium, large and original variants of `source_path` in
/// `output_dir`, in that order.
///
/// If any variant fails, the variants already written by this call are
/// removed before the error is returned.
pub fn generate_variant_set<E: ImageEncoder + ?Sized>(
    encoder: &E,
    source_path: &Path,
    output_dir: &Path,
    base_name: &str,
    policy: &TranscodePolicy,
) -> Result<ImageVariantSet> {
    if !is_plain_file_name(base_name) {
        return Err(Error::InvalidOptions(format!(
            "Base name '{}' is not a plain file name",
            base_name
        )));
    }

    info!("Reading source image {}", source_path.display());
    let metadata = read_source_metadata(source_path)?;
    let source = decode_source(source_path)?;
    info!(
        "Decoded {} ({}x{}, {})",
        source_path.display(),
        metadata.width,
        metadata.height,
        metadata.format.as_deref().unwrap_or("unknown")
    );

    let created_dir = !output_dir.exists();
    fs::create_dir_all(output_dir)?;

    let mut written: Vec<PathBuf> = Vec::new();
    let mut sizes = VariantFiles::default();
    let mut variants = Vec::with_capacity(VariantKind::ALL.len());
    let mut canonical = None;

    for kind in VariantKind::ALL {
        let file_name = kind.file_name(base_name, encoder.extension());
        let output = output_dir.join(&file_name);
        let options = profile_options(kind, &metadata, policy);

        info!("[{}] Generating {}", kind, file_name);
        match save_variant_under_target(encoder, &source, &output, &options, &policy.qualities) {
            Ok(result) => {
                info!(
                    "[{}] Saved {} ({}x{}, {} bytes, quality {})",
                    kind, file_name, result.width, result.height, result.byte_len, result.quality
                );
                if kind == VariantKind::Original {
                    canonical = Some((result.width, result.height));
                }
                written.push(output);
                sizes.set(kind, file_name);
                variants.push(result);
            }
            Err(e) => {
                error!("[{}] Variant generation failed: {}", kind, e);
                remove_written(&written);
                // Fails unless the directory is empty.
                if created_dir && fs::remove_dir(output_dir).is_ok() {
                    info!("Removed empty directory {}", output_dir.display());
                }
                return Err(e.in_variant(kind));
            }
        }
    }

    let (width, height) = canonical.ok_or_else(|| {
        Error::Invariant(format!("Original variant missing for {}", base_name))
    })?;

    Ok(ImageVariantSet {
        sizes,
        width,
        height,
        variants,
    })
}

/// Delete the named variant files from `output_dir`, then remove the directory
/// if nothing else is left in it. Never fails; returns how many files were removed.
pub fn delete_variant_set(output_dir: &Path, files: Option<&VariantFiles>) -> usize {
    if output_dir.as_os_str().is_empty() {
        warn!("Variant deletion skipped: empty output directory");
        return 0;
    }
    let Some(files) = files else {
        warn!(
            "Variant deletion skipped for {}: no variant files given",
            output_dir.display()
        );
        return 0;
    };

    let mut removed = 0;
    for kind in VariantKind::ALL {
        let Some(name) = files.get(kind) else {
            continue;
        };
        if !is_plain_file_name(name) {
            warn!("[{}] Refusing to delete suspicious file name '{}'", kind, name);
            continue;
        }

        let path = output_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("[{}] Deleted {}", kind, path.display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("[{}] Already gone: {}", kind, path.display());
            }
            Err(e) => warn!("[{}] Failed to delete {}: {}", kind, path.display(), e),
        }
    }

    // Fails unless the directory is empty.
    if fs::remove_dir(output_dir).is_ok() {
        info!("Removed empty directory {}", output_dir.display());
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MockEncoder;
    use image::{DynamicImage, Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_source(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("source.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_sanitize_base_name() {
        assert_eq!(sanitize_base_name("shoe1.jpg"), "shoe1");
        assert_eq!(sanitize_base_name("Red Shoe (2).PNG"), "Red-Shoe--2");
        assert_eq!(sanitize_base_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_base_name("C:\\photos\\sale.webp"), "sale");
        assert_eq!(sanitize_base_name("???.jpg"), "image");
        assert_eq!(sanitize_base_name(""), "image");
    }

    #[test]
    fn test_original_profile_caps_at_source_and_2048() {
        let policy = TranscodePolicy::default();
        let big = SourceMetadata {
            width: 4000,
            height: 3000,
            format: None,
        };
        let small = SourceMetadata {
            width: 1000,
            height: 500,
            format: None,
        };

        let options = profile_options(VariantKind::Original, &big, &policy);
        assert_eq!(options.resize, Some(ResizeSpec::inside(2048, 2048)));
        assert_eq!(options.min_scale, 0.3);

        let options = profile_options(VariantKind::Original, &small, &policy);
        assert_eq!(options.resize, Some(ResizeSpec::inside(1000, 500)));

        let thumb = profile_options(VariantKind::Thumb, &big, &policy);
        assert!(!thumb.allow_scale_down);
        assert_eq!(thumb.label, "thumbnail");
    }

    #[test]
    fn test_generate_variant_set_writes_four_files() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), 3000, 2000);
        let output_dir = dir.path().join("products").join("42");
        let encoder = MockEncoder::new(1000);

        let set = generate_variant_set(
            &encoder,
            &source,
            &output_dir,
            "shoe1",
            &TranscodePolicy::default(),
        )
        .unwrap();

        assert_eq!(set.sizes.thumb.as_deref(), Some("shoe1_thumb.webp"));
        assert_eq!(set.sizes.medium.as_deref(), Some("shoe1_medium.webp"));
        assert_eq!(set.sizes.large.as_deref(), Some("shoe1_large.webp"));
        assert_eq!(set.sizes.original.as_deref(), Some("original_shoe1.webp"));
        for kind in VariantKind::ALL {
            assert!(output_dir.join(set.sizes.get(kind).unwrap()).exists());
        }

        let dims: Vec<(u32, u32)> = set.variants.iter().map(|v| (v.width, v.height)).collect();
        assert_eq!(
            dims,
            vec![(150, 150), (800, 533), (1600, 1067), (2048, 1365)]
        );
        assert_eq!((set.width, set.height), (2048, 1365));
    }

    #[test]
    fn test_canonical_dimensions_follow_encoded_original() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), 3000, 2000);
        let output_dir = dir.path().join("out");
        let encoder = MockEncoder::new(1000);
        // Forces the original profile to scale down.
        let policy = TranscodePolicy::default().with_target_bytes(40_000);

        let set = generate_variant_set(&encoder, &source, &output_dir, "a", &policy).unwrap();

        let original = set.variants.last().unwrap();
        assert!(original.scale < 1.0);
        assert_eq!((set.width, set.height), (original.width, original.height));
        assert!(set.width < 2048);
    }

    #[test]
    fn test_decode_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        fs::write(&source, b"nope").unwrap();
        let output_dir = dir.path().join("out");

        let err = generate_variant_set(
            &MockEncoder::new(1000),
            &source,
            &output_dir,
            "broken",
            &TranscodePolicy::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_failure_rolls_back_earlier_variants() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), 1000, 1000);
        let output_dir = dir.path().join("out");
        // Thumb and medium fit on their first encode; large fails.
        let encoder = MockEncoder::new(1000).failing_after(2);

        let err = generate_variant_set(
            &encoder,
            &source,
            &output_dir,
            "shoe1",
            &TranscodePolicy::default(),
        )
        .unwrap_err();

        match err {
            Error::Variant { variant, .. } => assert_eq!(variant, VariantKind::Large),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!output_dir.join("shoe1_thumb.webp").exists());
        assert!(!output_dir.join("shoe1_medium.webp").exists());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_failure_keeps_preexisting_directory() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), 1000, 1000);
        let output_dir = dir.path().join("existing");
        fs::create_dir_all(&output_dir).unwrap();
        let encoder = MockEncoder::new(1000).failing();

        let err = generate_variant_set(
            &encoder,
            &source,
            &output_dir,
            "shoe1",
            &TranscodePolicy::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Variant { variant: VariantKind::Thumb, .. }));
        assert!(output_dir.exists());
    }

    #[test]
    fn test_rejects_base_name_with_separators() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), 10, 10);

        let result = generate_variant_set(
            &MockEncoder::new(1000),
            &source,
            dir.path(),
            "../escape",
            &TranscodePolicy::default(),
        );
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn test_delete_variant_set_prunes_directory() {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("post-7");
        fs::create_dir_all(&output_dir).unwrap();
        let mut files = VariantFiles::default();
        for kind in VariantKind::ALL {
            let name = kind.file_name("p", "webp");
            fs::write(output_dir.join(&name), b"x").unwrap();
            files.set(kind, name);
        }

        assert_eq!(delete_variant_set(&output_dir, Some(&files)), 4);
        assert!(!output_dir.exists());

        // Second call: files and directory already gone.
        assert_eq!(delete_variant_set(&output_dir, Some(&files)), 0);
    }

    #[test]
    fn test_delete_skips_null_entries() {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("product-1");
        fs::create_dir_all(&output_dir).unwrap();
        fs::write(output_dir.join("a_thumb.webp"), b"x").unwrap();
        fs::write(output_dir.join("a_medium.webp"), b"x").unwrap();
        fs::write(output_dir.join("a_large.webp"), b"x").unwrap();
        let files = VariantFiles {
            thumb: Some("a_thumb.webp".to_string()),
            medium: Some("a_medium.webp".to_string()),
            large: None,
            original: None,
        };

        assert_eq!(delete_variant_set(&output_dir, Some(&files)), 2);
        assert!(output_dir.join("a_large.webp").exists());
        assert!(output_dir.exists());
    }

    #[test]
    fn test_delete_tolerates_bad_input() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("keep.webp");
        fs::write(&outside, b"x").unwrap();
        let output_dir = dir.path().join("assets");
        fs::create_dir_all(&output_dir).unwrap();

        let files = VariantFiles {
            thumb: Some("../keep.webp".to_string()),
            ..Default::default()
        };

        assert_eq!(delete_variant_set(&output_dir, Some(&files)), 0);
        assert!(outside.exists());
        assert_eq!(delete_variant_set(&output_dir, None), 0);
        assert_eq!(delete_variant_set(Path::new(""), Some(&files)), 0);
    }
}
