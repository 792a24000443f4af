use super::codec::{apply_resize, decode_source};
use super::ImageEncoder;
use crate::models::{EncodeAttempt, ResizeSpec, VariantResult};
use crate::policy::{TranscodePolicy, VariantOptions};
use crate::{Error, Result};
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Write `bytes` to a temporary file next to `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".staging-")
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn persist_attempt(
    attempt: EncodeAttempt,
    output: &Path,
    within_budget: bool,
) -> Result<VariantResult> {
    write_atomic(output, &attempt.buffer)?;
    Ok(VariantResult {
        path: output.to_path_buf(),
        width: attempt.width,
        height: attempt.height,
        byte_len: attempt.byte_len(),
        quality: attempt.quality,
        scale: attempt.scale,
        within_budget,
    })
}

/// Encode `source` into `output`, searching for the first (scale, quality)
/// pair whose output fits `options.target_bytes`.
///
/// Scales are walked down from 1.0 by `options.scale_step` while they stay at
/// or above `options.min_scale`; at each scale every quality in `qualities` is
/// tried from first to last. When nothing fits, the last attempt (lowest
/// quality at the smallest scale) is written anyway and a warning is logged.
pub fn save_variant_under_target<E: ImageEncoder + ?Sized>(
    encoder: &E,
    source: &DynamicImage,
    output: &Path,
    options: &VariantOptions,
    qualities: &[u8],
) -> Result<VariantResult> {
    options.validate(qualities)?;

    let label = options.label.as_str();
    let mut current_scale = 1.0_f64;
    let mut last: Option<EncodeAttempt> = None;

    while current_scale >= options.min_scale {
        let resized = match &options.resize {
            Some(spec) => {
                let effective: Cow<'_, ResizeSpec> = if options.allow_scale_down {
                    Cow::Owned(spec.scaled(current_scale))
                } else {
                    Cow::Borrowed(spec)
                };
                Cow::Owned(apply_resize(source, &effective))
            }
            None => Cow::Borrowed(source),
        };
        let (width, height) = resized.dimensions();

        for &quality in qualities {
            let buffer = encoder.encode(&resized, quality)?;
            let attempt = EncodeAttempt {
                buffer,
                width,
                height,
                quality,
                scale: current_scale,
            };
            debug!(
                "[{}] scale {:.3} quality {} -> {}x{}, {} bytes",
                label,
                current_scale,
                quality,
                width,
                height,
                attempt.byte_len()
            );

            if attempt.byte_len() <= options.target_bytes {
                info!(
                    "[{}] Fits budget at quality {} scale {:.3} ({} bytes <= {})",
                    label,
                    quality,
                    current_scale,
                    attempt.byte_len(),
                    options.target_bytes
                );
                return persist_attempt(attempt, output, true);
            }

            last = Some(attempt);
        }

        if !options.allow_scale_down {
            break;
        }
        // Without a resize spec every lower scale level encodes the same pixels
        // and cannot fit either; report the smallest level the sweep would reach.
        if options.resize.is_none() {
            while current_scale * options.scale_step >= options.min_scale {
                current_scale *= options.scale_step;
            }
            if let Some(attempt) = last.as_mut() {
                attempt.scale = current_scale;
            }
            break;
        }
        current_scale *= options.scale_step;
    }

    match last {
        Some(attempt) => {
            warn!(
                "[{}] Could not reach {} bytes; keeping last attempt ({} bytes, quality {}, scale {:.3})",
                label,
                options.target_bytes,
                attempt.byte_len(),
                attempt.quality,
                attempt.scale
            );
            persist_attempt(attempt, output, false)
        }
        None => Err(Error::Invariant(format!(
            "No encode attempts were made for variant '{}'",
            label
        ))),
    }
}

/// Older single-variant path: cap the width, never upscale, and lower quality
/// only (85 down to 40) until the default budget is met.
pub fn downscale_legacy<E: ImageEncoder + ?Sized>(
    encoder: &E,
    source_path: &Path,
    output: &Path,
    max_width: u32,
) -> Result<VariantResult> {
    let source = decode_source(source_path)?;
    let policy = TranscodePolicy::legacy();
    let options = VariantOptions::new("legacy", &policy)
        .with_resize(ResizeSpec::max_width(max_width))
        .without_scale_down();

    save_variant_under_target(encoder, &source, output, &options, &policy.qualities)
}
