//! Core removal engine: localize, reconstruct, write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use tracing::debug;

use crate::detection::{self, DetectionParams};
use crate::error::{Error, Result};
use crate::mask;
use crate::restore::Restorer;

/// Result of one localization pass.
#[derive(Debug, Clone)]
pub struct Localization {
    /// Binary mask with the same dimensions as the source image; 255 marks
    /// pixels to reconstruct. Never entirely zero.
    pub mask: GrayImage,
    /// Number of candidate boxes accepted by the size/aspect filters.
    pub candidate_count: usize,
    /// Whether the default bottom-right rectangle was painted because no
    /// candidate qualified.
    pub used_fallback: bool,
}

/// The removal engine tying localization to a reconstruction backend.
///
/// Create once with [`WatermarkRemover::new`] and reuse across images; the
/// engine holds no per-image state, so one instance can serve an entire
/// batch.
pub struct WatermarkRemover {
    restorer: Arc<dyn Restorer>,
}

impl WatermarkRemover {
    /// Create an engine around the given reconstruction backend.
    #[must_use]
    pub fn new(restorer: Arc<dyn Restorer>) -> Self {
        Self { restorer }
    }

    /// Locate the watermark in `image` and synthesize its removal mask.
    ///
    /// Runs region selection, edge detection, candidate extraction, and
    /// mask synthesis as one pass. Only the bottom-right anchored region is
    /// searched. Deterministic: identical inputs always produce the same
    /// mask.
    #[must_use]
    #[allow(clippy::unused_self)] // method on `self` for API consistency
    pub fn locate(&self, image: &RgbImage, params: &DetectionParams) -> Localization {
        let region = detection::select_region(image, params.region);
        let edges = detection::edge_map(&region.image, params.edge_threshold);
        let candidates = detection::extract_candidates(&edges, params.mask_expansion);
        debug!(
            region_w = region.image.width(),
            region_h = region.image.height(),
            candidates = candidates.len(),
            "localization pass complete"
        );

        let (w, h) = image.dimensions();
        let used_fallback = candidates.is_empty();
        let mask = mask::synthesize(
            w,
            h,
            (region.x, region.y),
            &candidates,
            region.image.width(),
            region.image.height(),
        );

        Localization {
            mask,
            candidate_count: candidates.len(),
            used_fallback,
        }
    }

    /// Reconstruct the masked pixels of `image` via the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Restoration`] carrying the backend's message if the
    /// backend fails; backend failures never propagate as panics.
    pub fn restore(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        self.restorer
            .restore(image, mask)
            .map_err(|e| Error::Restoration(e.to_string()))
    }

    /// Process a single image file: load, locate, reconstruct, save.
    ///
    /// The first failing step short-circuits the rest; nothing is written
    /// unless every prior step succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if `input` is missing or undecodable,
    /// [`Error::Restoration`] if the backend fails, and [`Error::Write`]
    /// or [`Error::UnsupportedFormat`] if `output` cannot be written.
    pub fn process_file(
        &self,
        input: &Path,
        output: &Path,
        params: &DetectionParams,
    ) -> Result<PathBuf> {
        let image = image::open(input)
            .map_err(|source| Error::Load {
                path: input.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let localization = self.locate(&image, params);
        let restored = self.restore(&image, &localization.mask)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Write {
                    path: output.to_path_buf(),
                    source: image::ImageError::IoError(e),
                })?;
            }
        }
        save_image(&restored, output)?;

        Ok(output.to_path_buf())
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGB image with format-specific quality settings.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if the extension names a format
/// this crate does not write, or [`Error::Write`] if encoding fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = DynamicImage::ImageRgb8(img.clone());

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path).map_err(|e| Error::Write {
                path: path.to_path_buf(),
                source: image::ImageError::IoError(e),
            })?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&dyn_img).map_err(|source| Error::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            dyn_img.save(path).map_err(|source| Error::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_cleaned.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}
