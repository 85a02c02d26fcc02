//! Edge-based watermark localization.
//!
//! Watermarks are searched for in a bottom-right anchored region of the
//! image. The region is converted to a Canny edge map, edges are dilated
//! horizontally so adjacent glyph strokes merge, and the resulting connected
//! shapes are filtered into candidate bounding boxes by size and aspect
//! heuristics.

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use tracing::debug;

/// High Canny threshold is this multiple of the user-supplied low threshold.
const EDGE_HIGH_RATIO: f32 = 2.5;
/// More edge pixels than this are required before the region is considered
/// to contain any signal at all.
const MIN_EDGE_PIXELS: usize = 10;
/// Candidate boxes narrower or shorter than this are single-pixel noise.
const MIN_BOX_SIDE: u32 = 5;
/// Candidates wider than this fraction of the search region are real image
/// content, not an overlay.
const MAX_REGION_WIDTH_FRACTION: f32 = 0.9;
/// Candidates taller than `width * MAX_HEIGHT_FACTOR` are narrow slivers.
const MAX_HEIGHT_FACTOR: u32 = 2;
/// Substituted when the caller passes a non-positive width ratio.
const DEFAULT_WIDTH_RATIO: f32 = 0.3;
/// Substituted when the caller passes a non-positive height ratio.
const DEFAULT_HEIGHT_RATIO: f32 = 0.15;
/// Minimum side length of the search region, in pixels.
const MIN_REGION_SIDE: u32 = 10;

/// Fraction of the image searched for a watermark, anchored bottom-right.
///
/// Each component is a ratio in `[0, 1]` of the corresponding image
/// dimension. Non-positive components fall back to the defaults
/// (0.30 wide, 0.15 tall).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRatio {
    /// Width of the search region as a fraction of image width.
    pub width: f32,
    /// Height of the search region as a fraction of image height.
    pub height: f32,
}

impl Default for RegionRatio {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH_RATIO,
            height: DEFAULT_HEIGHT_RATIO,
        }
    }
}

/// Tuning parameters for one localization pass.
///
/// Immutable per invocation; the pipeline keeps no state between calls, so
/// identical images and parameters always produce identical masks.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    /// Low Canny threshold (sensitivity, typical range 1-500). The high
    /// threshold is fixed at 2.5x this value.
    pub edge_threshold: f32,
    /// Width in pixels of the horizontal dilation kernel (0-20, fractional
    /// allowed). Values below 1.0 disable dilation entirely.
    pub mask_expansion: f32,
    /// Search region size, anchored at the bottom-right corner.
    pub region: RegionRatio,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            edge_threshold: 100.0,
            mask_expansion: 3.0,
            region: RegionRatio::default(),
        }
    }
}

/// The extracted search region and its position in the source image.
#[derive(Debug, Clone)]
pub struct Region {
    /// Pixel data of the region.
    pub image: RgbImage,
    /// X coordinate of the region's top-left corner in the source image.
    pub x: u32,
    /// Y coordinate of the region's top-left corner in the source image.
    pub y: u32,
}

/// A plausible watermark fragment, in region-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Left edge of the bounding box.
    pub x: u32,
    /// Top edge of the bounding box.
    pub y: u32,
    /// Bounding box width.
    pub width: u32,
    /// Bounding box height.
    pub height: u32,
}

/// Cut the bottom-right search region out of `image`.
///
/// Margins are `image dimension * ratio` truncated, then clamped so each
/// side is at least 10 px (or the full dimension if the image is smaller)
/// and never exceeds the image. Ratios are always clamped, never rejected.
#[must_use]
pub fn select_region(image: &RgbImage, ratio: RegionRatio) -> Region {
    let (w, h) = image.dimensions();

    let width_ratio = if ratio.width > 0.0 {
        ratio.width
    } else {
        DEFAULT_WIDTH_RATIO
    };
    let height_ratio = if ratio.height > 0.0 {
        ratio.height
    } else {
        DEFAULT_HEIGHT_RATIO
    };

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let w_margin = ((w as f32 * width_ratio) as u32)
        .max(MIN_REGION_SIDE)
        .min(w);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let h_margin = ((h as f32 * height_ratio) as u32)
        .max(MIN_REGION_SIDE)
        .min(h);

    let x = w - w_margin;
    let y = h - h_margin;
    let region = imageops::crop_imm(image, x, y, w_margin, h_margin).to_image();

    Region { image: region, x, y }
}

/// Build a binary edge map of the region.
///
/// The region is reduced to single-channel intensity and run through a
/// Canny detector with the low threshold set to `threshold` and the high
/// threshold fixed at 2.5x it. No smoothing is applied beyond the
/// detector's own internal blur.
#[must_use]
pub fn edge_map(region: &RgbImage, threshold: f32) -> GrayImage {
    let gray = imageops::grayscale(region);
    canny(&gray, threshold, threshold * EDGE_HIGH_RATIO)
}

/// Extract watermark candidates from an edge map.
///
/// Regions with 10 or fewer edge pixels are treated as edge-free and
/// produce no candidates (the caller falls back to a default mask). If
/// `mask_expansion >= 1.0` the map is first dilated with a 1-row by
/// `round(mask_expansion)`-column element so horizontally adjacent strokes
/// merge into one shape; vertical extent is never expanded.
///
/// External contours of the (possibly dilated) map become candidates when
/// their bounding box is at least 5x5 px, no wider than 90% of the region,
/// and no taller than twice its width. Candidates are returned in contour
/// discovery order.
#[must_use]
pub fn extract_candidates(edges: &GrayImage, mask_expansion: f32) -> Vec<Candidate> {
    let edge_pixels = edges.pixels().filter(|p| p[0] != 0).count();
    if edge_pixels <= MIN_EDGE_PIXELS {
        debug!(edge_pixels, "search region is edge-free");
        return Vec::new();
    }

    let dilated;
    let shapes: &GrayImage = if mask_expansion >= 1.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let kernel_width = (mask_expansion.round() as u32).max(1);
        dilated = dilate_horizontal(edges, kernel_width);
        &dilated
    } else {
        edges
    };

    let region_width = edges.width();
    #[allow(clippy::cast_precision_loss)]
    let max_width = region_width as f32 * MAX_REGION_WIDTH_FRACTION;

    let mut candidates = Vec::new();
    for contour in find_contours::<i32>(shapes) {
        // Outer contours only; holes inside a shape carry a parent index.
        if contour.parent.is_some() {
            continue;
        }

        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for point in &contour.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        #[allow(clippy::cast_sign_loss)]
        let (bw, bh) = ((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32);
        if bw < MIN_BOX_SIDE || bh < MIN_BOX_SIDE {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let box_width = bw as f32;
        if box_width > max_width {
            continue;
        }
        if bh > bw * MAX_HEIGHT_FACTOR {
            continue;
        }

        #[allow(clippy::cast_sign_loss)]
        candidates.push(Candidate {
            x: min_x as u32,
            y: min_y as u32,
            width: bw,
            height: bh,
        });
    }

    debug!(
        edge_pixels,
        accepted = candidates.len(),
        "candidate extraction complete"
    );
    candidates
}

/// Dilate marked pixels with a 1-row by `kernel_width`-column element.
///
/// The anchor sits at `kernel_width / 2`, so a pixel is set when any marked
/// pixel lies within `kernel_width / 2` columns to its left or
/// `kernel_width - 1 - kernel_width / 2` to its right, on the same row.
fn dilate_horizontal(edges: &GrayImage, kernel_width: u32) -> GrayImage {
    let (w, h) = edges.dimensions();
    let reach_left = i64::from(kernel_width / 2);
    let reach_right = i64::from(kernel_width - 1 - kernel_width / 2);

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let lo = (i64::from(x) - reach_left).max(0);
            let hi = (i64::from(x) + reach_right).min(i64::from(w) - 1);
            let mut value = 0u8;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            for col in lo..=hi {
                value = value.max(edges.get_pixel(col as u32, y)[0]);
            }
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}
