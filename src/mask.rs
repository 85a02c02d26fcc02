//! Binary mask synthesis from accepted candidates.
//!
//! Candidates are painted into a full-image mask as padded rectangles with
//! union semantics. When a detection pass accepts nothing, a small default
//! rectangle at the bottom-right corner keeps the mask non-empty so the
//! reconstruction step is never a no-op.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::info;

use crate::detection::Candidate;

/// Padding added on every side of an accepted candidate box.
const CANDIDATE_PAD: i64 = 2;
/// Fallback rectangle width limit, in pixels.
const FALLBACK_MAX_WIDTH: u32 = 200;
/// Fallback rectangle height limit, in pixels.
const FALLBACK_MAX_HEIGHT: u32 = 50;

/// Pixel value marking "replace" cells in a mask.
const MARK: Luma<u8> = Luma([255]);

/// Rasterize `candidates` into a mask of the full image size.
///
/// Each candidate box is padded by 2 px on every side, translated from
/// region-local to image-global coordinates via the region origin, clamped
/// to the image bounds, and filled with 255. Rectangles may overlap; fills
/// are cumulative and never erase earlier ones.
///
/// When no candidate was accepted, one default rectangle of size
/// `min(200, region width) x min(50, region height)` is painted at the
/// image's bottom-right corner instead, and the fallback is logged.
/// The returned mask therefore always contains at least one marked pixel.
#[must_use]
pub fn synthesize(
    width: u32,
    height: u32,
    origin: (u32, u32),
    candidates: &[Candidate],
    region_width: u32,
    region_height: u32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    if candidates.is_empty() {
        let box_w = FALLBACK_MAX_WIDTH.min(region_width);
        let box_h = FALLBACK_MAX_HEIGHT.min(region_height);
        info!(
            box_w,
            box_h, "no watermark candidates accepted; applying default bottom-right mask"
        );
        paint(&mut mask, i64::from(width - box_w), i64::from(height - box_h), i64::from(width), i64::from(height));
        return mask;
    }

    let (origin_x, origin_y) = (i64::from(origin.0), i64::from(origin.1));
    for candidate in candidates {
        let x1 = origin_x + i64::from(candidate.x) - CANDIDATE_PAD;
        let y1 = origin_y + i64::from(candidate.y) - CANDIDATE_PAD;
        let x2 = origin_x + i64::from(candidate.x) + i64::from(candidate.width) + CANDIDATE_PAD;
        let y2 = origin_y + i64::from(candidate.y) + i64::from(candidate.height) + CANDIDATE_PAD;
        paint(&mut mask, x1, y1, x2, y2);
    }

    mask
}

/// Fill `[x1, x2) x [y1, y2)` with 255, clamped to the mask bounds.
fn paint(mask: &mut GrayImage, x1: i64, y1: i64, x2: i64, y2: i64) {
    let x1 = x1.clamp(0, i64::from(mask.width()));
    let y1 = y1.clamp(0, i64::from(mask.height()));
    let x2 = x2.clamp(0, i64::from(mask.width()));
    let y2 = y2.clamp(0, i64::from(mask.height()));
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rect = Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1) as u32, (y2 - y1) as u32);
    draw_filled_rect_mut(mask, rect, MARK);
}
