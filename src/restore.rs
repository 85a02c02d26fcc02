//! The reconstruction seam.
//!
//! Reconstruction is performed by an external collaborator behind the
//! [`Restorer`] trait: image and mask in, rebuilt image (or a typed
//! failure) out. The engine depends only on this contract, so a heavyweight
//! inpainting model, a remote service, or a test stub can all be swapped in
//! without touching the pipeline.

use image::{GrayImage, Rgb, RgbImage};

/// Boxed error type returned by reconstruction backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A content reconstruction backend.
///
/// Implementations replace the pixels marked 255 in `mask` with plausible
/// content and return a new image of identical dimensions; the input image
/// is never mutated. Backends must reject invalid input (such as a mask
/// whose dimensions differ from the image) with an error rather than
/// panicking.
///
/// One long-lived instance is shared across jobs, so implementations must
/// be `Send + Sync` and stateless per call.
pub trait Restorer: Send + Sync {
    /// Rebuild the masked pixels of `image`.
    ///
    /// # Errors
    ///
    /// Returns the backend's own error for invalid inputs or internal
    /// failures. The caller wraps it into
    /// [`Error::Restoration`](crate::Error::Restoration).
    fn restore(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, BoxError>;
}

/// Window radius used by [`NeighborhoodFill`] when averaging around a
/// masked pixel.
const FILL_RADIUS: i64 = 6;

/// Naive baseline backend: fills each masked pixel with the mean color of
/// the unmasked pixels in a small window around it.
///
/// This is a placeholder so the CLI works out of the box, not an inpainting
/// model; the result is a flat smear rather than reconstructed texture.
/// Production callers should plug in a real backend via [`Restorer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NeighborhoodFill;

impl Restorer for NeighborhoodFill {
    fn restore(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, BoxError> {
        if image.dimensions() != mask.dimensions() {
            return Err(format!(
                "mask dimensions {:?} do not match image dimensions {:?}",
                mask.dimensions(),
                image.dimensions()
            )
            .into());
        }

        let (w, h) = image.dimensions();
        let global = unmasked_mean(image, mask).unwrap_or(Rgb([0, 0, 0]));

        let mut out = image.clone();
        for y in 0..h {
            for x in 0..w {
                if mask.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                out.put_pixel(x, y, window_mean(image, mask, x, y).unwrap_or(global));
            }
        }
        Ok(out)
    }
}

/// Mean color of the unmasked pixels within the fill window around (x, y).
fn window_mean(image: &RgbImage, mask: &GrayImage, x: u32, y: u32) -> Option<Rgb<u8>> {
    let (w, h) = image.dimensions();
    let x_lo = (i64::from(x) - FILL_RADIUS).max(0);
    let x_hi = (i64::from(x) + FILL_RADIUS).min(i64::from(w) - 1);
    let y_lo = (i64::from(y) - FILL_RADIUS).max(0);
    let y_hi = (i64::from(y) + FILL_RADIUS).min(i64::from(h) - 1);

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    for yy in y_lo..=y_hi {
        for xx in x_lo..=x_hi {
            if mask.get_pixel(xx as u32, yy as u32)[0] != 0 {
                continue;
            }
            let px = image.get_pixel(xx as u32, yy as u32);
            sum[0] += u64::from(px[0]);
            sum[1] += u64::from(px[1]);
            sum[2] += u64::from(px[2]);
            count += 1;
        }
    }

    mean_color(sum, count)
}

/// Mean color of every unmasked pixel in the image.
fn unmasked_mean(image: &RgbImage, mask: &GrayImage) -> Option<Rgb<u8>> {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for (px, m) in image.pixels().zip(mask.pixels()) {
        if m[0] != 0 {
            continue;
        }
        sum[0] += u64::from(px[0]);
        sum[1] += u64::from(px[1]);
        sum[2] += u64::from(px[2]);
        count += 1;
    }
    mean_color(sum, count)
}

#[allow(clippy::cast_possible_truncation)]
fn mean_color(sum: [u64; 3], count: u64) -> Option<Rgb<u8>> {
    if count == 0 {
        return None;
    }
    Some(Rgb([
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]))
}
