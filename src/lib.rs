//! Locate corner watermarks by edge analysis and remove them via masked
//! reconstruction.
//!
//! Small graphic overlays (logos, credit lines) usually sit in the
//! bottom-right corner of an image. This crate searches that corner with a
//! Canny edge detector, filters the connected shapes it finds into
//! watermark candidates, rasterizes them into a binary mask, and hands the
//! image/mask pair to a pluggable reconstruction backend that paints the
//! marked pixels back in.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use markless::{DetectionParams, NeighborhoodFill, WatermarkRemover};
//!
//! let engine = WatermarkRemover::new(Arc::new(NeighborhoodFill));
//! let img = image::open("photo.jpg").unwrap().to_rgb8();
//! let found = engine.locate(&img, &DetectionParams::default());
//! let cleaned = engine.restore(&img, &found.mask).unwrap();
//! cleaned.save("cleaned.jpg").unwrap();
//! ```
//!
//! # Batch processing
//!
//! Batches run sequentially on a background worker so an interactive
//! caller stays responsive; progress arrives through an event channel and
//! cancellation is cooperative (checked between jobs only).
//!
//! ```no_run
//! use std::sync::Arc;
//! use markless::{
//!     BatchEvent, BatchRunner, DetectionParams, ImageJob, NeighborhoodFill, WatermarkRemover,
//! };
//!
//! let engine = Arc::new(WatermarkRemover::new(Arc::new(NeighborhoodFill)));
//! let jobs = vec![ImageJob {
//!     input: "scans/a.png".into(),
//!     output: "cleaned/a.png".into(),
//!     params: DetectionParams::default(),
//! }];
//!
//! let handle = BatchRunner::new(engine).start(jobs);
//! for event in &handle.events {
//!     if let BatchEvent::Progress { completed, total } = event {
//!         eprintln!("{completed}/{total}");
//!     }
//! }
//! println!("{}", handle.wait().message);
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod detection;
mod engine;
pub mod error;
pub mod mask;
pub mod restore;

pub use batch::{BatchEvent, BatchHandle, BatchOutcome, BatchRunner, BatchState, ImageJob};
pub use detection::{Candidate, DetectionParams, Region, RegionRatio};
pub use engine::{
    default_output_path, is_supported_image, save_image, Localization, WatermarkRemover,
};
pub use error::{Error, Result};
pub use restore::{BoxError, NeighborhoodFill, Restorer};
