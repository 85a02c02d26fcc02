//! Error types for the markless crate.

use std::path::PathBuf;

/// Errors that can occur during watermark localization and removal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input image is missing or could not be decoded.
    #[error("failed to load image {path}: {source}")]
    Load {
        /// Path of the image that failed to load.
        path: PathBuf,
        /// Underlying decode error.
        source: image::ImageError,
    },

    /// The reconstruction backend rejected the image/mask pair or failed
    /// internally. Carries the backend's own message.
    #[error("reconstruction failed: {0}")]
    Restoration(String),

    /// The output image could not be encoded or written.
    #[error("failed to write image {path}: {source}")]
    Write {
        /// Path of the image that failed to write.
        path: PathBuf,
        /// Underlying encode or I/O error.
        source: image::ImageError,
    },

    /// A batch output directory could not be created. Fatal for the whole
    /// batch; no jobs run after this is reported.
    #[error("failed to create output directory {path}: {source}")]
    Directory {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The output path names an image format this crate does not write.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let load = Error::Load {
            path: PathBuf::from("/tmp/gone.png"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )),
        };
        assert!(load.to_string().contains("/tmp/gone.png"));
        assert!(load.to_string().contains("no such file"));

        let restore = Error::Restoration("model rejected mask".to_string());
        assert!(restore.to_string().contains("model rejected mask"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));
    }
}
