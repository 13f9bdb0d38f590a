//! Error types for the `video2datapack` crate.
//!
//! This module defines [`PackError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context (paths,
//! exit statuses, decoder output) to diagnose a failed conversion without
//! additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf, process::ExitStatus, time::Duration};

use async_zip::error::ZipError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;
use walkdir::Error as WalkError;

/// The unified error type for all `video2datapack` operations.
///
/// Every public method that can fail returns `Result<T, PackError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PackError {
    /// The source video does not exist or is not a regular file.
    #[error("Video file not found: {0}")]
    VideoNotFound(PathBuf),

    /// The datapack namespace contains characters the engine rejects.
    #[error("Invalid namespace {namespace:?}: {reason}")]
    InvalidNamespace {
        /// The namespace that was rejected.
        namespace: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// No decoder executable could be located by any configured source.
    #[error("Could not locate an ffmpeg executable (tried: {tried})")]
    DecoderNotFound {
        /// Human-readable list of the sources that were tried.
        tried: String,
    },

    /// The host operating system has no known decoder download.
    #[error("Automatic ffmpeg download is not supported on {0}; please provide ffmpeg manually")]
    UnsupportedPlatform(String),

    /// Downloading or unpacking the decoder failed.
    #[error("Failed to fetch ffmpeg: {0}")]
    DecoderFetch(String),

    /// The decoder process could not be started.
    #[error("Failed to launch {program}: {reason}")]
    DecoderLaunch {
        /// Executable that was launched.
        program: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The decoder exited with a non-zero status during frame extraction.
    #[error("ffmpeg exited with {status}: {stderr}")]
    DecoderFailed {
        /// Exit status reported by the operating system.
        status: ExitStatus,
        /// Trailing diagnostic output of the decoder.
        stderr: String,
    },

    /// The introspection call did not finish within its time budget.
    #[error("ffmpeg probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// The introspection output did not contain a video resolution.
    #[error("No video resolution found in ffmpeg output")]
    ResolutionNotFound,

    /// Frame extraction produced no images.
    #[error("No frame images found in {0}; nothing to package")]
    NothingToPackage(PathBuf),

    /// A frame image could not be processed.
    #[error("Failed to process frame {path}: {source}")]
    FrameImage {
        /// Path of the offending image.
        path: PathBuf,
        /// Error reported by the image codec.
        #[source]
        source: ImageError,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// Walking the package directory failed.
    #[error("Directory walk error: {0}")]
    WalkError(#[from] WalkError),

    /// Writing or reading the zip archive failed.
    #[error("Archive error: {0}")]
    ArchiveError(#[from] ZipError),

    /// The package metadata could not be serialized.
    #[error("Metadata serialization error: {0}")]
    JsonError(#[from] JsonError),
}
