//! In-place post-processing of extracted frames.
//!
//! Every frame is decoded, normalised to RGBA8 and written back over its own
//! path. When a palette limit below 256 is configured the frame is first
//! reduced to that many colors with NeuQuant and expanded back to RGBA8, so
//! the file format stays the same while the image uses only palette colors.

use std::path::Path;

use color_quant::NeuQuant;
use image::{ImageFormat, RgbaImage};

use crate::configuration::ConvertOptions;
use crate::error::PackError;
use crate::frames::FrameSequence;
use crate::progress::{OperationType, ProgressTracker};

/// NeuQuant sampling factor: 1 inspects every pixel, 30 is fastest.
pub const DEFAULT_SAMPLE_FACTOR: i32 = 10;

/// The palette size to reduce to, or `None` when quantization is off.
///
/// Limits of 256 and above cannot reduce an 8-bit channel and are treated
/// as "off".
pub fn effective_palette(max_colors: Option<u32>) -> Option<usize> {
    max_colors
        .filter(|&colors| colors < 256)
        .map(|colors| colors.max(2) as usize)
}

/// Reduce `image` to at most `colors` distinct RGBA values.
pub fn quantize_image(image: &RgbaImage, colors: usize, sample_factor: i32) -> RgbaImage {
    let quantizer = NeuQuant::new(sample_factor.clamp(1, 30), colors, image.as_raw());
    let palette = quantizer.color_map_rgba();

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let index = quantizer.index_of(&pixel.0);
        let entry = &palette[index * 4..index * 4 + 4];
        pixel.0.copy_from_slice(entry);
    }
    output
}

/// Rewrites frame images in place, optionally palette-reducing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcessor {
    palette: Option<usize>,
    sample_factor: i32,
}

impl PostProcessor {
    /// Create a post-processor for the palette limit in `options`.
    pub fn new(options: &ConvertOptions) -> Self {
        Self {
            palette: effective_palette(options.max_colors),
            sample_factor: DEFAULT_SAMPLE_FACTOR,
        }
    }

    /// Override the NeuQuant sampling factor.
    #[must_use]
    pub fn with_sample_factor(mut self, sample_factor: i32) -> Self {
        self.sample_factor = sample_factor;
        self
    }

    /// Returns `true` if frames will be palette-reduced.
    pub fn quantizes(&self) -> bool {
        self.palette.is_some()
    }

    /// Decode, optionally quantize, and re-encode one image over itself.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::FrameImage`] if the file cannot be decoded or
    /// encoded.
    pub fn process_file(&self, path: &Path) -> Result<(), PackError> {
        let frame_error = |source| PackError::FrameImage {
            path: path.to_path_buf(),
            source,
        };

        let image = image::open(path).map_err(frame_error)?.to_rgba8();
        let image = match self.palette {
            Some(colors) => quantize_image(&image, colors, self.sample_factor),
            None => image,
        };
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(frame_error)
    }

    /// Process every frame of `frames` in order.
    ///
    /// Stops at the first failure; there is no skip-and-continue mode.
    ///
    /// # Errors
    ///
    /// Returns the first [`PackError::FrameImage`] encountered.
    pub fn process(&self, frames: &FrameSequence, options: &ConvertOptions) -> Result<(), PackError> {
        match self.palette {
            Some(colors) => log::info!("Quantizing {} frame(s) to {colors} colors", frames.len()),
            None => log::debug!("Normalising {} frame(s) to RGBA", frames.len()),
        }

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::PostProcessing,
            Some(frames.len() as u64),
            options.batch_size,
        );
        for frame in frames {
            self.process_file(&frame.path)?;
            tracker.advance(Some(frame.index as u64));
        }
        tracker.finish();
        Ok(())
    }
}
