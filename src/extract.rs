//! Frame extraction.
//!
//! [`FrameExtractor`] runs the decoder once over the whole video, resampling
//! to a constant frame rate and scaling to the target size, and writes one
//! PNG per output frame named `<namespace>_000001.png`,
//! `<namespace>_000002.png`, and so on. The output directory is wiped first
//! so frames from an earlier, longer run can never leak into the sequence.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::configuration::ConvertOptions;
use crate::decoder::Decoder;
use crate::error::PackError;
use crate::probe::Resolution;
use crate::quantize::effective_palette;
use crate::utilities::{recreate_dir, tail_lines};

/// Minimum digits in the decoder's frame number. Longer runs widen the
/// number; [`FrameSequence`](crate::FrameSequence) orders frames numerically.
pub const FRAME_NUMBER_WIDTH: usize = 6;

/// Extension of extracted frame images.
pub const FRAME_EXTENSION: &str = "png";

/// Compute the output size for `source` scaled to `target_width`.
///
/// A degenerate source (either dimension zero) is replaced by `fallback`
/// first. The height keeps the source aspect ratio, rounded to the nearest
/// pixel and never less than one.
pub fn target_dimensions(
    source: Resolution,
    target_width: u32,
    fallback: Resolution,
) -> Resolution {
    let source = if source.is_degenerate() {
        fallback
    } else {
        source
    };
    let height = (source.height as f64 * target_width as f64 / source.width as f64).round() as u32;
    Resolution::new(target_width, height.max(1))
}

/// The decoder's printf-style output name, e.g. `videopack_%06d.png`.
pub fn frame_template(namespace: &str) -> String {
    format!("{namespace}_%0{FRAME_NUMBER_WIDTH}d.{FRAME_EXTENSION}")
}

/// The `-vf` filter chain for the given rate and size.
pub fn filter_chain(frame_rate: u32, target: Resolution) -> String {
    format!("fps={frame_rate},scale={}:{}", target.width, target.height)
}

/// Full decoder argument list for an extraction run.
///
/// A `palette` size adds the decoder's `-colors` hint; the post-processor
/// still enforces the limit on every frame.
pub fn extraction_arguments(
    video: &Path,
    output_dir: &Path,
    namespace: &str,
    frame_rate: u32,
    palette: Option<usize>,
    target: Resolution,
) -> Vec<OsString> {
    let mut arguments: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.as_os_str().to_owned(),
    ];
    if let Some(colors) = palette {
        arguments.push("-colors".into());
        arguments.push(colors.to_string().into());
    }
    arguments.extend([
        "-vf".into(),
        filter_chain(frame_rate, target).into(),
        "-vsync".into(),
        "0".into(),
        output_dir.join(frame_template(namespace)).into_os_string(),
    ]);
    arguments
}

/// Summary of a finished extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Directory holding the frame images.
    pub output_dir: PathBuf,
    /// Size every frame was scaled to.
    pub target: Resolution,
}

/// Runs the decoder to produce the frame image sequence.
#[derive(Debug)]
pub struct FrameExtractor<'a> {
    decoder: &'a Decoder,
    options: &'a ConvertOptions,
}

impl<'a> FrameExtractor<'a> {
    /// Create an extractor using `decoder` and the rate/width in `options`.
    pub fn new(decoder: &'a Decoder, options: &'a ConvertOptions) -> Self {
        Self { decoder, options }
    }

    /// Extract every frame of `video` into `output_dir`.
    ///
    /// `output_dir` is deleted and recreated before the decoder starts.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::IoError`] if the directory cannot be reset,
    /// [`PackError::DecoderLaunch`] if the decoder cannot be started, or
    /// [`PackError::DecoderFailed`] if it exits unsuccessfully.
    pub fn extract(
        &self,
        video: &Path,
        output_dir: &Path,
        namespace: &str,
        source: Resolution,
    ) -> Result<Extraction, PackError> {
        recreate_dir(output_dir)?;

        let target = target_dimensions(
            source,
            self.options.max_width,
            self.options.fallback_resolution,
        );
        let arguments = extraction_arguments(
            video,
            output_dir,
            namespace,
            self.options.frame_rate,
            effective_palette(self.options.max_colors),
            target,
        );
        log::info!(
            "Extracting frames at {} fps, {source} -> {target}",
            self.options.frame_rate
        );
        log::debug!(
            "Running {} {}",
            self.decoder.path().display(),
            arguments
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = self
            .decoder
            .command()
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| PackError::DecoderLaunch {
                program: self.decoder.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PackError::DecoderFailed {
                status: output.status,
                stderr: tail_lines(&String::from_utf8_lossy(&output.stderr), 10),
            });
        }

        Ok(Extraction {
            output_dir: output_dir.to_path_buf(),
            target,
        })
    }
}
