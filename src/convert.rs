//! The end-to-end conversion pipeline.
//!
//! [`Converter`] wires the stages together in their fixed order:
//!
//! 1. probe the source resolution ([`ResolutionProber`])
//! 2. extract frames into `<output_root>/frames` ([`FrameExtractor`])
//! 3. re-encode and optionally quantize them in place ([`PostProcessor`])
//! 4. write the datapack and copy images out ([`PackageAssembler`])
//! 5. zip the datapack into `<output_root>/<namespace>.zip` ([`ArchiveWriter`])
//!
//! Each stage finishes before the next begins. Only the probe recovers from
//! failure; every other error aborts the run.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use crate::{
    archive::{ArchiveWriter, archive_path},
    configuration::ConvertOptions,
    decoder::Decoder,
    error::PackError,
    extract::{FrameExtractor, target_dimensions},
    frames::FrameSequence,
    package::{PackageAssembler, validate_namespace},
    probe::{ProbeOutcome, Resolution, ResolutionProber},
    quantize::PostProcessor,
};

/// Name of the working directory that receives extracted frames.
pub const FRAMES_DIR: &str = "frames";

/// Summary of a finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Namespace of the generated package.
    pub namespace: String,
    /// Resolution of the source video (possibly the fallback).
    pub source: Resolution,
    /// `true` if probing failed and `source` is the fallback resolution.
    pub used_fallback: bool,
    /// Size every frame was scaled to.
    pub target: Resolution,
    /// Number of frames, and frame functions, in the package.
    pub frame_count: usize,
    /// Directory holding the extracted frames.
    pub frames_dir: PathBuf,
    /// Root of the datapack directory tree.
    pub package_root: PathBuf,
    /// The zip archive.
    pub archive_path: PathBuf,
    /// Where frame images were copied for the particle mod.
    pub image_dir: PathBuf,
    /// `true` if frames were palette-reduced.
    pub quantized: bool,
}

impl ConversionReport {
    /// The in-game command that starts playback.
    pub fn start_command(&self) -> String {
        format!("/function {}:main", self.namespace)
    }
}

impl Display for ConversionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "Datapack:  {}", self.package_root.display())?;
        writeln!(f, "Archive:   {}", self.archive_path.display())?;
        writeln!(f, "Images:    {}", self.image_dir.display())?;
        writeln!(
            f,
            "Frames:    {} at {} (source {}{})",
            self.frame_count,
            self.target,
            self.source,
            if self.used_fallback { ", assumed" } else { "" }
        )?;
        write!(f, "In game:   /reload, then {}", self.start_command())
    }
}

/// Runs the whole video-to-datapack pipeline with one decoder and one set of
/// options.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use video2datapack::{ConvertOptions, Converter, DecoderSource, locate_decoder};
///
/// let decoder = locate_decoder(&DecoderSource::default_chain(None))?;
/// let options = ConvertOptions::new().with_max_colors(Some(64));
/// let report = Converter::new(&decoder, &options).convert(
///     Path::new("input.mp4"),
///     Some("intro"),
///     Path::new("."),
/// )?;
/// println!("{report}");
/// # Ok::<(), video2datapack::PackError>(())
/// ```
#[derive(Debug)]
pub struct Converter<'a> {
    decoder: &'a Decoder,
    options: &'a ConvertOptions,
}

impl<'a> Converter<'a> {
    /// Create a converter.
    pub fn new(decoder: &'a Decoder, options: &'a ConvertOptions) -> Self {
        Self { decoder, options }
    }

    /// Probe `video` and return its resolution and the size frames would be
    /// scaled to.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::VideoNotFound`] if `video` is not a file.
    pub fn probe(&self, video: &Path) -> Result<(ProbeOutcome, Resolution), PackError> {
        if !video.is_file() {
            return Err(PackError::VideoNotFound(video.to_path_buf()));
        }
        let outcome = self.prober().probe(video);
        let target = target_dimensions(
            outcome.resolution,
            self.options.max_width,
            self.options.fallback_resolution,
        );
        Ok((outcome, target))
    }

    /// Convert `video` into a datapack below `output_root`.
    ///
    /// `namespace` defaults to [`ConvertOptions::namespace_default`].
    ///
    /// # Errors
    ///
    /// Returns [`PackError::VideoNotFound`], [`PackError::InvalidNamespace`]
    /// or [`PackError::InvalidOption`] before any work starts, and the first
    /// error of any later stage. [`PackError::NothingToPackage`] is returned
    /// when the decoder produced no frames; no package or archive is written
    /// in that case.
    pub fn convert(
        &self,
        video: &Path,
        namespace: Option<&str>,
        output_root: &Path,
    ) -> Result<ConversionReport, PackError> {
        let namespace = namespace.unwrap_or(&self.options.namespace_default);
        validate_namespace(namespace)?;
        self.options.validate()?;
        if !video.is_file() {
            return Err(PackError::VideoNotFound(video.to_path_buf()));
        }

        let probe = self.prober().probe(video);

        let frames_dir = output_root.join(FRAMES_DIR);
        let extraction = FrameExtractor::new(self.decoder, self.options).extract(
            video,
            &frames_dir,
            namespace,
            probe.resolution,
        )?;

        let frames = FrameSequence::scan(&extraction.output_dir, namespace)?;
        if frames.is_empty() {
            return Err(PackError::NothingToPackage(extraction.output_dir));
        }

        let post_processor = PostProcessor::new(self.options);
        post_processor.process(&frames, self.options)?;

        let package = PackageAssembler::new(self.options).assemble(&frames, namespace, output_root)?;

        let archive = ArchiveWriter::new()
            .with_progress(self.options.progress.clone(), self.options.batch_size)
            .write(package.layout.root(), &archive_path(output_root, namespace))?;

        Ok(ConversionReport {
            namespace: namespace.to_string(),
            source: probe.resolution,
            used_fallback: probe.used_fallback,
            target: extraction.target,
            frame_count: package.frame_count,
            frames_dir: extraction.output_dir,
            package_root: package.layout.root().to_path_buf(),
            archive_path: archive.path,
            image_dir: package.image_dir,
            quantized: post_processor.quantizes(),
        })
    }

    fn prober(&self) -> ResolutionProber<'a> {
        ResolutionProber::new(self.decoder)
            .with_timeout(self.options.probe_timeout)
            .with_fallback(self.options.fallback_resolution)
    }
}
