//! # video2datapack
//!
//! Turn a video into a Minecraft datapack that replays it frame by frame
//! with the ParticleEx mod's `particleex image` command.
//!
//! The conversion runs an external `ffmpeg` executable to probe the source
//! resolution and to export one PNG per output frame, optionally reduces
//! each frame to a small palette, and then writes a datapack whose frame
//! functions schedule each other one tick apart. The datapack is also
//! zipped into a single archive ready to drop into a world's `datapacks`
//! folder.
//!
//! ## Quick Start
//!
//! ### Convert a Video
//!
//! ```no_run
//! use std::path::Path;
//!
//! use video2datapack::{ConvertOptions, Converter, DecoderSource, locate_decoder};
//!
//! let decoder = locate_decoder(&DecoderSource::default_chain(None)).unwrap();
//! let options = ConvertOptions::new();
//! let report = Converter::new(&decoder, &options)
//!     .convert(Path::new("input.mp4"), None, Path::new("."))
//!     .unwrap();
//! println!("{} frames -> {}", report.frame_count, report.archive_path.display());
//! ```
//!
//! ### Generate Frame Functions Only
//!
//! ```
//! use video2datapack::{FrameChain, ParticleOptions, entry_script, frame_script};
//!
//! let particle = ParticleOptions::new();
//! let chain = FrameChain::new(2);
//! let first = chain.link(0).unwrap();
//!
//! assert_eq!(entry_script("intro"), "function intro:intro_0\n");
//! assert!(frame_script("intro", first, "intro_000001.png", &particle, 1)
//!     .ends_with("schedule function intro:intro_1 1t\n"));
//! ```
//!
//! ## Features
//!
//! - **Decoder discovery**: explicit path, local copy, `PATH`, or a static
//!   build downloaded on demand
//! - **Best-effort probing**: falls back to 1920x1080 with a warning when
//!   the resolution cannot be read
//! - **Palette reduction**: NeuQuant quantization to any palette below 256
//! - **Chained playback**: one function per frame linked by `schedule`
//! - **Reproducible archives**: sorted entries relative to the package root
//! - **Progress callbacks** for the per-frame stages
//!
//! ## Requirements
//!
//! An `ffmpeg` executable, either installed or fetched automatically, and
//! `curl` plus `tar` when fetching on Linux.

pub mod archive;
pub mod configuration;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod frames;
pub mod package;
pub mod probe;
pub mod progress;
pub mod quantize;
mod utilities;

pub use archive::{
    ArchiveSummary, ArchiveWriter, archive_entry_name, archive_path, read_archive_entries,
    write_archive,
};
pub use configuration::{ConvertOptions, ParticleOptions};
pub use convert::{ConversionReport, Converter};
pub use decoder::{Decoder, DecoderSource, DownloadUrls, locate_decoder};
pub use error::PackError;
pub use extract::{Extraction, FrameExtractor, target_dimensions};
pub use frames::{Frame, FrameSequence};
pub use package::{
    AssembledPackage, ChainLink, FrameChain, PackageAssembler, PackageDescriptor, PackageLayout,
    entry_script, frame_script, render_command, validate_namespace,
};
pub use probe::{ProbeOutcome, Resolution, ResolutionProber};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use quantize::PostProcessor;
