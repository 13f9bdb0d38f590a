//! Datapack assembly.
//!
//! The package replays the video by chaining one function per frame. Each
//! frame function draws its image with `particleex image` and schedules the
//! next frame's function one tick later; the last one schedules nothing.
//! `main.mcfunction` starts the chain at frame 0.
//!
//! The chain is generated from an explicit index sequence ([`FrameChain`])
//! whose links carry a computed `next` index, so the terminal case lives in
//! exactly one place.
//!
//! ```text
//! <namespace>/
//!   pack.mcmeta
//!   data/<namespace>/functions/
//!     main.mcfunction
//!     <namespace>_0.mcfunction
//!     ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::configuration::{ConvertOptions, ParticleOptions};
use crate::error::PackError;
use crate::frames::FrameSequence;
use crate::progress::{OperationType, ProgressTracker};
use crate::utilities::{format_compact, format_decimal, remove_dir_if_exists};

/// File name of the package metadata.
pub const METADATA_FILE: &str = "pack.mcmeta";
/// Extension of command scripts.
pub const SCRIPT_EXTENSION: &str = "mcfunction";
/// Name of the entry function.
pub const ENTRY_FUNCTION: &str = "main";

/// Check that `namespace` is usable as a datapack namespace.
///
/// The engine only accepts lowercase ASCII letters, digits, `_`, `-` and `.`.
///
/// # Errors
///
/// Returns [`PackError::InvalidNamespace`] describing the first problem.
pub fn validate_namespace(namespace: &str) -> Result<(), PackError> {
    let invalid = |reason: String| PackError::InvalidNamespace {
        namespace: namespace.to_string(),
        reason,
    };
    if namespace.is_empty() {
        return Err(invalid("namespace is empty".to_string()));
    }
    if let Some(c) = namespace
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
    {
        return Err(invalid(format!("character {c:?} is not allowed")));
    }
    if namespace == "." || namespace == ".." {
        return Err(invalid("namespace cannot be a relative path".to_string()));
    }
    Ok(())
}

/// Package identity written to `pack.mcmeta`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct PackageDescriptor {
    /// Namespace, also the package directory and archive name.
    pub namespace: String,
    /// Engine `pack_format` compatibility marker.
    pub pack_format: u32,
    /// Human-readable description.
    pub description: String,
}

impl PackageDescriptor {
    /// Describe a package for `namespace`.
    pub fn new(namespace: impl Into<String>, pack_format: u32) -> Self {
        let namespace = namespace.into();
        let description = format!("Video particle animation ({namespace})");
        Self {
            namespace,
            pack_format,
            description,
        }
    }

    /// The `pack.mcmeta` contents.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::JsonError`] if serialization fails.
    pub fn metadata_json(&self) -> Result<String, PackError> {
        let payload = json!({
            "pack": {
                "pack_format": self.pack_format,
                "description": self.description,
            }
        });
        Ok(serde_json::to_string_pretty(&payload)?)
    }
}

/// Paths inside a package rooted at `<output_root>/<namespace>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    namespace: String,
    root: PathBuf,
}

impl PackageLayout {
    /// Layout for `namespace` below `output_root`.
    pub fn new(output_root: &Path, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            root: output_root.join(namespace),
        }
    }

    /// The package root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `pack.mcmeta`.
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// `data/<namespace>/functions`.
    pub fn functions_dir(&self) -> PathBuf {
        self.root
            .join("data")
            .join(&self.namespace)
            .join("functions")
    }

    /// `main.mcfunction`.
    pub fn entry_script_path(&self) -> PathBuf {
        self.functions_dir()
            .join(format!("{ENTRY_FUNCTION}.{SCRIPT_EXTENSION}"))
    }

    /// `<namespace>_<index>.mcfunction`.
    pub fn frame_script_path(&self, index: usize) -> PathBuf {
        self.functions_dir().join(format!(
            "{}.{SCRIPT_EXTENSION}",
            frame_function_id(&self.namespace, index)
        ))
    }
}

/// Function id of frame `index`, without namespace: `<namespace>_<index>`.
pub fn frame_function_id(namespace: &str, index: usize) -> String {
    format!("{namespace}_{index}")
}

/// Namespace-qualified function name: `<namespace>:<namespace>_<index>`.
pub fn qualified_frame_function(namespace: &str, index: usize) -> String {
    format!("{namespace}:{}", frame_function_id(namespace, index))
}

/// One state of the playback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    /// This frame's index.
    pub index: usize,
    /// Index scheduled after this frame, `None` for the terminal frame.
    pub next: Option<usize>,
}

impl ChainLink {
    /// Returns `true` for the last frame.
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// The forward-only chain `0 -> 1 -> ... -> len-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameChain {
    len: usize,
}

impl FrameChain {
    /// A chain over `len` frames.
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for an empty chain.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The link for `index`, or `None` past the end.
    pub fn link(&self, index: usize) -> Option<ChainLink> {
        (index < self.len).then(|| ChainLink {
            index,
            next: (index + 1 < self.len).then_some(index + 1),
        })
    }

    /// Links in playback order.
    pub fn links(&self) -> impl Iterator<Item = ChainLink> + '_ {
        (0..self.len).filter_map(|index| self.link(index))
    }
}

/// The `particleex image` command for one image.
pub fn render_command(particle: &ParticleOptions, image_name: &str) -> String {
    let (rx, ry, rz) = particle.rotation;
    let (vx, vy, vz) = particle.velocity;
    format!(
        "particleex image {} {} {} {} {} {} {} {} {} {} {} {} {} \"{}\" {} {}",
        particle.particle_id,
        particle.anchor,
        image_name,
        format_decimal(particle.scale),
        format_compact(rx),
        format_compact(ry),
        format_compact(rz),
        particle.flip,
        format_decimal(particle.density),
        format_compact(vx),
        format_compact(vy),
        format_compact(vz),
        particle.lifetime_ticks,
        particle.speed_expression,
        format_decimal(particle.step),
        particle.group,
    )
}

/// Contents of the frame function for `link`.
pub fn frame_script(
    namespace: &str,
    link: ChainLink,
    image_name: &str,
    particle: &ParticleOptions,
    delay_ticks: u32,
) -> String {
    let mut script = format!(
        "execute positioned ~ ~ ~ run {}\n",
        render_command(particle, image_name)
    );
    if let Some(next) = link.next {
        script.push_str(&format!(
            "schedule function {} {delay_ticks}t\n",
            qualified_frame_function(namespace, next)
        ));
    }
    script
}

/// Contents of `main.mcfunction`.
pub fn entry_script(namespace: &str) -> String {
    format!("function {}\n", qualified_frame_function(namespace, 0))
}

/// A package written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPackage {
    /// Identity written to `pack.mcmeta`.
    pub descriptor: PackageDescriptor,
    /// Paths of the package.
    pub layout: PackageLayout,
    /// Number of frame functions written.
    pub frame_count: usize,
    /// Directory the images were copied into.
    pub image_dir: PathBuf,
}

/// Writes the datapack tree and copies frame images to the engine.
#[derive(Debug)]
pub struct PackageAssembler<'a> {
    options: &'a ConvertOptions,
}

impl<'a> PackageAssembler<'a> {
    /// Create an assembler using the particle and destination settings in
    /// `options`.
    pub fn new(options: &'a ConvertOptions) -> Self {
        Self { options }
    }

    /// Build the package for `frames` under `<output_root>/<namespace>`.
    ///
    /// Any previous package tree of the same name is removed first, so the
    /// result holds exactly one function per frame.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::NothingToPackage`] without touching the disk
    /// when `frames` is empty, [`PackError::InvalidNamespace`] for a bad
    /// namespace, and I/O or serialization errors from writing.
    pub fn assemble(
        &self,
        frames: &FrameSequence,
        namespace: &str,
        output_root: &Path,
    ) -> Result<AssembledPackage, PackError> {
        validate_namespace(namespace)?;
        if frames.is_empty() {
            return Err(PackError::NothingToPackage(output_root.to_path_buf()));
        }

        let image_dir = self.options.image_dest_dir.clone();
        fs::create_dir_all(&image_dir)?;

        let layout = PackageLayout::new(output_root, namespace);
        remove_dir_if_exists(layout.root())?;
        fs::create_dir_all(layout.functions_dir())?;

        let descriptor = PackageDescriptor::new(namespace, self.options.pack_format);
        fs::write(layout.metadata_path(), descriptor.metadata_json()?)?;
        fs::write(layout.entry_script_path(), entry_script(namespace))?;

        log::info!(
            "Writing {} frame function(s) to {}",
            frames.len(),
            layout.functions_dir().display()
        );

        let chain = FrameChain::new(frames.len());
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Assembly,
            Some(frames.len() as u64),
            self.options.batch_size,
        );
        for (frame, link) in frames.iter().zip(chain.links()) {
            let image_name = frame.file_name();
            fs::copy(&frame.path, image_dir.join(&image_name))?;

            let script = frame_script(
                namespace,
                link,
                &image_name,
                &self.options.particle,
                self.options.schedule_delay_ticks,
            );
            fs::write(layout.frame_script_path(link.index), script)?;
            tracker.advance(Some(link.index as u64));
        }
        tracker.finish();

        Ok(AssembledPackage {
            descriptor,
            layout,
            frame_count: chain.len(),
            image_dir,
        })
    }
}
