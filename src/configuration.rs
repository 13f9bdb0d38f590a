//! Conversion configuration.
//!
//! [`ConvertOptions`] is an immutable builder that carries every tunable of
//! a conversion (frame rate, output width, palette size, particle command
//! parameters, destination directories) plus the progress callback, so each
//! pipeline stage receives one value instead of reading globals.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use video2datapack::{ConvertOptions, ParticleOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let options = ConvertOptions::new()
//!     .with_frame_rate(10)
//!     .with_max_width(320)
//!     .with_max_colors(Some(32))
//!     .with_particle(ParticleOptions::new().with_scale(0.5))
//!     .with_progress(Arc::new(LogProgress));
//! ```

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PackError;
use crate::probe::Resolution;
use crate::progress::{NoOpProgress, ProgressCallback};
use crate::quantize::effective_palette;

/// Output frames per second. 20 matches the engine's 20 ticks per second.
pub const DEFAULT_FRAME_RATE: u32 = 20;
/// Width every frame is scaled to; height follows the source aspect ratio.
pub const DEFAULT_MAX_WIDTH: u32 = 640;
/// Engine `pack_format` the generated `pack.mcmeta` declares.
pub const DEFAULT_PACK_FORMAT: u32 = 6;
/// Namespace used when the caller does not supply one.
pub const DEFAULT_NAMESPACE: &str = "videopack";
/// Environment variable that overrides the image destination directory.
pub const IMAGE_DIR_ENV: &str = "PARTICLEEX_IMAGE_DIR";

/// Parameters of the `particleex image` command written for every frame.
///
/// Everything except the image file name is fixed for the whole package.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ParticleOptions {
    /// Particle effect identifier (e.g. `minecraft:end_rod`).
    pub particle_id: String,
    /// Anchor position expression relative to the executing entity.
    pub anchor: String,
    /// Image scale factor.
    pub scale: f64,
    /// Rotation around the x, y and z axes in degrees.
    pub rotation: (f64, f64, f64),
    /// Flip mode (`not`, `x`, `y`, `z`).
    pub flip: String,
    /// Particle density (dots per block).
    pub density: f64,
    /// Initial particle velocity.
    pub velocity: (f64, f64, f64),
    /// Particle lifetime in game ticks.
    pub lifetime_ticks: u32,
    /// Per-tick speed expression.
    pub speed_expression: String,
    /// Expression evaluation step.
    pub step: f64,
    /// Particle group tag (`null` for none).
    pub group: String,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self {
            particle_id: "minecraft:end_rod".to_string(),
            anchor: "~ ~1 ~".to_string(),
            scale: 0.3,
            rotation: (0.0, 0.0, 0.0),
            flip: "not".to_string(),
            density: 10.0,
            velocity: (0.0, 0.0, 0.0),
            lifetime_ticks: 1,
            speed_expression: "vy=0".to_string(),
            step: 1.0,
            group: "null".to_string(),
        }
    }
}

impl ParticleOptions {
    /// Create particle options with the stock end-rod configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the particle effect identifier.
    pub fn with_particle_id(mut self, particle_id: impl Into<String>) -> Self {
        self.particle_id = particle_id.into();
        self
    }

    /// Set the anchor position expression.
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }

    /// Set the image scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the particle density.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Set the particle lifetime in ticks.
    pub fn with_lifetime_ticks(mut self, ticks: u32) -> Self {
        self.lifetime_ticks = ticks;
        self
    }

    /// Set the particle group tag.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

/// Configuration for a whole conversion run.
///
/// All fields have defaults matching a 20 fps, 640 px wide, unquantized
/// end-rod animation. A default-constructed value is ready to use.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Output frame rate passed to the decoder's `fps` filter.
    pub frame_rate: u32,
    /// Output width in pixels.
    pub max_width: u32,
    /// Palette size. `None` or a value of 256 and above disables quantization.
    pub max_colors: Option<u32>,
    /// Particle command parameters.
    pub particle: ParticleOptions,
    /// Namespace used when none is given explicitly.
    pub namespace_default: String,
    /// Directory the ParticleEx mod loads images from.
    pub image_dest_dir: PathBuf,
    /// Ticks between one frame function and the next.
    pub schedule_delay_ticks: u32,
    /// `pack_format` written to `pack.mcmeta`.
    pub pack_format: u32,
    /// Time budget for the resolution probe.
    pub probe_timeout: Duration,
    /// Resolution assumed when probing fails or reports a zero dimension.
    pub fallback_resolution: Resolution,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) batch_size: u64,
}

impl Debug for ConvertOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConvertOptions")
            .field("frame_rate", &self.frame_rate)
            .field("max_width", &self.max_width)
            .field("max_colors", &self.max_colors)
            .field("particle", &self.particle)
            .field("namespace_default", &self.namespace_default)
            .field("image_dest_dir", &self.image_dest_dir)
            .field("schedule_delay_ticks", &self.schedule_delay_ticks)
            .field("pack_format", &self.pack_format)
            .field("probe_timeout", &self.probe_timeout)
            .field("fallback_resolution", &self.fallback_resolution)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertOptions {
    /// Create a configuration with default settings.
    ///
    /// The image destination is read from `PARTICLEEX_IMAGE_DIR` when set,
    /// otherwise `particleImages` in the working directory.
    pub fn new() -> Self {
        let image_dest_dir = env::var_os(IMAGE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("particleImages"));

        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            max_width: DEFAULT_MAX_WIDTH,
            max_colors: None,
            particle: ParticleOptions::default(),
            namespace_default: DEFAULT_NAMESPACE.to_string(),
            image_dest_dir,
            schedule_delay_ticks: 1,
            pack_format: DEFAULT_PACK_FORMAT,
            probe_timeout: Duration::from_secs(10),
            fallback_resolution: Resolution::FALLBACK,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Set the output width.
    #[must_use]
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    /// Set the palette size. `None` disables quantization.
    #[must_use]
    pub fn with_max_colors(mut self, max_colors: Option<u32>) -> Self {
        self.max_colors = max_colors;
        self
    }

    /// Replace the particle command parameters.
    #[must_use]
    pub fn with_particle(mut self, particle: ParticleOptions) -> Self {
        self.particle = particle;
        self
    }

    /// Set the namespace used when none is given explicitly.
    #[must_use]
    pub fn with_namespace_default(mut self, namespace: impl Into<String>) -> Self {
        self.namespace_default = namespace.into();
        self
    }

    /// Set the directory frame images are copied into.
    #[must_use]
    pub fn with_image_dest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dest_dir = dir.into();
        self
    }

    /// Set the delay between consecutive frame functions, in ticks.
    #[must_use]
    pub fn with_schedule_delay_ticks(mut self, ticks: u32) -> Self {
        self.schedule_delay_ticks = ticks;
        self
    }

    /// Set the time budget of the resolution probe.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set the resolution assumed when probing fails or reports a zero
    /// dimension.
    #[must_use]
    pub fn with_fallback_resolution(mut self, resolution: Resolution) -> Self {
        self.fallback_resolution = resolution;
        self
    }

    /// Set how often the progress callback fires (every N items).
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Returns `true` when frames will be palette-reduced.
    pub fn quantization_enabled(&self) -> bool {
        effective_palette(self.max_colors).is_some()
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::InvalidOption`] for a zero frame rate, width or
    /// schedule delay, a palette smaller than two colors, or a fallback
    /// resolution with a zero dimension.
    pub fn validate(&self) -> Result<(), PackError> {
        if self.frame_rate == 0 {
            return Err(PackError::InvalidOption(
                "frame rate must be non-zero".to_string(),
            ));
        }
        if self.max_width == 0 {
            return Err(PackError::InvalidOption(
                "output width must be non-zero".to_string(),
            ));
        }
        if self.schedule_delay_ticks == 0 {
            return Err(PackError::InvalidOption(
                "schedule delay must be at least one tick".to_string(),
            ));
        }
        if let Some(colors) = self.max_colors
            && colors < 2
        {
            return Err(PackError::InvalidOption(format!(
                "palette must hold at least 2 colors, got {colors}"
            )));
        }
        if self.fallback_resolution.is_degenerate() {
            return Err(PackError::InvalidOption(format!(
                "fallback resolution must be non-zero, got {}",
                self.fallback_resolution
            )));
        }
        Ok(())
    }
}
