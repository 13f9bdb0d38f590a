use std::{
    path::PathBuf,
    process,
    sync::{Arc, Mutex},
};

use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};
use video2datapack::{
    ConvertOptions, Converter, DecoderSource, OperationType, PackError, ParticleOptions,
    ProgressCallback, ProgressInfo, locate_decoder, validate_namespace,
};

const CLI_AFTER_HELP: &str = "Examples:\n  video2datapack convert input.mp4\n  video2datapack convert input.mp4 intro --colors 64 --progress\n  video2datapack probe input.mp4 --json\n  video2datapack completions zsh > _video2datapack";

#[derive(Debug, Parser)]
#[command(
    name = "video2datapack",
    version,
    about = "Turn a video into a Minecraft datapack that replays it with ParticleEx images",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show progress bars for the per-frame stages.
    #[arg(long, global = true)]
    progress: bool,

    /// Path to an ffmpeg executable to use instead of searching for one.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Directory receiving the frames, the datapack and the archive.
    #[arg(long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Print results as machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a video into a datapack and zip archive.
    #[command(
        about = "Convert a video into a datapack",
        after_help = "Examples:\n  video2datapack convert input.mp4\n  video2datapack convert input.mp4 intro --fps 10 --width 320"
    )]
    Convert {
        /// Input video path.
        video: PathBuf,
        /// Datapack namespace (lowercase letters, digits, `_`, `-`, `.`).
        namespace: Option<String>,
        /// Output frames per second.
        #[arg(long)]
        fps: Option<u32>,
        /// Output width in pixels.
        #[arg(long)]
        width: Option<u32>,
        /// Reduce every frame to at most this many colors (below 256).
        #[arg(long)]
        colors: Option<u32>,
        /// Directory the ParticleEx mod loads images from
        /// (default: $PARTICLEEX_IMAGE_DIR, then ./particleImages).
        #[arg(long)]
        image_dir: Option<PathBuf>,
        /// Particle image scale.
        #[arg(long)]
        scale: Option<f64>,
    },

    /// Print the resolution of a video and the size frames would use.
    #[command(
        about = "Probe video resolution",
        after_help = "Examples:\n  video2datapack probe input.mp4\n  video2datapack probe input.mp4 --json"
    )]
    Probe {
        /// Input video path.
        video: PathBuf,
        /// Output width in pixels.
        #[arg(long)]
        width: Option<u32>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn operation_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::PostProcessing => "frames",
        OperationType::Assembly => "package",
        OperationType::Archiving => "archive",
        _ => "working",
    }
}

/// Renders one indicatif bar per stage, replacing it when the stage changes.
#[derive(Default)]
struct TerminalProgress {
    current: Mutex<Option<(OperationType, ProgressBar)>>,
}

impl TerminalProgress {
    fn new() -> Self {
        Self::default()
    }

    fn new_bar(operation: OperationType, total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {prefix:>8} {bar:40.cyan/blue} {pos}/{len}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_prefix(operation_label(operation));
        bar
    }

    fn finish(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some((_, bar)) = current.take()
        {
            bar.finish();
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        let stale = current
            .as_ref()
            .is_none_or(|(operation, _)| *operation != info.operation);
        if stale {
            if let Some((_, bar)) = current.take() {
                bar.finish();
            }
            *current = Some((
                info.operation,
                Self::new_bar(info.operation, info.total.unwrap_or(0)),
            ));
        }
        if let Some((_, bar)) = current.as_ref() {
            bar.set_position(info.current);
        }
    }
}

fn decoder_sources(global: &GlobalOptions) -> Vec<DecoderSource> {
    DecoderSource::default_chain(global.ffmpeg.clone())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            process::exit(code);
        }
    };
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Convert {
            video,
            namespace,
            fps,
            width,
            colors,
            image_dir,
            scale,
        } => {
            if !video.is_file() {
                return Err(PackError::VideoNotFound(video).into());
            }
            if let Some(namespace) = &namespace {
                validate_namespace(namespace)?;
            }

            let mut options = ConvertOptions::new().with_max_colors(colors);
            if let Some(fps) = fps {
                options = options.with_frame_rate(fps);
            }
            if let Some(width) = width {
                options = options.with_max_width(width);
            }
            if let Some(dir) = image_dir {
                options = options.with_image_dest_dir(dir);
            }
            if let Some(scale) = scale {
                options = options.with_particle(ParticleOptions::new().with_scale(scale));
            }
            let progress = cli.global.progress.then(|| Arc::new(TerminalProgress::new()));
            if let Some(progress) = &progress {
                options = options.with_progress(progress.clone());
            }
            options.validate()?;

            let decoder = locate_decoder(&decoder_sources(&cli.global))?;
            let report = Converter::new(&decoder, &options).convert(
                &video,
                namespace.as_deref(),
                &cli.global.output_dir,
            )?;
            if let Some(progress) = &progress {
                progress.finish();
            }

            if cli.global.json {
                let payload = json!({
                    "namespace": report.namespace,
                    "source": { "width": report.source.width, "height": report.source.height },
                    "used_fallback": report.used_fallback,
                    "target": { "width": report.target.width, "height": report.target.height },
                    "frame_count": report.frame_count,
                    "quantized": report.quantized,
                    "package_root": report.package_root,
                    "archive_path": report.archive_path,
                    "image_dir": report.image_dir,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{report}");
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Packaged {} frame(s) as {}",
                        report.frame_count, report.namespace
                    )
                    .green()
                );
            }
        }
        Commands::Probe { video, width } => {
            if !video.is_file() {
                return Err(PackError::VideoNotFound(video).into());
            }

            let mut options = ConvertOptions::new();
            if let Some(width) = width {
                options = options.with_max_width(width);
            }
            let decoder = locate_decoder(&decoder_sources(&cli.global))?;
            let (outcome, target) = Converter::new(&decoder, &options).probe(&video)?;

            if cli.global.json {
                let payload = json!({
                    "width": outcome.resolution.width,
                    "height": outcome.resolution.height,
                    "used_fallback": outcome.used_fallback,
                    "target": { "width": target.width, "height": target.height },
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Resolution: {}", outcome.resolution);
                println!("Frames:     {target}");
                if outcome.used_fallback {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        "resolution could not be probed; showing the fallback".yellow()
                    );
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "video2datapack", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        process::exit(1);
    }
}
