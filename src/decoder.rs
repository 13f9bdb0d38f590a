//! Locating the `ffmpeg` executable.
//!
//! The pipeline only ever talks to a [`Decoder`], a handle to an executable
//! path. Where that path comes from is described by [`DecoderSource`]: a copy
//! next to the working directory, a path supplied by the user, a system-wide
//! install found on `PATH`, or a static build fetched from the network.
//! [`locate_decoder`] tries a list of sources in order and returns the first
//! hit.
//!
//! # Example
//!
//! ```no_run
//! use video2datapack::{DecoderSource, locate_decoder};
//!
//! let decoder = locate_decoder(&DecoderSource::default_chain(None))?;
//! println!("using {}", decoder.path().display());
//! # Ok::<(), video2datapack::PackError>(())
//! ```

use std::env;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_zip::base::read::seek::ZipFileReader;
use futures_lite::future::block_on;
use futures_lite::io::BufReader;
use walkdir::WalkDir;

use crate::error::PackError;

/// File name of the decoder on the host platform.
pub const DECODER_BINARY: &str = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };

/// Handle to a decoder executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoder {
    path: PathBuf,
}

impl Decoder {
    /// Wrap an executable path without checking it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path (or bare program name) of the executable.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh [`Command`] for this executable.
    pub fn command(&self) -> Command {
        Command::new(&self.path)
    }

    /// Returns `true` if `<decoder> -version` runs and exits successfully.
    pub fn responds(&self) -> bool {
        self.command()
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Download locations for a static decoder build, per host OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUrls {
    /// Archive for Windows hosts.
    pub windows: String,
    /// Archive for Linux hosts.
    pub linux: String,
    /// Archive for macOS hosts.
    pub macos: String,
}

impl Default for DownloadUrls {
    fn default() -> Self {
        Self {
            windows: "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip"
                .to_string(),
            linux: "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-amd64-static.tar.xz"
                .to_string(),
            macos: "https://evermeet.cx/ffmpeg/ffmpeg.zip".to_string(),
        }
    }
}

impl DownloadUrls {
    /// URL for the given `std::env::consts::OS` value, if one is known.
    pub fn for_os(&self, os: &str) -> Option<&str> {
        match os {
            "windows" => Some(&self.windows),
            "linux" => Some(&self.linux),
            "macos" => Some(&self.macos),
            _ => None,
        }
    }
}

/// One way of obtaining a decoder executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderSource {
    /// `ffmpeg` (or `ffmpeg.exe`) inside the given directory.
    LocalCopy(PathBuf),
    /// An explicit executable path.
    UserSpecified(PathBuf),
    /// `ffmpeg` resolved through `PATH`.
    SystemInstalled,
    /// A static build downloaded and unpacked into `work_dir`.
    NetworkFetched {
        /// Per-OS archive URLs.
        urls: DownloadUrls,
        /// Directory receiving the download and its extracted contents.
        work_dir: PathBuf,
    },
}

impl Display for DecoderSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DecoderSource::LocalCopy(dir) => write!(f, "local copy in {}", dir.display()),
            DecoderSource::UserSpecified(path) => write!(f, "user path {}", path.display()),
            DecoderSource::SystemInstalled => write!(f, "system PATH"),
            DecoderSource::NetworkFetched { .. } => write!(f, "network download"),
        }
    }
}

impl DecoderSource {
    /// The usual search order.
    ///
    /// An explicit `user_path` wins, then a copy in the working directory,
    /// then `PATH`, and finally a download into the working directory.
    pub fn default_chain(user_path: Option<PathBuf>) -> Vec<DecoderSource> {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut sources = Vec::with_capacity(4);
        if let Some(path) = user_path {
            sources.push(DecoderSource::UserSpecified(path));
        }
        sources.push(DecoderSource::LocalCopy(cwd.clone()));
        sources.push(DecoderSource::SystemInstalled);
        sources.push(DecoderSource::NetworkFetched {
            urls: DownloadUrls::default(),
            work_dir: cwd,
        });
        sources
    }

    /// Try to obtain a decoder from this source.
    ///
    /// Returns `Ok(None)` when the source simply has nothing to offer, so
    /// the caller can move on to the next one.
    ///
    /// # Errors
    ///
    /// Only [`DecoderSource::NetworkFetched`] fails hard: with
    /// [`PackError::UnsupportedPlatform`] on an unknown host OS, or
    /// [`PackError::DecoderFetch`] when downloading or unpacking fails.
    pub fn locate(&self) -> Result<Option<Decoder>, PackError> {
        match self {
            DecoderSource::LocalCopy(dir) => {
                let candidate = dir.join(DECODER_BINARY);
                Ok(candidate.is_file().then(|| Decoder::new(candidate)))
            }
            DecoderSource::UserSpecified(path) => {
                Ok(path.is_file().then(|| Decoder::new(path.clone())))
            }
            DecoderSource::SystemInstalled => {
                let decoder = Decoder::new(DECODER_BINARY);
                Ok(decoder.responds().then_some(decoder))
            }
            DecoderSource::NetworkFetched { urls, work_dir } => {
                fetch_decoder(urls, work_dir, env::consts::OS).map(Some)
            }
        }
    }
}

/// Return the first decoder any of `sources` yields.
///
/// # Errors
///
/// Returns [`PackError::DecoderNotFound`] when every source comes up empty,
/// or the first hard error a source reports.
pub fn locate_decoder(sources: &[DecoderSource]) -> Result<Decoder, PackError> {
    for source in sources {
        log::debug!("Looking for ffmpeg: {source}");
        if let Some(decoder) = source.locate()? {
            log::info!("Using ffmpeg at {} ({source})", decoder.path().display());
            return Ok(decoder);
        }
    }

    let tried = sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(PackError::DecoderNotFound { tried })
}

/// Download, unpack and locate a static decoder build for `os`.
fn fetch_decoder(urls: &DownloadUrls, work_dir: &Path, os: &str) -> Result<Decoder, PackError> {
    let url = urls
        .for_os(os)
        .ok_or_else(|| PackError::UnsupportedPlatform(os.to_string()))?;

    let is_zip = url.ends_with(".zip");
    let archive = work_dir.join(if is_zip {
        "ffmpeg_download.zip"
    } else {
        "ffmpeg_download.tar.xz"
    });

    if !archive.is_file() {
        log::info!("Downloading ffmpeg from {url}");
        run_tool(
            Command::new("curl")
                .args(["--location", "--fail", "--silent", "--show-error", "--output"])
                .arg(&archive)
                .arg(url),
            "curl",
        )?;
    }

    let extract_dir = work_dir.join("ffmpeg");
    fs::create_dir_all(&extract_dir)?;
    if is_zip {
        extract_zip(&archive, &extract_dir)?;
    } else {
        run_tool(
            Command::new("tar")
                .arg("-xf")
                .arg(&archive)
                .arg("-C")
                .arg(&extract_dir),
            "tar",
        )?;
    }

    let binary = find_decoder_binary(&extract_dir)?.ok_or_else(|| {
        PackError::DecoderFetch(format!(
            "no {DECODER_BINARY} inside {}",
            archive.display()
        ))
    })?;
    mark_executable(&binary)?;
    Ok(Decoder::new(binary))
}

fn run_tool(command: &mut Command, name: &str) -> Result<(), PackError> {
    let status = command
        .stdin(Stdio::null())
        .status()
        .map_err(|e| PackError::DecoderFetch(format!("failed to run {name}: {e}")))?;
    if !status.success() {
        return Err(PackError::DecoderFetch(format!("{name} exited with {status}")));
    }
    Ok(())
}

/// Unpack every file entry of a zip archive below `dest`.
fn extract_zip(archive: &Path, dest: &Path) -> Result<(), PackError> {
    block_on(async {
        let file = async_fs::File::open(archive).await?;
        let mut zip = ZipFileReader::new(BufReader::new(file)).await?;
        let len = zip.file().entries().len();
        for index in 0..len {
            let mut reader = zip.reader_with_entry(index).await?;
            if reader.entry().dir()? {
                continue;
            }
            let name = String::from_utf8_lossy(reader.entry().filename().as_bytes()).into_owned();
            let Some(relative) = sanitize_entry_name(&name) else {
                log::warn!("Skipping suspicious archive entry {name:?}");
                continue;
            };
            let mut bytes = Vec::new();
            reader.read_to_end_checked(&mut bytes).await?;

            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                async_fs::create_dir_all(parent).await?;
            }
            async_fs::write(&target, &bytes).await?;
        }
        Ok::<(), PackError>(())
    })
}

/// Reject absolute entry names and any `..` component.
fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return None,
            _ if part.contains(':') => return None,
            _ => path.push(part),
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Find the decoder executable anywhere below `root`.
pub fn find_decoder_binary(root: &Path) -> Result<Option<PathBuf>, PackError> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == OsStr::new(DECODER_BINARY) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), PackError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), PackError> {
    Ok(())
}
