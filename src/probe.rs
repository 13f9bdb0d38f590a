//! Source resolution probing.
//!
//! [`ResolutionProber`] runs `ffmpeg -i <video>` without an output file.
//! FFmpeg prints the stream descriptions to stderr and exits with an error
//! ("at least one output file must be specified"), which is expected: only
//! the text matters. The first `Video:` line's `<width>x<height>` token is
//! taken as the source resolution.
//!
//! Probing is best effort. [`ResolutionProber::probe`] never fails; it logs
//! a warning and substitutes [`Resolution::FALLBACK`] instead. Use
//! [`ResolutionProber::try_probe`] to see the underlying error.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::decoder::Decoder;
use crate::error::PackError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Resolution assumed whenever the real one cannot be determined.
    pub const FALLBACK: Resolution = Resolution::new(1920, 1080);

    /// Create a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of a best-effort probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// The resolution to use.
    pub resolution: Resolution,
    /// `true` if `resolution` is the fallback rather than a measured value.
    pub used_fallback: bool,
}

/// Parse a single `<digits>x<digits>` token.
///
/// Both halves must be non-empty, purely decimal and non-zero, and the
/// token must contain exactly one `x`.
pub fn parse_resolution_token(token: &str) -> Option<Resolution> {
    let (width, height) = token.split_once('x')?;
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_number(width) || !is_number(height) {
        return None;
    }
    let resolution = Resolution::new(width.parse().ok()?, height.parse().ok()?);
    (!resolution.is_degenerate()).then_some(resolution)
}

/// Find the first video stream resolution in decoder diagnostic output.
///
/// Only lines mentioning `Video:` are considered. Later video streams are
/// ignored.
pub fn parse_probe_output(text: &str) -> Option<Resolution> {
    text.lines()
        .filter(|line| line.contains("Video:"))
        .find_map(|line| {
            line.split(|c: char| c.is_whitespace() || c == ',')
                .find_map(parse_resolution_token)
        })
}

/// Runs the decoder in introspection mode and reads the stream resolution.
#[derive(Debug, Clone)]
pub struct ResolutionProber<'a> {
    decoder: &'a Decoder,
    timeout: Duration,
    fallback: Resolution,
}

impl<'a> ResolutionProber<'a> {
    /// Create a prober with a 10 second budget and the 1920x1080 fallback.
    pub fn new(decoder: &'a Decoder) -> Self {
        Self {
            decoder,
            timeout: Duration::from_secs(10),
            fallback: Resolution::FALLBACK,
        }
    }

    /// Set the time budget for the decoder call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the resolution substituted on failure.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Resolution) -> Self {
        self.fallback = fallback;
        self
    }

    /// Probe `video`, substituting the fallback on any failure.
    pub fn probe<P: AsRef<Path>>(&self, video: P) -> ProbeOutcome {
        match self.try_probe(video.as_ref()) {
            Ok(resolution) => ProbeOutcome {
                resolution,
                used_fallback: false,
            },
            Err(error) => {
                log::warn!(
                    "Could not determine the resolution of {} ({error}); assuming {}. \
                     The aspect ratio of the output may be wrong.",
                    video.as_ref().display(),
                    self.fallback,
                );
                ProbeOutcome {
                    resolution: self.fallback,
                    used_fallback: true,
                }
            }
        }
    }

    /// Probe `video` and report why it failed, if it did.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::DecoderLaunch`] if the decoder cannot be
    /// started, [`PackError::ProbeTimeout`] if it runs past the budget (the
    /// process is killed), or [`PackError::ResolutionNotFound`] if its
    /// output contains no video resolution.
    pub fn try_probe<P: AsRef<Path>>(&self, video: P) -> Result<Resolution, PackError> {
        let text = self.run_introspection(video.as_ref())?;
        let resolution = parse_probe_output(&text).ok_or(PackError::ResolutionNotFound)?;
        log::debug!(
            "Probed {} at {resolution}",
            video.as_ref().display()
        );
        Ok(resolution)
    }

    fn run_introspection(&self, video: &Path) -> Result<String, PackError> {
        let mut child = self
            .decoder
            .command()
            .arg("-hide_banner")
            .arg("-i")
            .arg(video)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PackError::DecoderLaunch {
                program: self.decoder.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        // Drain stderr on its own thread so a chatty decoder cannot block on
        // a full pipe while we wait for it.
        let mut stderr = child.stderr.take();
        let reader = thread::spawn(move || {
            let mut text = String::new();
            if let Some(stderr) = stderr.as_mut() {
                let mut bytes = Vec::new();
                let _ = stderr.read_to_end(&mut bytes);
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
            text
        });

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {}
                Err(error) => {
                    stop_child(&mut child, reader);
                    return Err(error.into());
                }
            }
            if started.elapsed() >= self.timeout {
                stop_child(&mut child, reader);
                return Err(PackError::ProbeTimeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }

        Ok(reader.join().unwrap_or_default())
    }
}

/// Kill `child`, reap it, and wait for its stderr reader to finish.
fn stop_child(child: &mut Child, reader: JoinHandle<String>) {
    let _ = child.kill();
    let _ = child.wait();
    let _ = reader.join();
}
