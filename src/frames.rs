//! The ordered set of extracted frame images.
//!
//! A [`FrameSequence`] is built by scanning the extraction directory for
//! `<namespace>_<number>.png` files and sorting them by decoder number.
//! Positions in the sorted list are the frame indices used everywhere
//! downstream (0-based), independent of the decoder's own numbering
//! (1-based).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PackError;
use crate::extract::FRAME_EXTENSION;

/// One extracted frame image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Zero-based position in the sequence.
    pub index: usize,
    /// Location of the image on disk.
    pub path: PathBuf,
    /// Number the decoder embedded in the file name, if it had one.
    pub decoder_number: Option<u64>,
}

impl Frame {
    /// The image's file name, as referenced from frame functions.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Frames in playback order, indexed `0..len()` without gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Build a sequence from image paths, ordered by decoder number with the
    /// file name as tiebreak.
    ///
    /// Numeric ordering keeps the sequence correct once the decoder's counter
    /// outgrows its zero padding (`_1000000` after `_999999`).
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let mut numbered: Vec<(Option<u64>, PathBuf)> = paths
            .into_iter()
            .map(|path| {
                let number = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(decoder_number);
                (number, path)
            })
            .collect();
        numbered.sort_by(|(a_number, a_path), (b_number, b_path)| {
            a_number
                .cmp(b_number)
                .then_with(|| a_path.file_name().cmp(&b_path.file_name()))
        });

        let frames = numbered
            .into_iter()
            .enumerate()
            .map(|(index, (decoder_number, path))| Frame {
                index,
                path,
                decoder_number,
            })
            .collect();
        Self { frames }
    }

    /// Collect every `<namespace>_*.png` file in `dir`.
    ///
    /// Gaps in the decoder numbering are reported as warnings; the sequence
    /// itself is always contiguous.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::IoError`] if the directory cannot be read.
    pub fn scan(dir: &Path, namespace: &str) -> Result<Self, PackError> {
        let prefix = format!("{namespace}_");
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION));
            if matches {
                paths.push(path);
            }
        }

        let sequence = Self::from_paths(paths);
        if let Some((expected, found)) = sequence.first_numbering_gap() {
            log::warn!("Frame numbering is not contiguous: expected {expected}, found {found}");
        }
        log::debug!("Found {} frame(s) in {}", sequence.len(), dir.display());
        Ok(sequence)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Iterate over frames in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// The first `(expected, found)` decoder number that breaks the
    /// contiguous run starting at 1.
    pub fn first_numbering_gap(&self) -> Option<(u64, u64)> {
        self.frames
            .iter()
            .filter_map(|frame| frame.decoder_number.map(|n| (frame.index as u64 + 1, n)))
            .find(|(expected, found)| expected != found)
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

fn decoder_number(stem: &str) -> Option<u64> {
    let (_, digits) = stem.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
