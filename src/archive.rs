//! Zip packaging of an assembled datapack.
//!
//! The archive holds the *contents* of the package directory: entry names
//! are relative to the package root and use `/` separators, so `pack.mcmeta`
//! sits at the top level of the zip as the engine expects. Entries are
//! written in sorted order, which keeps the archive layout reproducible.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_zip::base::read::seek::ZipFileReader;
use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures_lite::future::block_on;
use futures_lite::io::{BufReader, Cursor};
use walkdir::WalkDir;

use crate::error::PackError;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};
use crate::utilities::remove_file_if_exists;

/// `<output_root>/<namespace>.zip`.
pub fn archive_path(output_root: &Path, namespace: &str) -> PathBuf {
    output_root.join(format!("{namespace}.zip"))
}

/// The zip entry name of `path` relative to `root`, `/`-separated.
///
/// Returns `None` if `path` is not below `root` or is `root` itself.
pub fn archive_entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Result of writing an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Number of file entries.
    pub entries: usize,
    /// Archive size in bytes.
    pub bytes: u64,
}

/// Compresses a package directory into a single zip file.
pub struct ArchiveWriter {
    progress: Arc<dyn ProgressCallback>,
    batch_size: u64,
}

impl Debug for ArchiveWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ArchiveWriter")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    /// Create a writer without progress reporting.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Report one [`OperationType::Archiving`] step per `batch_size` entries.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>, batch_size: u64) -> Self {
        self.progress = callback;
        self.batch_size = batch_size.max(1);
        self
    }

    /// Zip every file below `package_root` into `archive_path`.
    ///
    /// An existing file at `archive_path` is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::WalkError`] or [`PackError::IoError`] if the
    /// tree cannot be read or the archive written, and
    /// [`PackError::ArchiveError`] if compression fails.
    pub fn write(&self, package_root: &Path, archive_path: &Path) -> Result<ArchiveSummary, PackError> {
        remove_file_if_exists(archive_path)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(package_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = archive_entry_name(package_root, entry.path()) {
                files.push((name, entry.into_path()));
            }
        }

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::Archiving,
            Some(files.len() as u64),
            self.batch_size,
        );

        let bytes = block_on(async {
            let mut writer = ZipFileWriter::new(Cursor::new(Vec::new()));
            for (name, path) in &files {
                let data = fs::read(path)?;
                let entry = ZipEntryBuilder::new(name.clone().into(), Compression::Deflate);
                writer.write_entry_whole(entry, &data).await?;
                tracker.advance(None);
            }
            let cursor = writer.close().await?;
            Ok::<Vec<u8>, PackError>(cursor.into_inner())
        })?;
        tracker.finish();

        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(archive_path, &bytes)?;

        log::info!(
            "Wrote {} ({} entries, {} bytes)",
            archive_path.display(),
            files.len(),
            bytes.len()
        );

        Ok(ArchiveSummary {
            path: archive_path.to_path_buf(),
            entries: files.len(),
            bytes: bytes.len() as u64,
        })
    }
}

/// Zip `package_root` into `archive_path` without progress reporting.
///
/// # Errors
///
/// See [`ArchiveWriter::write`].
pub fn write_archive(package_root: &Path, archive_path: &Path) -> Result<ArchiveSummary, PackError> {
    ArchiveWriter::new().write(package_root, archive_path)
}

/// Read every file entry of a zip archive as `(name, contents)` pairs, in
/// archive order.
///
/// # Errors
///
/// Returns [`PackError::IoError`] if the file cannot be opened and
/// [`PackError::ArchiveError`] if it is not a valid zip.
pub fn read_archive_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>, PackError> {
    block_on(async {
        let file = async_fs::File::open(path).await?;
        let mut zip = ZipFileReader::new(BufReader::new(file)).await?;
        let len = zip.file().entries().len();
        let mut entries = Vec::with_capacity(len);
        for index in 0..len {
            let mut reader = zip.reader_with_entry(index).await?;
            if reader.entry().dir()? {
                continue;
            }
            let name = String::from_utf8_lossy(reader.entry().filename().as_bytes()).into_owned();
            let mut bytes = Vec::new();
            reader.read_to_end_checked(&mut bytes).await?;
            entries.push((name, bytes));
        }
        Ok::<_, PackError>(entries)
    })
}
