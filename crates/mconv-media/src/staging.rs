//! Temporary file staging.
//!
//! Every job gets its own input and output paths inside the configured temp
//! directory. Names combine a nanosecond timestamp with a random UUID, so two
//! jobs never share a path, even for identical uploads. Inputs are opened
//! with create-new semantics on top of that.
//!
//! A [`TempFile`] removes its file when dropped unless it was already
//! released, which covers early returns and panics in the job.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ConversionError, MediaResult};

const FILE_PREFIX: &str = "mconv";
const MAX_EXTENSION_LEN: usize = 16;
const FALLBACK_EXTENSION: &str = "bin";

/// What a temp file is used for within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempFileRole {
    Input,
    Output,
}

impl TempFileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempFileRole::Input => "in",
            TempFileRole::Output => "out",
        }
    }
}

/// A job-owned temporary path.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    role: TempFileRole,
    released: bool,
}

impl TempFile {
    fn new(path: PathBuf, role: TempFileRole) -> Self {
        Self {
            path,
            role,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> TempFileRole {
        self.role
    }

    /// Delete the file if it exists. A missing file is not an error.
    pub async fn release(mut self) -> MediaResult<()> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), role = self.role.as_str(), "Released temp file");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConversionError::CleanupFailure {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temp file on drop"),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove temp file on drop: {}", e),
        }
    }
}

/// Allocates, writes, reads and removes job temp files.
#[derive(Debug, Clone)]
pub struct TempFileStager {
    dir: PathBuf,
}

impl Default for TempFileStager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl TempFileStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn allocate_path(&self, role: TempFileRole, extension: &str) -> PathBuf {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let extension = sanitize_extension(extension).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let name = format!(
            "{}-{}-{}-{}.{}",
            FILE_PREFIX,
            role.as_str(),
            timestamp,
            Uuid::new_v4().simple(),
            extension
        );
        self.dir.join(name)
    }

    /// Write `bytes` to a fresh input file.
    pub async fn stage(&self, bytes: &[u8], extension: &str) -> MediaResult<TempFile> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(ConversionError::StagingFailure)?;

        let path = self.allocate_path(TempFileRole::Input, extension);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(ConversionError::StagingFailure)?;

        // Only take ownership once create_new succeeded; the guard must never
        // delete a file some other job created.
        let staged = TempFile::new(path, TempFileRole::Input);

        file.write_all(bytes)
            .await
            .map_err(ConversionError::StagingFailure)?;
        file.flush().await.map_err(ConversionError::StagingFailure)?;

        debug!(path = %staged.path().display(), bytes = bytes.len(), "Staged input file");
        Ok(staged)
    }

    /// Reserve an output path. The file itself is created by the encoder.
    pub fn allocate_output(&self, extension: &str) -> TempFile {
        TempFile::new(
            self.allocate_path(TempFileRole::Output, extension),
            TempFileRole::Output,
        )
    }

    /// Read a temp file fully into memory.
    pub async fn read(&self, file: &TempFile) -> std::io::Result<Vec<u8>> {
        fs::read(file.path()).await
    }

    /// Release a temp file. Same as [`TempFile::release`].
    pub async fn release(&self, file: TempFile) -> MediaResult<()> {
        file.release().await
    }
}

/// Lowercase ASCII alphanumerics of `ext`, capped in length.
///
/// Returns `None` when nothing usable remains.
pub(crate) fn sanitize_extension(ext: &str) -> Option<String> {
    let cleaned: String = ext
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
