//! Temp file tracking with guaranteed cleanup
//!
//! Every file created while serving one request, one job, or one session
//! chunk is wrapped in a `TempGuard` whose Drop removes it from disk. The
//! guard is the single owner of the path; handing a file to another unit of
//! work (e.g. a staged upload becoming a queued job's input) goes through
//! `into_path`, which disarms the guard so exactly one owner cleans up.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Creates uniquely-named temp files under a single directory.
#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    /// Create the store, making the directory if it doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create temp directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a unique path under the store directory without creating the file.
    pub fn unique_path(&self, label: &str, ext: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", label, uuid::Uuid::new_v4(), ext))
    }

    /// Write `bytes` to a fresh file and return its owning guard.
    pub fn stage(&self, label: &str, ext: &str, bytes: &[u8]) -> std::io::Result<TempGuard> {
        let path = self.unique_path(label, ext);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Staged temp file");
        Ok(TempGuard::adopt(path))
    }
}

/// Owns one temp file; removes it on drop unless ownership was transferred.
///
/// Removal is best-effort: a missing file is not an error (the path may have
/// been released already), and a failed removal is logged but never surfaced,
/// so cleanup can't mask the error that unwound the scope.
#[derive(Debug)]
pub struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    /// Take ownership of an existing path.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transfer ownership of the file to the caller; this guard will no
    /// longer remove it.
    pub fn into_path(mut self) -> PathBuf {
        self.armed = false;
        self.path.clone()
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove temp file"),
        }
    }
}
