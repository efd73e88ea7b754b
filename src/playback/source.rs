//! Sound sources and the temporary-file cache for streamed ones.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tempfile::TempPath;

use crate::error::PlayerError;

static DEFAULT_CACHE_DIR: Lazy<PathBuf> =
    Lazy::new(|| std::env::temp_dir().join("simple_audio_player"));

/// Where a sound comes from.
pub enum SoundSource {
    File(PathBuf),
    /// Copied into a temporary file before the backend acquires it
    Stream(Box<dyn Read + Send>),
}

impl SoundSource {
    pub fn stream<R: Read + Send + 'static>(reader: R) -> Self {
        SoundSource::Stream(Box::new(reader))
    }
}

impl fmt::Debug for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundSource::File(path) => f.debug_tuple("File").field(path).finish(),
            SoundSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for SoundSource {
    fn from(path: PathBuf) -> Self {
        SoundSource::File(path)
    }
}

impl From<&Path> for SoundSource {
    fn from(path: &Path) -> Self {
        SoundSource::File(path.to_path_buf())
    }
}

impl From<&str> for SoundSource {
    fn from(path: &str) -> Self {
        SoundSource::File(PathBuf::from(path))
    }
}

impl From<String> for SoundSource {
    fn from(path: String) -> Self {
        SoundSource::File(PathBuf::from(path))
    }
}

/// Owns at most one cached copy of a streamed source.
pub struct SourceCache {
    dir: PathBuf,
    current: Option<TempPath>,
}

impl SourceCache {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(|| DEFAULT_CACHE_DIR.clone()),
            current: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Copy `reader` into a fresh cache file, replacing the previous one.
    pub fn store(&mut self, reader: &mut dyn Read) -> Result<PathBuf, PlayerError> {
        self.discard();

        let cache_failed = |err: io::Error| PlayerError::CacheFailed {
            reason: format!("{}: {}", self.dir.display(), err),
        };

        fs::create_dir_all(&self.dir).map_err(cache_failed)?;
        let mut file = tempfile::Builder::new()
            .prefix("sap-")
            .suffix(".audio")
            .tempfile_in(&self.dir)
            .map_err(cache_failed)?;
        let bytes = io::copy(reader, &mut file).map_err(cache_failed)?;
        file.flush().map_err(cache_failed)?;

        let path = file.into_temp_path();
        let stored = path.to_path_buf();
        log::debug!("[SourceCache] Cached {} bytes at {}", bytes, stored.display());
        self.current = Some(path);
        Ok(stored)
    }

    /// Delete the cached file. Missing or locked files are only logged.
    pub fn discard(&mut self) {
        if let Some(path) = self.current.take() {
            let display = path.display().to_string();
            if let Err(err) = path.close() {
                log::warn!("[SourceCache] Could not delete {}: {}", display, err);
            }
        }
    }
}

impl Drop for SourceCache {
    fn drop(&mut self) {
        self.discard();
    }
}
