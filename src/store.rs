//! Backing-store capability trait and its implementations.
//!
//! A [`Disk`] is the minimal surface the storage manager needs: existence
//! check, whole-file read/write/delete, and a stable-order listing. Paths
//! are always store-relative with `/` separators, never absolute.
//!
//! Two implementations ship:
//!
//! - [`LocalDisk`] — a directory on the local filesystem. `write` uses
//!   `create_new`, so when two requests race to create the same crop the
//!   loser observes [`StoreError::AlreadyExists`] instead of clobbering the
//!   winner's file. That atomicity is the only synchronization the crop
//!   cache relies on.
//! - [`MemoryDisk`] — an in-memory map that reports itself as non-local,
//!   standing in for a remote object store. Used heavily in tests and as
//!   the reference for writing further adapters.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("path not found in store: {0}")]
    NotFound(String),
    #[error("path already exists in store: {0}")]
    AlreadyExists(String),
    /// Any other I/O failure. Propagated, never retried at this layer.
    #[error("store unavailable: {0}")]
    Io(#[from] io::Error),
}

/// Minimal capability contract for a backing store.
pub trait Disk: Send + Sync {
    fn has(&self, path: &str) -> Result<bool, StoreError>;

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Create a new file. Fails with [`StoreError::AlreadyExists`] if the
    /// path is taken — callers decide whether that is an error.
    fn write(&self, path: &str, contents: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// List files under `dir` (`""` for the store root), non-recursively or
    /// recursively. Returned paths are store-relative, include the `dir`
    /// prefix, and come in a stable order for a given store state.
    fn list(&self, dir: &str, recursive: bool) -> Result<Vec<String>, StoreError>;

    /// Whether files live on the local filesystem, where the web server
    /// could serve them directly.
    fn is_local(&self) -> bool {
        false
    }
}

/// A store rooted at a local directory.
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a store-relative path, refusing anything that could escape
    /// the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes the store root: {path}"),
            )));
        }
        Ok(self.root.join(path))
    }
}

impl Disk for LocalDisk {
    fn has(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(path)?.is_file())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn write(&self, path: &str, contents: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
                _ => StoreError::Io(e),
            })?;
        file.write_all(contents)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn list(&self, dir: &str, recursive: bool) -> Result<Vec<String>, StoreError> {
        let base = self.resolve(dir)?;
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = if recursive {
            walkdir::WalkDir::new(&base)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| relative_path(&self.root, entry.path()))
                .collect::<Vec<_>>()
        } else {
            fs::read_dir(&base)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .filter_map(|entry| relative_path(&self.root, &entry.path()))
                .collect()
        };
        paths.sort();
        Ok(paths)
    }

    fn is_local(&self) -> bool {
        true
    }
}

/// Express `path` relative to `root` using `/` separators.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// An in-memory store. Reports itself as remote (`is_local() == false`);
/// the ordered map keeps listings stable.
#[derive(Default)]
pub struct MemoryDisk {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Disk for MemoryDisk {
    fn has(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, contents: &[u8]) -> Result<(), StoreError> {
        let mut files = self.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn list(&self, dir: &str, recursive: bool) -> Result<Vec<String>, StoreError> {
        let files = self.files.lock().unwrap();
        let keys = files
            .keys()
            .filter(|key| {
                let rest = if dir.is_empty() {
                    key.as_str()
                } else {
                    match key.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
                        Some(rest) => rest,
                        None => return false,
                    }
                };
                recursive || !rest.contains('/')
            })
            .cloned()
            .collect();
        Ok(keys)
    }
}
