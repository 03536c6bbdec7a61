//! Storage manager: the two stores and crop lifecycle operations.
//!
//! Owns a source disk (originals, authoritative) and a crops disk
//! (generated variants, disposable). Both are [`Disk`] trait objects, so
//! local directories and remote object stores are interchangeable; the one
//! behavioral difference callers may care about is surfaced as
//! [`Storage::crops_are_remote`].
//!
//! ## Crops as a cache
//!
//! There is deliberately no in-memory index of crops. Every question —
//! does this source exist, does this crop exist, how many crops does this
//! source have — is answered by the stores at call time. Crop enumeration
//! reconstructs membership purely from path text via the shared crop
//! grammar, which is why the grammar's round-trip stability matters.
//!
//! ## The idempotent-write contract
//!
//! [`Storage::write_crop`] swallows [`StoreError::AlreadyExists`]: when two
//! requests race to generate the same crop, both render, one write wins,
//! and the loser's outcome (file present with correct content) is
//! indistinguishable from victory. This is the system's only stampede
//! defense — redundant rendering is accepted in exchange for having no
//! locks. Source deletion is the opposite: deleting a source that is
//! already gone is a real error and propagates.

use crate::config::Config;
use crate::store::{Disk, LocalDisk, StoreError};
use crate::url;
use regex::RegexBuilder;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StorageError {
    /// The purge filter is not a valid regex.
    #[error("invalid purge filter: {0}")]
    InvalidFilter(#[from] regex::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Storage {
    src: Box<dyn Disk>,
    crops: Box<dyn Disk>,
    max_crops: Option<usize>,
}

impl Storage {
    /// Mount both stores as local directories per the config.
    pub fn from_config(config: &Config) -> Self {
        Self::with_disks(
            Box::new(LocalDisk::new(&config.src_dir)),
            Box::new(LocalDisk::new(&config.crops_dir)),
            config.max_crops,
        )
    }

    /// Mount arbitrary backends (remote object stores, test doubles).
    pub fn with_disks(src: Box<dyn Disk>, crops: Box<dyn Disk>, max_crops: Option<usize>) -> Self {
        Self {
            src,
            crops,
            max_crops,
        }
    }

    /// Whether crops live off the local filesystem. A remote crops store
    /// means the web server can never serve crop files directly, so
    /// callers skip that optimization.
    pub fn crops_are_remote(&self) -> bool {
        !self.crops.is_local()
    }

    pub fn src_exists(&self, path: &str) -> Result<bool, StoreError> {
        self.src.has(path)
    }

    /// Read source bytes. A missing source surfaces as
    /// [`StoreError::NotFound`] carrying the source path.
    pub fn read_src(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.src.read(path)
    }

    /// Delete a source image. Missing sources are a hard error — callers
    /// asked to remove something they believe exists.
    pub fn delete_src(&self, path: &str) -> Result<(), StoreError> {
        self.src.delete(path)
    }

    pub fn crop_exists(&self, path: &str) -> Result<bool, StoreError> {
        self.crops.has(path)
    }

    pub fn read_crop(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.crops.read(path)
    }

    /// Write crop bytes, treating a lost creation race as success.
    pub fn write_crop(&self, path: &str, contents: &[u8]) -> Result<(), StoreError> {
        match self.crops.write(path, contents) {
            Ok(()) => {
                debug!(path, bytes = contents.len(), "crop written");
                Ok(())
            }
            // Concurrent first-requests for the same crop: the file exists
            // with correct content, which is the outcome we wanted.
            Err(StoreError::AlreadyExists(_)) => {
                debug!(path, "crop already written by a concurrent request");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// All crops generated for a source, in the crops store's listing
    /// order. An entry qualifies when it sits in the source's directory,
    /// is not the bare source filename, starts with the source's stem, and
    /// matches the crop grammar.
    pub fn list_crops(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let (dir, filename) = path.rsplit_once('/').unwrap_or(("", path));
        let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);

        let crops = self
            .crops
            .list(dir, false)?
            .into_iter()
            .filter(|entry| {
                let basename = entry.rsplit('/').next().unwrap_or(entry);
                basename != filename && basename.starts_with(stem) && url::is_crop(entry)
            })
            .collect();
        Ok(crops)
    }

    /// Delete every crop of a source; returns what was deleted for caller
    /// reporting.
    pub fn delete_crops(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let crops = self.list_crops(path)?;
        for crop in &crops {
            self.crops.delete(crop)?;
        }
        info!(source = path, deleted = crops.len(), "crops deleted");
        Ok(crops)
    }

    /// Every crop in the crops store whose source still exists, optionally
    /// narrowed by a case-insensitive regex over the full crop path.
    ///
    /// Entries that match the grammar but whose reconstructed source is
    /// gone are orphans and are excluded — purge only reports crops it can
    /// attribute to a live source.
    pub fn list_all_crops(&self, filter: Option<&str>) -> Result<Vec<String>, StorageError> {
        let filter = filter
            .map(|f| RegexBuilder::new(f).case_insensitive(true).build())
            .transpose()?;

        let mut crops = Vec::new();
        for entry in self.crops.list("", true)? {
            if let Some(filter) = &filter
                && !filter.is_match(&entry)
            {
                continue;
            }
            let Ok(decoded) = url::decode(&entry) else {
                continue;
            };
            if self.src.has(&decoded.source_path())? {
                crops.push(entry);
            }
        }
        Ok(crops)
    }

    /// Bulk purge. With `dry_run`, reports what would go without touching
    /// the store.
    pub fn delete_all_crops(
        &self,
        filter: Option<&str>,
        dry_run: bool,
    ) -> Result<Vec<String>, StorageError> {
        let crops = self.list_all_crops(filter)?;
        if !dry_run {
            for crop in &crops {
                self.crops.delete(crop).map_err(StorageError::Store)?;
            }
        }
        info!(
            count = crops.len(),
            dry_run,
            filter = filter.unwrap_or(""),
            "purge complete"
        );
        Ok(crops)
    }

    /// Whether a source has reached the configured crop cap. With no cap
    /// configured, never.
    pub fn too_many_crops(&self, path: &str) -> Result<bool, StoreError> {
        let Some(max) = self.max_crops else {
            return Ok(false);
        };
        Ok(self.list_crops(path)?.len() >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDisk;

    fn storage(max_crops: Option<usize>) -> Storage {
        Storage::with_disks(
            Box::new(MemoryDisk::new()),
            Box::new(MemoryDisk::new()),
            max_crops,
        )
    }

    fn seed_src(storage: &Storage, path: &str) {
        storage.src.write(path, b"src").unwrap();
    }

    fn seed_crop(storage: &Storage, path: &str) {
        storage.crops.write(path, b"crop").unwrap();
    }

    // =========================================================================
    // Sources
    // =========================================================================

    #[test]
    fn read_src_miss_is_not_found() {
        let s = storage(None);
        assert!(matches!(
            s.read_src("ghost.jpg").unwrap_err(),
            StoreError::NotFound(p) if p == "ghost.jpg"
        ));
    }

    #[test]
    fn delete_src_on_missing_is_a_hard_error() {
        let s = storage(None);
        assert!(matches!(
            s.delete_src("ghost.jpg").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    // =========================================================================
    // Crop writes
    // =========================================================================

    #[test]
    fn write_crop_is_idempotent() {
        let s = storage(None);
        s.write_crop("img-10x10.jpg", b"bytes").unwrap();
        // the race loser succeeds silently
        s.write_crop("img-10x10.jpg", b"bytes").unwrap();
        assert_eq!(s.read_crop("img-10x10.jpg").unwrap(), b"bytes");
        assert_eq!(s.crops.list("", true).unwrap().len(), 1);
    }

    // =========================================================================
    // Listing crops of one source
    // =========================================================================

    #[test]
    fn list_crops_keeps_only_grammar_matched_variants() {
        let s = storage(None);
        seed_crop(&s, "img-100x100.jpg");
        seed_crop(&s, "img-200x.jpg");
        seed_crop(&s, "img2.jpg");
        seed_crop(&s, "img.jpg");

        assert_eq!(
            s.list_crops("img.jpg").unwrap(),
            vec!["img-100x100.jpg", "img-200x.jpg"]
        );
    }

    #[test]
    fn list_crops_is_scoped_to_the_source_directory() {
        let s = storage(None);
        seed_crop(&s, "a/img-100x100.jpg");
        seed_crop(&s, "b/img-100x100.jpg");

        assert_eq!(s.list_crops("a/img.jpg").unwrap(), vec!["a/img-100x100.jpg"]);
    }

    #[test]
    fn list_crops_ignores_other_sources() {
        let s = storage(None);
        seed_crop(&s, "other-100x100.jpg");
        assert!(s.list_crops("img.jpg").unwrap().is_empty());
    }

    #[test]
    fn delete_crops_returns_what_it_deleted() {
        let s = storage(None);
        seed_crop(&s, "img-100x100.jpg");
        seed_crop(&s, "img-50x50.jpg");
        seed_crop(&s, "img.jpg");

        let deleted = s.delete_crops("img.jpg").unwrap();
        assert_eq!(deleted, vec!["img-100x100.jpg", "img-50x50.jpg"]);
        assert!(s.crops.has("img.jpg").unwrap());
        assert!(!s.crops.has("img-100x100.jpg").unwrap());
    }

    // =========================================================================
    // Crop cap
    // =========================================================================

    #[test]
    fn too_many_crops_without_cap_is_never_true() {
        let s = storage(None);
        seed_crop(&s, "img-1x1.jpg");
        seed_crop(&s, "img-2x2.jpg");
        assert!(!s.too_many_crops("img.jpg").unwrap());
    }

    #[test]
    fn too_many_crops_at_the_cap() {
        let s = storage(Some(2));
        seed_crop(&s, "img-1x1.jpg");
        assert!(!s.too_many_crops("img.jpg").unwrap());
        seed_crop(&s, "img-2x2.jpg");
        assert!(s.too_many_crops("img.jpg").unwrap());
    }

    // =========================================================================
    // Purge
    // =========================================================================

    #[test]
    fn list_all_crops_excludes_orphans() {
        let s = storage(None);
        seed_src(&s, "img.jpg");
        seed_crop(&s, "img-50x50.jpg");
        // old.jpg has been deleted out from under its crop
        seed_crop(&s, "old-50x50.jpg");

        assert_eq!(s.list_all_crops(None).unwrap(), vec!["img-50x50.jpg"]);
    }

    #[test]
    fn list_all_crops_skips_plain_files() {
        let s = storage(None);
        seed_src(&s, "img.jpg");
        seed_crop(&s, "img.jpg");
        seed_crop(&s, "img-50x50.jpg");

        assert_eq!(s.list_all_crops(None).unwrap(), vec!["img-50x50.jpg"]);
    }

    #[test]
    fn list_all_crops_filter_is_case_insensitive() {
        let s = storage(None);
        seed_src(&s, "Team/Jane.jpg");
        seed_crop(&s, "Team/Jane-100x100.jpg");
        seed_src(&s, "img.jpg");
        seed_crop(&s, "img-50x50.jpg");

        assert_eq!(
            s.list_all_crops(Some("team")).unwrap(),
            vec!["Team/Jane-100x100.jpg"]
        );
    }

    #[test]
    fn list_all_crops_rejects_bad_filter() {
        let s = storage(None);
        assert!(matches!(
            s.list_all_crops(Some("[unclosed")).unwrap_err(),
            StorageError::InvalidFilter(_)
        ));
    }

    #[test]
    fn purge_dry_run_deletes_nothing() {
        let s = storage(None);
        seed_src(&s, "img.jpg");
        seed_crop(&s, "img-100x100.jpg");
        seed_crop(&s, "img-50x50.jpg");

        let would = s.delete_all_crops(Some("100x"), true).unwrap();
        assert_eq!(would, vec!["img-100x100.jpg"]);
        assert!(s.crops.has("img-100x100.jpg").unwrap());
        assert!(s.crops.has("img-50x50.jpg").unwrap());
    }

    #[test]
    fn purge_deletes_exactly_the_filtered_set() {
        let s = storage(None);
        seed_src(&s, "img.jpg");
        seed_crop(&s, "img-100x100.jpg");
        seed_crop(&s, "img-50x50.jpg");

        let deleted = s.delete_all_crops(Some("100x"), false).unwrap();
        assert_eq!(deleted, vec!["img-100x100.jpg"]);
        assert!(!s.crops.has("img-100x100.jpg").unwrap());
        assert!(s.crops.has("img-50x50.jpg").unwrap());
    }

    #[test]
    fn purge_without_filter_takes_everything_with_a_live_source() {
        let s = storage(None);
        seed_src(&s, "a.jpg");
        seed_src(&s, "b.png");
        seed_crop(&s, "a-10x10.jpg");
        seed_crop(&s, "b-20x.png");
        seed_crop(&s, "orphan-5x5.gif");

        let deleted = s.delete_all_crops(None, false).unwrap();
        assert_eq!(deleted, vec!["a-10x10.jpg", "b-20x.png"]);
        // the orphan is left alone
        assert!(s.crops.has("orphan-5x5.gif").unwrap());
    }

    // =========================================================================
    // Backend selection
    // =========================================================================

    #[test]
    fn memory_backed_crops_read_as_remote() {
        assert!(storage(None).crops_are_remote());
    }

    #[test]
    fn local_crops_read_as_local() {
        let tmp = tempfile::TempDir::new().unwrap();
        let s = Storage::with_disks(
            Box::new(MemoryDisk::new()),
            Box::new(crate::store::LocalDisk::new(tmp.path())),
            None,
        );
        assert!(!s.crops_are_remote());
    }
}
