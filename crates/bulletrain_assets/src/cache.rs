//! # Archive Cache
//!
//! Two-level lookup: archive name → [`ArchiveEntry`] → resource name →
//! [`Resource`].
//!
//! ```text
//!   chain (sorted by SID, name)        per-archive table
//!   ┌──────────────┐                   bucket = sid % table_size
//!   │ gfx.tgz      │──► [0] ─► b.png
//!   │ music.tgz    │    [1]
//!   │ stage1.tgz   │    [2] ─► a.txt ─► boss.lua   (sorted by SID, name)
//!   └──────────────┘    ...
//! ```
//!
//! The chain sits behind a reader-writer lock that is held only for lookups
//! and registration, never across file I/O. A load runs on the caller's
//! thread; concurrent callers for the same archive wait on that archive's
//! condition variable.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bulletrain_core::NameKey;
use flate2::read::GzDecoder;
use parking_lot::RwLock;

use crate::archive::{
    ArchiveEntry, Claim, LoadGuard, Lookup, ResourceTable, DEFAULT_TABLE_SIZE,
};
use crate::error::{AssetError, AssetResult};
use crate::progress::{Progress, ProgressReporter};
use crate::resource::{Resource, ResourceType};

/// The archive cache.
///
/// Archive names are paths relative to the cache root, kept whole up to the
/// first control character. Resource names are entry paths inside the
/// archive, bounded to 15 bytes.
#[derive(Debug)]
pub struct ArchiveCache {
    root: PathBuf,
    table_size: usize,
    chain: RwLock<Vec<Arc<ArchiveEntry>>>,
    progress: ProgressReporter,
}

impl ArchiveCache {
    /// Creates an empty cache reading archives from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_table_size(root, DEFAULT_TABLE_SIZE)
    }

    /// Creates an empty cache with `table_size` buckets per archive.
    ///
    /// # Panics
    ///
    /// Panics if `table_size` is zero.
    #[must_use]
    pub fn with_table_size(root: impl Into<PathBuf>, table_size: usize) -> Self {
        assert!(table_size > 0, "Table size must be greater than zero");
        Self {
            root: root.into(),
            table_size,
            chain: RwLock::new(Vec::new()),
            progress: ProgressReporter::new(),
        }
    }

    /// Directory archives are read from.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loader's progress narration.
    #[inline]
    #[must_use]
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Snapshot of the loader's progress.
    #[must_use]
    pub fn get_progress(&self) -> Progress {
        self.progress.snapshot()
    }

    /// Resets the progress step counter.
    pub fn reset_progress(&self) {
        self.progress.reset();
    }

    /// Number of registered archives, loaded or not.
    #[must_use]
    pub fn archive_count(&self) -> usize {
        self.chain.read().len()
    }

    /// Every registered archive, in (SID, name) order.
    #[must_use]
    pub fn archives(&self) -> Vec<Arc<ArchiveEntry>> {
        self.chain.read().clone()
    }

    /// Looks an archive up without loading or waiting.
    #[must_use]
    pub fn find_arc(&self, name: &str) -> Option<Arc<ArchiveEntry>> {
        let key = NameKey::unbounded(name);
        let chain = self.chain.read();
        find_in(&chain, &key).map(|pos| Arc::clone(&chain[pos]))
    }

    /// Finds the archive or registers it in the `Loading` state.
    ///
    /// The boolean is true when the caller created the entry and so owns its
    /// first load.
    fn register(&self, key: &NameKey) -> (Arc<ArchiveEntry>, bool) {
        {
            let chain = self.chain.read();
            if let Some(pos) = find_in(&chain, key) {
                return (Arc::clone(&chain[pos]), false);
            }
        }

        let mut chain = self.chain.write();
        // Somebody may have registered it between the two locks
        match chain.binary_search_by(|other| other.key().cmp(key)) {
            Ok(pos) => (Arc::clone(&chain[pos]), false),
            Err(pos) => {
                let entry = Arc::new(ArchiveEntry::new_loading(key.clone(), self.table_size));
                chain.insert(pos, Arc::clone(&entry));
                (entry, true)
            }
        }
    }

    /// Loads an archive if it is not loaded yet.
    ///
    /// Idempotent: concurrent callers for the same name share one load, and
    /// a loaded archive is returned as is.
    ///
    /// # Errors
    ///
    /// [`AssetError::Open`] or [`AssetError::Read`] if this call performed
    /// the load and it failed. [`AssetError::LoadFailed`] if this call waited
    /// on another thread's load and that load failed.
    pub fn load_arc(&self, name: &str) -> AssetResult<Arc<ArchiveEntry>> {
        let key = NameKey::unbounded(name);
        let (entry, created) = self.register(&key);

        if !created && entry.claim_or_wait()? == Claim::Ready {
            return Ok(entry);
        }

        self.fill(&entry, |_| ())?;
        Ok(entry)
    }

    /// Reads a claimed entry's file and publishes the table, handing `pick`
    /// the table before anyone else can see or free it.
    fn fill<R>(
        &self,
        entry: &ArchiveEntry,
        pick: impl FnOnce(&ResourceTable) -> R,
    ) -> AssetResult<R> {
        let guard = LoadGuard::new(entry);
        match self.read_archive(entry) {
            Ok(table) => {
                let picked = pick(&table);
                guard.publish(table);
                tracing::debug!(archive = %entry.key(), resources = entry.resource_count(), "Archive loaded");
                Ok(picked)
            }
            Err(err) => {
                tracing::error!(archive = %entry.key(), error = %err, "Archive load failed");
                drop(guard);
                Err(err)
            }
        }
    }

    /// Returns a registered archive, waiting out any in-flight load.
    ///
    /// An archive that was never requested is loaded. A freed archive is
    /// returned freed; [`ArchiveCache::get_res`] reloads on demand.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveCache::load_arc`] when a load is triggered.
    pub fn get_arc(&self, name: &str) -> AssetResult<Arc<ArchiveEntry>> {
        match self.find_arc(name) {
            Some(entry) => {
                entry.wait_while_loading();
                Ok(entry)
            }
            None => {
                tracing::warn!(archive = name, "Archive requested before load, loading now");
                self.load_arc(name)
            }
        }
    }

    /// Looks up a resource, loading or reloading its archive as needed.
    ///
    /// Returns `Ok(None)` (and logs a warning) if the archive has no such
    /// resource.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveCache::load_arc`] when a load is triggered.
    pub fn get_res(&self, arc: &str, res: &str) -> AssetResult<Option<Arc<Resource>>> {
        let entry = self.get_arc(arc)?;
        let key = NameKey::new(res);

        let found = match entry.find_or_claim(&key)? {
            Lookup::Found(resource) => Some(resource),
            Lookup::Absent => None,
            Lookup::Claimed => {
                tracing::warn!(archive = %entry.key(), "Archive not loaded, reloading");
                self.fill(&entry, |table| table.find(&key).cloned())?
            }
        };
        if found.is_none() {
            tracing::warn!(archive = %entry.key(), resource = %key, "Resource not found");
        }
        Ok(found)
    }

    /// Drops every resource of an archive. The entry stays registered.
    ///
    /// Returns `false` if the archive is unknown or was not loaded.
    /// Resources already handed out stay valid.
    pub fn free_arc(&self, name: &str) -> bool {
        match self.find_arc(name) {
            Some(entry) => entry.free(),
            None => {
                tracing::warn!(archive = name, "Free of unknown archive ignored");
                false
            }
        }
    }

    /// Frees every archive and forgets them all.
    pub fn shutdown(&self) {
        let entries = std::mem::take(&mut *self.chain.write());
        let mut freed = 0usize;
        for entry in &entries {
            if entry.free() {
                freed += 1;
            }
        }
        self.progress.finish();
        tracing::debug!(archives = entries.len(), freed, "Archive cache shut down");
    }

    /// Reads and doctors every file of an archive into a fresh table.
    fn read_archive(&self, entry: &ArchiveEntry) -> AssetResult<ResourceTable> {
        let name = entry.name();
        let progress = &self.progress;
        progress.report(format_args!("Initializing archive {name}"));

        let path = self.root.join(name);
        progress.report(format_args!("Opening up archive {name}"));
        let file = File::open(&path).map_err(|source| AssetError::Open {
            archive: name.to_owned(),
            source,
        })?;

        let read_err = |source: io::Error| AssetError::Read {
            archive: name.to_owned(),
            source,
        };

        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        let mut table = ResourceTable::new(self.table_size);

        for item in archive.entries().map_err(read_err)? {
            let mut file = item.map_err(read_err)?;
            if !file.header().entry_type().is_file() {
                continue;
            }

            let raw_name = file.path().map_err(read_err)?.to_string_lossy().into_owned();
            progress.report(format_args!("Reading in archive entry {raw_name}"));

            let key = NameKey::new(&raw_name);
            let kind = ResourceType::from_name(key.name());
            progress.report(format_args!("Mapping resource {key}"));

            let mut raw = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut raw).map_err(read_err)?;

            progress.report(format_args!("Loading resource {key} into memory"));
            tracing::trace!(
                archive = %entry.key(),
                resource = %key,
                sid = key.sid(),
                bucket = key.sid() as usize % self.table_size,
                size = raw.len(),
                "Resource mapped"
            );

            let resource = Arc::new(Resource::doctor(key, kind, raw));
            if let Some(old) = table.insert(resource) {
                tracing::warn!(
                    archive = %entry.key(),
                    resource = %old.key(),
                    "Duplicate resource name, later entry kept"
                );
            }
        }

        progress.report(format_args!("Cleaning up internal copy of {name}"));
        progress.finish();
        Ok(table)
    }
}

fn find_in(chain: &[Arc<ArchiveEntry>], key: &NameKey) -> Option<usize> {
    chain.binary_search_by(|other| other.key().cmp(key)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_archive_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArchiveCache::new(dir.path());

        let err = cache.load_arc("nope.tgz").unwrap_err();
        assert!(matches!(err, AssetError::Open { .. }));

        // The entry stays registered and can be retried
        assert_eq!(cache.archive_count(), 1);
        let entry = cache.find_arc("nope.tgz").unwrap();
        assert_eq!(entry.state(), crate::archive::ArchiveState::Failed);
        assert!(cache.load_arc("nope.tgz").is_err());
    }

    #[test]
    fn test_garbage_archive_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("junk.tgz"), b"definitely not gzip").unwrap();
        let cache = ArchiveCache::new(dir.path());

        let err = cache.load_arc("junk.tgz").unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }

    #[test]
    fn test_free_unknown_archive() {
        let cache = ArchiveCache::new(".");
        assert!(!cache.free_arc("never.tgz"));
    }
}
