//! # Archive Entries
//!
//! One entry per archive ever requested. The entry outlives its data:
//! freeing an archive empties its table but keeps the entry registered so it
//! can be reloaded.
//!
//! ## State machine
//!
//! ```text
//!             ┌──────── free ────────┐
//!             ▼                      │
//!  (new) ─► Loading ─► Loaded ───────┘
//!             │  ▲
//!             ▼  │ retry
//!            Failed        Freed ─► Loading (reload)
//! ```
//!
//! Only the thread that moved an entry into `Loading` fills it. Everyone else
//! waits on the entry's condition variable until the state changes.

use std::sync::Arc;

use bulletrain_core::{NameKey, Sid};
use parking_lot::{Condvar, Mutex};

use crate::error::{AssetError, AssetResult};
use crate::resource::Resource;

/// Default number of buckets per archive.
pub const DEFAULT_TABLE_SIZE: usize = 1024;

/// Load state of an archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveState {
    /// A thread is reading the archive.
    Loading,
    /// Every resource is available.
    Loaded,
    /// Resources were dropped; the entry can be reloaded.
    Freed,
    /// The last load attempt failed; the entry can be reloaded.
    Failed,
}

/// Fixed-size hash table of resources.
///
/// Bucket = `sid % size`. Each bucket is kept sorted by (SID, name), so a
/// lookup is a binary search and colliding SIDs are told apart by name.
#[derive(Debug)]
pub struct ResourceTable {
    buckets: Box<[Vec<Arc<Resource>>]>,
    len: usize,
}

impl ResourceTable {
    /// Creates an empty table with `size` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "Table size must be greater than zero");
        Self {
            buckets: (0..size).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn bucket_of(&self, sid: Sid) -> usize {
        sid as usize % self.buckets.len()
    }

    /// Inserts a resource in (SID, name) order.
    ///
    /// A resource with the same key is replaced and returned.
    pub fn insert(&mut self, resource: Arc<Resource>) -> Option<Arc<Resource>> {
        let slot = self.bucket_of(resource.sid());
        let bucket = &mut self.buckets[slot];
        match bucket.binary_search_by(|other| other.key().cmp(resource.key())) {
            Ok(pos) => Some(std::mem::replace(&mut bucket[pos], resource)),
            Err(pos) => {
                bucket.insert(pos, resource);
                self.len += 1;
                None
            }
        }
    }

    /// Finds a resource by key.
    #[must_use]
    pub fn find(&self, key: &NameKey) -> Option<&Arc<Resource>> {
        let bucket = &self.buckets[self.bucket_of(key.sid())];
        bucket
            .binary_search_by(|other| other.key().cmp(key))
            .ok()
            .map(|pos| &bucket[pos])
    }

    /// Number of resources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the table holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drops every resource. Bucket storage is kept.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    /// Every resource, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.buckets.iter().flatten()
    }
}

/// Outcome of a resource lookup that may have to reload the archive.
#[derive(Clone, Debug)]
pub(crate) enum Lookup {
    /// The archive is loaded and holds the resource.
    Found(Arc<Resource>),
    /// The archive is loaded and has no such resource.
    Absent,
    /// The archive was not loaded; the caller now owns its reload.
    Claimed,
}

/// Outcome of trying to take ownership of a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Claim {
    /// Already loaded; nothing to do.
    Ready,
    /// The caller moved the entry to `Loading` and must fill it.
    Claimed,
}

#[derive(Debug)]
struct ArchiveInner {
    state: ArchiveState,
    table: ResourceTable,
    /// Completed loads, for telling a reload from the first load.
    generation: u64,
}

/// A registered archive.
#[derive(Debug)]
pub struct ArchiveEntry {
    key: NameKey,
    inner: Mutex<ArchiveInner>,
    changed: Condvar,
}

impl ArchiveEntry {
    /// New entry, already claimed for loading by its creator.
    pub(crate) fn new_loading(key: NameKey, table_size: usize) -> Self {
        Self {
            key,
            inner: Mutex::new(ArchiveInner {
                state: ArchiveState::Loading,
                table: ResourceTable::new(table_size),
                generation: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// The (SID, name) key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &NameKey {
        &self.key
    }

    /// The stored name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The identifier.
    #[inline]
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.key.sid()
    }

    /// Current state, without waiting.
    #[must_use]
    pub fn state(&self) -> ArchiveState {
        self.inner.lock().state
    }

    /// True if the archive is loaded right now.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state() == ArchiveState::Loaded
    }

    /// Number of completed loads of this archive.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Number of resources currently held.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Names of every resource currently held, sorted.
    #[must_use]
    pub fn resource_names(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut names: Vec<String> = inner.table.iter().map(|r| r.name().to_owned()).collect();
        names.sort_unstable();
        names
    }

    /// Looks a resource up without triggering any load.
    ///
    /// Returns `None` unless the archive is loaded and holds `key`.
    #[must_use]
    pub fn find(&self, key: &NameKey) -> Option<Arc<Resource>> {
        let inner = self.inner.lock();
        if inner.state != ArchiveState::Loaded {
            return None;
        }
        inner.table.find(key).cloned()
    }

    /// Blocks while another thread is loading. Returns the settled state.
    pub fn wait_while_loading(&self) -> ArchiveState {
        let mut inner = self.inner.lock();
        while inner.state == ArchiveState::Loading {
            self.changed.wait(&mut inner);
        }
        inner.state
    }

    /// Waits out an in-flight load, then either runs `on_loaded` against
    /// the loaded table or takes ownership of a reload. `None` means the
    /// caller moved the entry to `Loading` and must fill it.
    ///
    /// A failure observed after waiting is reported rather than retried, so
    /// a broken file is read once per request wave instead of once per
    /// waiter.
    fn settle<R>(&self, on_loaded: impl FnOnce(&ResourceTable) -> R) -> AssetResult<Option<R>> {
        let mut inner = self.inner.lock();
        let mut waited = false;
        loop {
            match inner.state {
                ArchiveState::Loaded => return Ok(Some(on_loaded(&inner.table))),
                ArchiveState::Loading => {
                    waited = true;
                    self.changed.wait(&mut inner);
                }
                ArchiveState::Failed if waited => {
                    return Err(AssetError::LoadFailed(self.name().to_owned()));
                }
                ArchiveState::Freed | ArchiveState::Failed => {
                    inner.state = ArchiveState::Loading;
                    return Ok(None);
                }
            }
        }
    }

    /// Takes ownership of a load, or waits for someone else's to finish.
    pub(crate) fn claim_or_wait(&self) -> AssetResult<Claim> {
        Ok(match self.settle(|_| ())? {
            Some(()) => Claim::Ready,
            None => Claim::Claimed,
        })
    }

    /// Looks `key` up under the same lock that checks the load state, so a
    /// concurrent free can never turn a present resource into a miss. If
    /// the archive is not loaded the caller gets the reload instead.
    pub(crate) fn find_or_claim(&self, key: &NameKey) -> AssetResult<Lookup> {
        Ok(match self.settle(|table| table.find(key).cloned())? {
            Some(Some(resource)) => Lookup::Found(resource),
            Some(None) => Lookup::Absent,
            None => Lookup::Claimed,
        })
    }

    /// Installs a fully built table and wakes every waiter.
    fn publish(&self, table: ResourceTable) {
        let mut inner = self.inner.lock();
        debug_assert_eq!(inner.state, ArchiveState::Loading);
        inner.table = table;
        inner.state = ArchiveState::Loaded;
        inner.generation += 1;
        drop(inner);
        self.changed.notify_all();
    }

    fn fail(&self) {
        let mut inner = self.inner.lock();
        inner.table.clear();
        inner.state = ArchiveState::Failed;
        drop(inner);
        self.changed.notify_all();
    }

    /// Drops every resource, waiting out an in-flight load first.
    ///
    /// Returns `true` if the archive was loaded.
    pub(crate) fn free(&self) -> bool {
        let mut inner = self.inner.lock();
        while inner.state == ArchiveState::Loading {
            self.changed.wait(&mut inner);
        }
        if inner.state != ArchiveState::Loaded {
            return false;
        }
        tracing::debug!(archive = %self.key, resources = inner.table.len(), "Freeing resources");
        inner.table.clear();
        inner.state = ArchiveState::Freed;
        drop(inner);
        self.changed.notify_all();
        true
    }
}

/// Ownership of an in-flight load.
///
/// Dropping the guard without publishing marks the archive `Failed`, so
/// waiters are never stranded by an early return or a panic in the loader.
pub(crate) struct LoadGuard<'a> {
    entry: &'a ArchiveEntry,
    done: bool,
}

impl<'a> LoadGuard<'a> {
    pub(crate) fn new(entry: &'a ArchiveEntry) -> Self {
        Self { entry, done: false }
    }

    pub(crate) fn publish(mut self, table: ResourceTable) {
        self.entry.publish(table);
        self.done = true;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.entry.fail();
        }
    }
}
