//! # Entity Pool
//!
//! Fixed-capacity slot storage for short-lived entities (bullets, player
//! bullets, enemy data), shared between a simulation thread and render
//! threads.
//!
//! ## Layout
//!
//! ```text
//!   slots: RwLock<[T; capacity]>        free: Mutex<VecDeque<index>>
//!   ┌───┬───┬───┬───┬───┬───┐           head ─► 3 ─► 5 ─► 0 ◄─ tail
//!   │ A │ A │ . │ . │ A │ . │
//!   └───┴───┴───┴───┴───┴───┘           (FIFO: pop head, push tail)
//! ```
//!
//! The free list holds indices, never slot data, so nothing that writes a
//! slot can corrupt it. A slot is either on the free list with its alive flag
//! clear, or off it with the alive flag set.
//!
//! ## Locking
//!
//! - `acquire` holds the free-list lock only to pop an index; the slot value
//!   is built after that lock is dropped, under the slot write lock.
//! - Slot data is single-writer / many-reader. The simulation thread takes a
//!   [`PoolWriteView`], render threads take [`PoolReadView`]s.
//! - Lock order is always slots → free list.
//!
//! Calling [`EntityPool::acquire`] or [`EntityPool::release`] on a thread that
//! already holds a view of the same pool deadlocks; use the view's own
//! `acquire_with` / `release` instead.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{PoolError, PoolResult};

/// A value that can live in an [`EntityPool`].
///
/// `Default` must produce a dead slot.
pub trait PoolSlot: Default + Send + Sync {
    /// Whether the slot is in use.
    fn is_alive(&self) -> bool;

    /// Sets the alive flag. Called by the pool as the last step of an
    /// acquire.
    fn mark_alive(&mut self);

    /// Returns the slot to its dead state. Drops any shared handles it holds.
    fn retire(&mut self) {
        *self = Self::default();
    }
}

/// Handle to an acquired slot.
///
/// A handle is just the slot's index; it stays meaningful until the slot is
/// released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle {
    index: usize,
}

impl SlotHandle {
    /// Index into the pool's backing storage.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Point-in-time occupancy numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fixed capacity.
    pub capacity: usize,
    /// Slots on the free list.
    pub free: usize,
    /// Slots with the alive flag set.
    pub alive: usize,
}

/// Fixed-capacity pool with a FIFO free list.
///
/// # Example
///
/// ```rust,ignore
/// let pool: EntityPool<Bullet> = EntityPool::new("bullets", 8192);
///
/// // O(1), no heap allocation
/// let handle = pool.acquire_with(|| Bullet::spawn(&ty, at, vel))?;
///
/// // O(1), no heap deallocation
/// pool.release(handle);
/// ```
pub struct EntityPool<T> {
    /// Backing storage, never resized.
    slots: RwLock<Box<[T]>>,
    /// Indices of dead slots, head is the next to hand out.
    free: Mutex<VecDeque<usize>>,
    /// Total capacity.
    capacity: usize,
    /// Label used in diagnostics.
    label: &'static str,
}

impl<T: PoolSlot> EntityPool<T> {
    /// Creates a pool with every slot dead and on the free list in array
    /// order.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Pools are core structures; a pool that
    /// cannot hold anything is unrecoverable.
    #[must_use]
    pub fn new(label: &'static str, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let slots: Vec<T> = (0..capacity).map(|_| T::default()).collect();

        let mut free = VecDeque::with_capacity(capacity);
        free.extend(0..capacity);

        Self {
            slots: RwLock::new(slots.into_boxed_slice()),
            free: Mutex::new(free),
            capacity,
            label,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the diagnostic label.
    #[inline]
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Number of slots on the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Number of slots with the alive flag set.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.read().alive_count()
    }

    /// Occupancy snapshot.
    ///
    /// Taken under the slot read lock, so no release can interleave between
    /// the two counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let view = self.read();
        let alive = view.alive_count();
        let free = self.free.lock().len();
        PoolStats {
            capacity: self.capacity,
            free,
            alive,
        }
    }

    /// Validates an index coming from outside (script code).
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= capacity`.
    pub fn handle(&self, index: usize) -> PoolResult<SlotHandle> {
        if index < self.capacity {
            Ok(SlotHandle { index })
        } else {
            Err(PoolError::OutOfRange {
                index,
                capacity: self.capacity,
            })
        }
    }

    /// Pops the head of the free list. Warns on exhaustion.
    fn pop_free(&self) -> Option<usize> {
        let index = self.free.lock().pop_front();
        if index.is_none() {
            tracing::warn!(
                pool = self.label,
                capacity = self.capacity,
                "Out of pool memory, spawn skipped"
            );
        }
        index
    }

    /// Acquires a slot and fills it with the value built by `build`.
    ///
    /// The free-list lock is held only while popping; `build` runs without
    /// it. The pop and the store happen under one slot write lock, so no
    /// reader sees an index that is neither free nor alive.
    ///
    /// Returns `None` (and logs a warning) if the pool is exhausted; `build`
    /// is not called in that case.
    pub fn acquire_with<F>(&self, build: F) -> Option<SlotHandle>
    where
        F: FnOnce() -> T,
    {
        self.write().acquire_with(build)
    }

    /// Acquires a slot for an already-built value.
    pub fn acquire(&self, value: T) -> Option<SlotHandle> {
        self.acquire_with(move || value)
    }

    /// Releases a slot back to the tail of the free list.
    ///
    /// Returns `false` if the slot was not alive. A double release is a caller
    /// bug; it is logged and ignored so the free list never holds an index
    /// twice.
    pub fn release(&self, handle: SlotHandle) -> bool {
        let mut slots = self.slots.write();
        self.release_locked(&mut slots, handle.index)
    }

    fn release_locked(&self, slots: &mut [T], index: usize) -> bool {
        let Some(slot) = slots.get_mut(index) else {
            tracing::warn!(pool = self.label, index, "Release of foreign slot ignored");
            return false;
        };
        if !slot.is_alive() {
            tracing::warn!(pool = self.label, index, "Release of dead slot ignored");
            return false;
        }
        slot.retire();
        self.free.lock().push_back(index);
        true
    }

    /// Kills every slot and re-links the whole array into the free list.
    ///
    /// No memory is freed or reallocated.
    pub fn reset(&self) {
        let mut slots = self.slots.write();
        for slot in slots.iter_mut() {
            slot.retire();
        }
        let mut free = self.free.lock();
        free.clear();
        free.extend(0..self.capacity);
    }

    /// Shared view of the backing storage for render threads.
    #[must_use]
    pub fn read(&self) -> PoolReadView<'_, T> {
        PoolReadView {
            slots: self.slots.read(),
        }
    }

    /// Exclusive view of the backing storage for the simulation thread.
    #[must_use]
    pub fn write(&self) -> PoolWriteView<'_, T> {
        PoolWriteView {
            pool: self,
            slots: self.slots.write(),
        }
    }

    /// Copies the slot at `index` out of the pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= capacity`.
    pub fn get(&self, index: usize) -> PoolResult<T>
    where
        T: Clone,
    {
        let handle = self.handle(index)?;
        Ok(self.read()[handle.index].clone())
    }
}

impl<T> fmt::Debug for EntityPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityPool")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("free", &self.free.lock().len())
            .finish_non_exhaustive()
    }
}

/// Read-only view over every slot, alive or dead.
///
/// Holding a view blocks the simulation thread's writes; keep it for one
/// frame at most.
pub struct PoolReadView<'a, T> {
    slots: RwLockReadGuard<'a, Box<[T]>>,
}

impl<T: PoolSlot> PoolReadView<'_, T> {
    /// Every slot in array order. Callers check `is_alive` themselves.
    pub fn iter_all(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }

    /// Alive slots with their handles.
    pub fn iter_alive(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_alive())
            .map(|(index, slot)| (SlotHandle { index }, slot))
    }

    /// Number of alive slots.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_alive()).count()
    }
}

impl<T> Deref for PoolReadView<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.slots
    }
}

/// Exclusive view used by the simulation step and the script bridge.
pub struct PoolWriteView<'a, T> {
    pool: &'a EntityPool<T>,
    slots: RwLockWriteGuard<'a, Box<[T]>>,
}

impl<T: PoolSlot> PoolWriteView<'_, T> {
    /// Handle for an index, see [`EntityPool::handle`].
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= capacity`.
    #[inline]
    pub fn handle(&self, index: usize) -> PoolResult<SlotHandle> {
        self.pool.handle(index)
    }

    /// Bounds-checked shared access.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= capacity`.
    pub fn get(&self, index: usize) -> PoolResult<&T> {
        let capacity = self.pool.capacity;
        self.slots
            .get(index)
            .ok_or(PoolError::OutOfRange { index, capacity })
    }

    /// Bounds-checked mutable access. The slot carries no free-list link, so
    /// writes through this reference cannot corrupt the free list.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= capacity`.
    pub fn get_mut(&mut self, index: usize) -> PoolResult<&mut T> {
        let capacity = self.pool.capacity;
        self.slots
            .get_mut(index)
            .ok_or(PoolError::OutOfRange { index, capacity })
    }

    /// Every slot in array order.
    pub fn iter_all(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }

    /// Every slot in array order, mutably.
    pub fn iter_all_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }

    /// Acquires a slot while this view is held.
    ///
    /// If `build` panics the popped index goes back to the head of the free
    /// list.
    pub fn acquire_with<F>(&mut self, build: F) -> Option<SlotHandle>
    where
        F: FnOnce() -> T,
    {
        let popped = Popped {
            pool: self.pool,
            index: self.pool.pop_free()?,
        };
        let mut slot = build();
        let index = popped.keep();
        slot.mark_alive();
        self.slots[index] = slot;
        Some(SlotHandle { index })
    }

    /// Releases a slot while this view is held. Same contract as
    /// [`EntityPool::release`].
    pub fn release(&mut self, handle: SlotHandle) -> bool {
        self.pool.release_locked(&mut self.slots, handle.index)
    }

    /// Releases every alive slot for which `expired` returns true.
    ///
    /// Returns the number of slots released.
    pub fn release_where<F>(&mut self, mut expired: F) -> usize
    where
        F: FnMut(SlotHandle, &T) -> bool,
    {
        let mut released = 0;
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.is_alive()
                && expired(SlotHandle { index }, slot)
                && self.pool.release_locked(&mut self.slots, index)
            {
                released += 1;
            }
        }
        released
    }
}

/// An index taken off the free list but not yet stored into. Dropping it
/// returns the index to the head of the list.
struct Popped<'a, T> {
    pool: &'a EntityPool<T>,
    index: usize,
}

impl<T> Popped<'_, T> {
    fn keep(self) -> usize {
        let index = self.index;
        std::mem::forget(self);
        index
    }
}

impl<T> Drop for Popped<'_, T> {
    fn drop(&mut self) {
        self.pool.free.lock().push_front(self.index);
    }
}

impl<T> Deref for PoolWriteView<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.slots
    }
}
