//! # Memory Management
//!
//! Pre-allocated entity pools for zero-allocation gameplay.
//!
//! ## Design Philosophy
//!
//! All slot memory is allocated once at startup. During gameplay:
//! - No heap allocations for spawning or despawning
//! - Exhaustion degrades gracefully (the spawn is skipped)
//! - Predictable, flat latency

mod pool;

pub use pool::{EntityPool, PoolReadView, PoolSlot, PoolStats, PoolWriteView, SlotHandle};
