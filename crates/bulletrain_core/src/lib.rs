//! # BULLETRAIN Core
//!
//! The allocation-free foundation of the engine:
//! - Fixed-capacity entity pools shared by simulation and render threads
//! - Deterministic string identifiers for archives and resources
//! - Play-field vectors and collision tests
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in the hot path** - pools are sized at startup
//! 2. **Exhaustion is not fatal** - a full pool skips the spawn and warns
//! 3. **Hashes are not trusted alone** - lookups compare (SID, name)
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulletrain_core::{EntityPool, sid_str};
//!
//! let pool: EntityPool<Bullet> = EntityPool::new("bullets", 8192);
//! let id = sid_str("stage1.tgz");
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod hash;
pub mod math;
pub mod memory;

pub use error::{PoolError, PoolResult};
pub use hash::{clip_printable, extension, sid, sid_str, truncate_name, NameKey, Sid, MAX_NAME_LEN};
pub use math::{aabb_collide, circle_collide, Aabb, Vec2};
pub use memory::{EntityPool, PoolReadView, PoolSlot, PoolStats, PoolWriteView, SlotHandle};
