//! # BULLETRAIN Assets
//!
//! Archive resource cache. Game data ships as gzip tarballs; each archive is
//! loaded once, its files doctored into ready-to-use form, and handed out as
//! shared immutable [`Resource`]s.
//!
//! ## Rules
//!
//! 1. **Load once** - concurrent requests for one archive share a single load
//! 2. **Never trust the hash alone** - every lookup compares (SID, name)
//! 3. **Missing is not fatal** - a missing resource is `None`, a missing
//!    archive is an `Err` the caller can recover from
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulletrain_assets::ArchiveCache;
//!
//! let cache = ArchiveCache::new("data");
//! cache.load_arc("stage1.tgz")?;
//! let script = cache.get_res("stage1.tgz", "boss.lua")?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod archive;
pub mod cache;
pub mod error;
pub mod progress;
pub mod resource;

pub use archive::{ArchiveEntry, ArchiveState, ResourceTable, DEFAULT_TABLE_SIZE};
pub use cache::ArchiveCache;
pub use error::{AssetError, AssetResult};
pub use progress::{Progress, ProgressReporter, MAX_DOING_LEN};
pub use resource::{ImageData, Resource, ResourceData, ResourceType};
