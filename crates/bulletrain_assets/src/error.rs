//! # Asset Error Types
//!
//! Only real I/O problems are errors. A resource that is simply not in an
//! archive is reported as `None`.

use std::io;

use thiserror::Error;

/// Errors that can occur while loading archives.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The archive file could not be opened.
    #[error("couldn't open archive {archive}: {source}")]
    Open {
        /// Archive name as requested.
        archive: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The archive opened but could not be decompressed or read.
    #[error("couldn't read archive {archive}: {source}")]
    Read {
        /// Archive name as requested.
        archive: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Another thread tried to load the archive while this one waited, and
    /// failed.
    #[error("archive {0} failed to load")]
    LoadFailed(String),
}

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
