//! # Engine Error Types
//!
//! Two families: [`EngineError`] for startup and configuration, and
//! [`ScriptError`] for calls coming in through the script bridge. A script
//! error is reported back to the script; it never takes the engine down.

use std::io;
use std::path::PathBuf;

use bulletrain_assets::AssetError;
use bulletrain_core::PoolError;
use thiserror::Error;

/// Errors that can occur while starting or configuring the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("couldn't read config {path}: {source}")]
    ConfigIo {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An archive needed at startup failed to load.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The clock thread could not be spawned.
    #[error("couldn't start clock thread: {0}")]
    Clock(#[source] io::Error),
}

/// Errors raised by script bridge calls.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// A bullet index outside `0..capacity`.
    #[error("bullet {index} not in valid range 0..{capacity}")]
    BulletOutOfRange {
        /// Index as passed by the script.
        index: i64,
        /// Bullet pool capacity.
        capacity: usize,
    },

    /// A type index outside `0..max`.
    #[error("type index {index} not in valid range 0..{max}")]
    TypeOutOfRange {
        /// Index as passed by the script.
        index: i64,
        /// Registry size.
        max: usize,
    },

    /// A "self" function was called with no bullet in context.
    #[error("call to 'self' function from stage context")]
    NoContext,

    /// A type index with nothing registered in it.
    #[error("bullet type {0} is not registered")]
    TypeNotRegistered(usize),

    /// A resource named by a type registration is not in its archive.
    #[error("resource {resource} not found in archive {archive}")]
    MissingResource {
        /// Archive name.
        archive: String,
        /// Resource name.
        resource: String,
    },

    /// A sprite was requested from a resource that is not a usable image.
    #[error("resource {resource} in archive {archive} is not an image or the region is out of bounds")]
    NotAnImage {
        /// Archive name.
        archive: String,
        /// Resource name.
        resource: String,
    },

    /// The archive itself failed to load.
    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl From<PoolError> for ScriptError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::OutOfRange { index, capacity } => Self::BulletOutOfRange {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                capacity,
            },
        }
    }
}

/// Result type for engine startup.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for script bridge calls.
pub type ScriptResult<T> = Result<T, ScriptError>;
