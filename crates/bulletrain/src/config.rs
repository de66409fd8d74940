//! # Engine Configuration
//!
//! Every field has a default, so an empty TOML file is a valid config:
//!
//! ```toml
//! bullet_capacity = 8192
//! player_bullet_capacity = 1024
//! extended_capacity = 1024
//! out_of_bounds = 400.0
//! out_of_bounds_wide = 800.0
//! asset_root = "."
//! resource_table_size = 1024
//! max_bullet_types = 256
//! tick_rate = 60
//! timer_backlog = 8
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Default bullet pool capacity.
pub const DEFAULT_BULLET_CAPACITY: usize = 8192;
/// Default player bullet pool capacity.
pub const DEFAULT_PLAYER_BULLET_CAPACITY: usize = 1024;
/// Default enemy data pool capacity.
pub const DEFAULT_EXTENDED_CAPACITY: usize = 1024;
/// Default bullet type registry size.
pub const DEFAULT_MAX_BULLET_TYPES: usize = 256;
/// Default clock rate in Hz.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Enemy bullet slots.
    pub bullet_capacity: usize,
    /// Player bullet slots.
    pub player_bullet_capacity: usize,
    /// Enemy data slots (hit points and game data).
    pub extended_capacity: usize,
    /// Half-width of the square bullets die outside of.
    pub out_of_bounds: f32,
    /// Same, for bullets flagged wide-stop.
    pub out_of_bounds_wide: f32,
    /// Directory archives are read from.
    pub asset_root: PathBuf,
    /// Buckets per archive table.
    pub resource_table_size: usize,
    /// Slots in the bullet type registry.
    pub max_bullet_types: usize,
    /// Clock rate in Hz.
    pub tick_rate: u32,
    /// Pulses the clock queues before it starts dropping them.
    pub timer_backlog: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bullet_capacity: DEFAULT_BULLET_CAPACITY,
            player_bullet_capacity: DEFAULT_PLAYER_BULLET_CAPACITY,
            extended_capacity: DEFAULT_EXTENDED_CAPACITY,
            out_of_bounds: 400.0,
            out_of_bounds_wide: 800.0,
            asset_root: PathBuf::from("."),
            resource_table_size: bulletrain_assets::DEFAULT_TABLE_SIZE,
            max_bullet_types: DEFAULT_MAX_BULLET_TYPES,
            tick_rate: DEFAULT_TICK_RATE,
            timer_backlog: 8,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] on a parse error or a value rejected by
    /// [`EngineConfig::validate`].
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| EngineError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigIo`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> EngineResult<()> {
        let capacities = [
            ("bullet_capacity", self.bullet_capacity),
            ("player_bullet_capacity", self.player_bullet_capacity),
            ("extended_capacity", self.extended_capacity),
            ("resource_table_size", self.resource_table_size),
            ("max_bullet_types", self.max_bullet_types),
            ("timer_backlog", self.timer_backlog),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{field} must be greater than zero"
                )));
            }
        }

        for (field, value) in [
            ("out_of_bounds", self.out_of_bounds),
            ("out_of_bounds_wide", self.out_of_bounds_wide),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{field} must be a positive number, got {value}"
                )));
            }
        }
        if self.out_of_bounds_wide < self.out_of_bounds {
            return Err(EngineError::InvalidConfig(
                "out_of_bounds_wide must not be smaller than out_of_bounds".to_owned(),
            ));
        }

        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(EngineError::InvalidConfig(format!(
                "tick_rate must be in 1..=1000, got {}",
                self.tick_rate
            )));
        }
        Ok(())
    }
}
