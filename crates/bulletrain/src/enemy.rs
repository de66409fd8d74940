//! # Enemy Data
//!
//! Extra state for bullets that are enemies, kept in its own smaller pool
//! and linked from the bullet. Plain data, so it derives `Pod`.

use bulletrain_core::PoolSlot;
use bytemuck::{Pod, Zeroable};

/// Game data words per enemy.
pub const GAME_DATA_WORDS: usize = 16;

/// Hit points and game data of one enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EnemyData {
    /// Current hit points.
    pub hp: i32,
    /// Hit points at spawn.
    pub hp_max: i32,
    /// Game-specific words, opaque to the engine.
    pub game_data: [i32; GAME_DATA_WORDS],
    alive: u32,
}

impl PoolSlot for EnemyData {
    #[inline]
    fn is_alive(&self) -> bool {
        self.alive != 0
    }

    #[inline]
    fn mark_alive(&mut self) {
        self.alive = 1;
    }
}

impl EnemyData {
    /// Full health, zeroed game data.
    #[must_use]
    pub fn new(hp: i32) -> Self {
        Self {
            hp,
            hp_max: hp,
            ..Self::default()
        }
    }

    /// Subtracts `amount`. Returns `true` if this hit was fatal.
    ///
    /// An enemy spawned with no health dies on any hit.
    pub fn damage(&mut self, amount: i32) -> bool {
        let was_alive = self.hp > 0 || self.hp_max <= 0;
        self.hp = self.hp.saturating_sub(amount);
        was_alive && self.hp <= 0
    }

    /// Health as a fraction of the maximum, for boss bars.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.hp_max <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.hp.max(0) as f32 / self.hp_max as f32;
        fraction.min(1.0)
    }
}
