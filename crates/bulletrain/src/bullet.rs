//! # Bullets
//!
//! Enemy bullets (and enemies, which are bullets with hit points) live in an
//! [`EntityPool<Bullet>`](bulletrain_core::EntityPool). A bullet is stamped
//! from a [`BulletType`] template when fired and then moves by its velocity
//! once per tick.
//!
//! ## Flags
//!
//! ```text
//!  bit  31..29  28      ..  13     12      11    10     9      8     7     6    5     4      3..0
//!       ------  ALIVE   ..  ROTATE KILL_ME WIDE  NOCOLL ANCHOR BOMB  SCRPT BOSS ENEMY P_INV  BLOCK
//! ```
//!
//! A dead slot has every flag clear.

use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use bulletrain_assets::Resource;
use bulletrain_core::{circle_collide, Aabb, PoolSlot, SlotHandle, Vec2};
use bytemuck::{Pod, Zeroable};

use crate::config::EngineConfig;
use crate::types::Sprite;

/// Engine flags carried by every bullet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BulletFlags(u32);

impl BulletFlags {
    /// Block level: a player bullet pierces this bullet only if its pierce
    /// level is higher. 15 blocks everything.
    pub const BLOCK: Self = Self(0x0000_000F);
    /// The polar velocity is stale.
    pub const P_INVALID: Self = Self(0x0000_0010);
    /// Can be hurt by player bullets.
    pub const ENEMY: Self = Self(0x0000_0020);
    /// Shows a health bar. Ignored without `ENEMY`.
    pub const BOSS: Self = Self(0x0000_0040);
    /// Updated by the scripting step.
    pub const SCRIPTED: Self = Self(0x0000_0080);
    /// Immune to bombs.
    pub const BOMBPROOF: Self = Self(0x0000_0100);
    /// Moves with its parent.
    pub const ANCHOR_PARENT: Self = Self(0x0000_0200);
    /// Never collides with the player.
    pub const NO_COLLIDE: Self = Self(0x0000_0400);
    /// Lives inside the wide square instead of the normal one.
    pub const WIDE_STOP: Self = Self(0x0000_0800);
    /// Release at the next kill pass.
    pub const KILL_ME: Self = Self(0x0000_1000);
    /// Sprite turns to face the direction of travel.
    pub const ROTATE: Self = Self(0x0000_2000);
    /// Slot is in use.
    pub const ALIVE: Self = Self(0x1000_0000);

    /// No flags.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wraps raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Sets or clears the bits of `other`.
    #[inline]
    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    /// The block level, `0..=15`.
    #[inline]
    #[must_use]
    pub const fn block(self) -> u32 {
        self.0 & Self::BLOCK.0
    }

    /// Replaces the block level. Values above 15 saturate.
    #[inline]
    pub fn set_block(&mut self, level: u32) {
        self.0 = (self.0 & !Self::BLOCK.0) | level.min(Self::BLOCK.0);
    }
}

impl BitOr for BulletFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BulletFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The squares bullets die outside of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayField {
    /// Half-width of the normal square.
    pub bound: f32,
    /// Half-width of the wide-stop square.
    pub wide_bound: f32,
}

impl PlayField {
    /// Bounds from the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            bound: config.out_of_bounds,
            wide_bound: config.out_of_bounds_wide,
        }
    }
}

impl Default for PlayField {
    fn default() -> Self {
        Self {
            bound: 400.0,
            wide_bound: 800.0,
        }
    }
}

/// A bullet template.
#[derive(Clone, Debug, Default)]
pub struct BulletType {
    /// Collision radius.
    pub radius: f32,
    /// Sprite drawn for bullets of this type.
    pub sprite: Option<Arc<Sprite>>,
    /// Engine flags copied to every bullet. `ALIVE` is ignored.
    pub flags: BulletFlags,
    /// Game-specific flags, opaque to the engine.
    pub game_flags: u32,
    /// Script run for bullets flagged `SCRIPTED`.
    pub script: Option<Arc<Resource>>,
    /// Hitbox for player bullet collisions, relative to the center.
    pub hitbox: Aabb,
    /// Sprite offset from the center.
    pub draw_offset: Vec2,
}

/// One pool slot.
#[derive(Clone, Debug, Default)]
pub struct Bullet {
    /// Center, in play-field units.
    pub position: Vec2,
    /// Displacement per tick.
    pub velocity: Vec2,
    /// Speed, kept in step with `velocity` unless `P_INVALID` is set.
    pub speed: f32,
    /// Heading in radians, same caveat as `speed`.
    pub heading: f32,
    /// Collision radius.
    pub radius: f32,
    /// Hitbox relative to the center.
    pub hitbox: Aabb,
    /// Sprite offset from the center.
    pub draw_offset: Vec2,
    /// Engine flags.
    pub flags: BulletFlags,
    /// Game flags.
    pub game_flags: u32,
    /// Sprite, shared with the type.
    pub sprite: Option<Arc<Sprite>>,
    /// Script, shared with the type.
    pub script: Option<Arc<Resource>>,
    /// Bullet this one is anchored to.
    pub parent: Option<SlotHandle>,
    /// Enemy data slot, for enemies.
    pub extended: Option<SlotHandle>,
}

impl PoolSlot for Bullet {
    #[inline]
    fn is_alive(&self) -> bool {
        self.flags.contains(BulletFlags::ALIVE)
    }

    #[inline]
    fn mark_alive(&mut self) {
        self.flags.insert(BulletFlags::ALIVE);
    }
}

impl Bullet {
    /// Stamps a bullet from a template. The pool sets `ALIVE`.
    #[must_use]
    pub fn spawn(ty: &BulletType, position: Vec2, velocity: Vec2) -> Self {
        let mut flags = ty.flags;
        flags.remove(BulletFlags::ALIVE | BulletFlags::P_INVALID);
        let (speed, heading) = velocity.to_polar();
        Self {
            position,
            velocity,
            speed,
            heading,
            radius: ty.radius,
            hitbox: ty.hitbox,
            draw_offset: ty.draw_offset,
            flags,
            game_flags: ty.game_flags,
            sprite: ty.sprite.clone(),
            script: ty.script.clone(),
            parent: None,
            extended: None,
        }
    }

    /// Moves the bullet by `displacement`.
    #[inline]
    pub fn advance(&mut self, displacement: Vec2) {
        self.position += displacement;
    }

    /// True if the bullet should be released: outside its square or
    /// kill-flagged.
    #[inline]
    #[must_use]
    pub fn expired(&self, field: &PlayField) -> bool {
        let bound = if self.flags.contains(BulletFlags::WIDE_STOP) {
            field.wide_bound
        } else {
            field.bound
        };
        self.flags.contains(BulletFlags::KILL_ME) || self.position.outside_square(bound)
    }

    /// Circle test against a point with radius `radius`.
    #[inline]
    #[must_use]
    pub fn collide(&self, point: Vec2, radius: f32) -> bool {
        circle_collide(self.position, point, self.radius + radius)
    }

    /// True if the bullet can hit the player.
    #[inline]
    #[must_use]
    pub fn collides_with_player(&self) -> bool {
        self.is_alive() && !self.flags.contains(BulletFlags::NO_COLLIDE)
    }

    /// Hitbox in play-field coordinates.
    #[inline]
    #[must_use]
    pub fn world_hitbox(&self) -> Aabb {
        self.hitbox.translated(self.position)
    }

    /// Where the sprite's top-left corner goes.
    #[inline]
    #[must_use]
    pub fn draw_position(&self) -> Vec2 {
        self.position + self.draw_offset
    }

    /// Marks the polar velocity stale after a rectangular change.
    #[inline]
    pub fn invalidate_polar(&mut self) {
        self.flags.insert(BulletFlags::P_INVALID);
    }

    /// Recomputes speed and heading if they are stale.
    pub fn refresh_polar(&mut self) {
        if self.flags.contains(BulletFlags::P_INVALID) {
            (self.speed, self.heading) = self.velocity.to_polar();
            self.flags.remove(BulletFlags::P_INVALID);
        }
    }

    /// Scales velocity and speed together.
    #[inline]
    pub fn scale_velocity(&mut self, scale: f32) {
        self.velocity *= scale;
        self.speed *= scale;
    }

    /// Requests release at the next kill pass. No effect on a dead slot.
    #[inline]
    pub fn kill(&mut self) {
        if self.is_alive() {
            self.flags.insert(BulletFlags::KILL_ME);
        }
    }

    /// Replaces every flag except `ALIVE`, which scripts cannot touch.
    pub fn set_flags(&mut self, flags: BulletFlags) {
        let alive = self.flags.contains(BulletFlags::ALIVE);
        let mut next = flags;
        next.set(BulletFlags::ALIVE, alive);
        if alive {
            self.flags = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty() -> BulletType {
        BulletType {
            radius: 4.0,
            flags: BulletFlags::SCRIPTED | BulletFlags::ALIVE,
            ..BulletType::default()
        }
    }

    #[test]
    fn test_spawn_copies_template() {
        let b = Bullet::spawn(&ty(), Vec2::new(1.0, 2.0), Vec2::new(0.0, 3.0));
        assert!(!b.is_alive(), "pool sets ALIVE, not spawn");
        assert!(b.flags.contains(BulletFlags::SCRIPTED));
        assert!((b.radius - 4.0).abs() < f32::EPSILON);
        assert!((b.speed - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_expiry() {
        let field = PlayField::default();
        let mut b = Bullet::spawn(&ty(), Vec2::new(395.0, 0.0), Vec2::new(10.0, 0.0));
        b.mark_alive();
        assert!(!b.expired(&field));
        b.advance(b.velocity);
        assert!(b.expired(&field));

        b.flags.insert(BulletFlags::WIDE_STOP);
        assert!(!b.expired(&field));

        b.position = Vec2::ZERO;
        b.kill();
        assert!(b.expired(&field));
    }

    #[test]
    fn test_collide() {
        let b = Bullet::spawn(&ty(), Vec2::ZERO, Vec2::ZERO);
        assert!(b.collide(Vec2::new(6.0, 0.0), 2.0));
        assert!(!b.collide(Vec2::new(6.1, 0.0), 2.0));
    }

    #[test]
    fn test_block_level() {
        let mut flags = BulletFlags::ENEMY;
        flags.set_block(7);
        assert_eq!(flags.block(), 7);
        assert!(flags.contains(BulletFlags::ENEMY));
        flags.set_block(99);
        assert_eq!(flags.block(), 15);
    }

    #[test]
    fn test_set_flags_keeps_alive_state() {
        let mut dead = Bullet::default();
        dead.set_flags(BulletFlags::ALIVE | BulletFlags::ENEMY);
        assert_eq!(dead.flags, BulletFlags::empty());

        let mut live = Bullet::default();
        live.mark_alive();
        live.set_flags(BulletFlags::BOSS);
        assert!(live.is_alive());
        assert!(live.flags.contains(BulletFlags::BOSS));
    }

    #[test]
    fn test_polar_refresh() {
        let mut b = Bullet::spawn(&ty(), Vec2::ZERO, Vec2::new(3.0, 4.0));
        b.velocity += Vec2::new(3.0, 4.0);
        b.invalidate_polar();
        b.refresh_polar();
        assert!((b.speed - 10.0).abs() < 1e-5);
        assert!(!b.flags.contains(BulletFlags::P_INVALID));
    }
}
