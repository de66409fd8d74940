//! # Player Bullets
//!
//! Player bullets are boxes, not circles. A template's hitbox is an offset
//! from the spawn point; spawning adds the point to both corners.

use std::ops::BitOr;
use std::sync::Arc;

use bulletrain_core::{aabb_collide, Aabb, PoolSlot, Vec2};
use bytemuck::{Pod, Zeroable};

use crate::bullet::{Bullet, BulletFlags};
use crate::types::Sprite;

/// Flags carried by player bullets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct PlayerBulletFlags(u32);

impl PlayerBulletFlags {
    /// Pierce level, compared against an enemy's block level.
    pub const PIERCE: Self = Self(0x0000_000F);
    /// The polar velocity is stale.
    pub const P_INVALID: Self = Self(0x0000_0010);
    /// Sprite turns to face the direction of travel.
    pub const ROTATE: Self = Self(0x0000_2000);
    /// Slot is in use.
    pub const ALIVE: Self = Self(0x1000_0000);

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

    /// The pierce level, `0..=15`.
    #[inline]
    #[must_use]
    pub const fn pierce(self) -> u32 {
        self.0 & Self::PIERCE.0
    }

    /// Replaces the pierce level. Values above 15 saturate.
    #[inline]
    pub fn set_pierce(&mut self, level: u32) {
        self.0 = (self.0 & !Self::PIERCE.0) | level.min(Self::PIERCE.0);
    }

    /// True if a bullet with these flags passes through `target`.
    #[inline]
    #[must_use]
    pub fn pierces(self, target: BulletFlags) -> bool {
        self.pierce() > target.block()
    }
}

impl BitOr for PlayerBulletFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A player bullet template.
#[derive(Clone, Debug, Default)]
pub struct PlayerBulletType {
    /// Hitbox, as offsets from the spawn point.
    pub hitbox: Aabb,
    /// Sprite offset from the hitbox's top-left corner.
    pub draw_offset: Vec2,
    /// Sprite.
    pub sprite: Option<Arc<Sprite>>,
    /// Engine flags copied to every bullet. `ALIVE` is ignored.
    pub flags: PlayerBulletFlags,
    /// Game-specific flags.
    pub game_flags: u32,
    /// Damage dealt to ordinary enemies.
    pub enemy_damage: i32,
    /// Damage dealt to bosses.
    pub boss_damage: i32,
}

/// Initial velocity of a player bullet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Launch {
    /// Rectangular components.
    Rect(Vec2),
    /// Speed and heading in radians.
    Polar {
        /// Speed per tick.
        speed: f32,
        /// Heading in radians.
        heading: f32,
    },
}

/// One pool slot.
#[derive(Clone, Debug, Default)]
pub struct PlayerBullet {
    /// Hitbox in play-field coordinates.
    pub hitbox: Aabb,
    /// Displacement per tick.
    pub velocity: Vec2,
    /// Speed.
    pub speed: f32,
    /// Heading in radians.
    pub heading: f32,
    /// Sprite offset from the hitbox's top-left corner.
    pub draw_offset: Vec2,
    /// Sprite.
    pub sprite: Option<Arc<Sprite>>,
    /// Engine flags.
    pub flags: PlayerBulletFlags,
    /// Game flags.
    pub game_flags: u32,
    /// Damage dealt to ordinary enemies.
    pub enemy_damage: i32,
    /// Damage dealt to bosses.
    pub boss_damage: i32,
}

impl PoolSlot for PlayerBullet {
    #[inline]
    fn is_alive(&self) -> bool {
        self.flags.contains(PlayerBulletFlags::ALIVE)
    }

    #[inline]
    fn mark_alive(&mut self) {
        self.flags.insert(PlayerBulletFlags::ALIVE);
    }
}

impl PlayerBullet {
    /// Stamps a player bullet from a template at `at`.
    #[must_use]
    pub fn spawn(ty: &PlayerBulletType, at: Vec2, launch: Launch) -> Self {
        let (velocity, speed, heading) = match launch {
            Launch::Rect(velocity) => {
                let (speed, heading) = velocity.to_polar();
                (velocity, speed, heading)
            }
            Launch::Polar { speed, heading } => (Vec2::from_polar(speed, heading), speed, heading),
        };
        let mut flags = ty.flags;
        flags.remove(PlayerBulletFlags::ALIVE | PlayerBulletFlags::P_INVALID);
        Self {
            hitbox: ty.hitbox.translated(at),
            velocity,
            speed,
            heading,
            draw_offset: ty.draw_offset,
            sprite: ty.sprite.clone(),
            flags,
            game_flags: ty.game_flags,
            enemy_damage: ty.enemy_damage,
            boss_damage: ty.boss_damage,
        }
    }

    /// Moves the hitbox by the velocity.
    #[inline]
    pub fn advance(&mut self) {
        self.hitbox = self.hitbox.translated(self.velocity);
    }

    /// True once any edge of the hitbox crosses the square of half-width
    /// `bound`.
    #[inline]
    #[must_use]
    pub fn expired(&self, bound: f32) -> bool {
        self.hitbox.top_left.x < -bound
            || self.hitbox.top_left.y < -bound
            || self.hitbox.lower_right.x > bound
            || self.hitbox.lower_right.y > bound
    }

    /// Box test against an enemy bullet's hitbox.
    #[inline]
    #[must_use]
    pub fn collide(&self, bullet: &Bullet) -> bool {
        aabb_collide(&self.hitbox, &bullet.world_hitbox())
    }

    /// Damage dealt to `target`.
    #[inline]
    #[must_use]
    pub fn damage_against(&self, target: &Bullet) -> i32 {
        if target.flags.contains(BulletFlags::BOSS) {
            self.boss_damage
        } else {
            self.enemy_damage
        }
    }

    /// Where the sprite's top-left corner goes.
    #[inline]
    #[must_use]
    pub fn draw_position(&self) -> Vec2 {
        self.hitbox.top_left + self.draw_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bullet::BulletType;

    fn shot_type() -> PlayerBulletType {
        PlayerBulletType {
            hitbox: Aabb::new(Vec2::new(-2.0, -4.0), Vec2::new(2.0, 4.0)),
            enemy_damage: 3,
            boss_damage: 1,
            ..PlayerBulletType::default()
        }
    }

    #[test]
    fn test_spawn_offsets_hitbox() {
        let shot = PlayerBullet::spawn(&shot_type(), Vec2::new(10.0, 20.0), Launch::Rect(Vec2::ZERO));
        assert_eq!(shot.hitbox.top_left, Vec2::new(8.0, 16.0));
        assert_eq!(shot.hitbox.lower_right, Vec2::new(12.0, 24.0));
    }

    #[test]
    fn test_polar_launch() {
        let shot = PlayerBullet::spawn(
            &shot_type(),
            Vec2::ZERO,
            Launch::Polar {
                speed: 5.0,
                heading: -std::f32::consts::FRAC_PI_2,
            },
        );
        assert!(shot.velocity.x.abs() < 1e-5);
        assert!((shot.velocity.y + 5.0).abs() < 1e-5);
        assert!((shot.speed - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_expiry() {
        let mut shot = PlayerBullet::spawn(
            &shot_type(),
            Vec2::new(0.0, -390.0),
            Launch::Rect(Vec2::new(0.0, -5.0)),
        );
        assert!(!shot.expired(400.0));
        shot.advance();
        assert!(shot.expired(400.0));
    }

    #[test]
    fn test_collide_and_damage() {
        let enemy_type = BulletType {
            hitbox: Aabb::new(Vec2::new(-8.0, -8.0), Vec2::new(8.0, 8.0)),
            flags: BulletFlags::ENEMY,
            ..BulletType::default()
        };
        let mut enemy = Bullet::spawn(&enemy_type, Vec2::new(0.0, -30.0), Vec2::ZERO);
        let shot = PlayerBullet::spawn(&shot_type(), Vec2::new(0.0, -18.0), Launch::Rect(Vec2::ZERO));
        assert!(shot.collide(&enemy));
        assert_eq!(shot.damage_against(&enemy), 3);

        enemy.flags.insert(BulletFlags::BOSS);
        assert_eq!(shot.damage_against(&enemy), 1);

        enemy.position = Vec2::new(0.0, -40.0);
        assert!(!shot.collide(&enemy));
    }

    #[test]
    fn test_pierce_vs_block() {
        let mut flags = PlayerBulletFlags::default();
        flags.set_pierce(5);
        let mut target = BulletFlags::ENEMY;
        target.set_block(4);
        assert!(flags.pierces(target));
        target.set_block(5);
        assert!(!flags.pierces(target));
    }
}
