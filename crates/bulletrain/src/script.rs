//! # Script Bridge
//!
//! The functions a stage script calls. Scripts address bullets by index and
//! may pass anything, so every index is checked against the pool and the
//! registry before it is used. A bad index is a [`ScriptError`], never a
//! silent no-op.
//!
//! "Self" functions act on the context bullet, the one whose script is
//! running. Stage scripts run with no context and get
//! [`ScriptError::NoContext`] if they call one.
//!
//! Each call takes the pool views it needs for its own duration only, so a
//! script interleaves freely with rendering.

use std::sync::Arc;

use bulletrain_assets::Resource;
use bulletrain_core::{Aabb, PoolSlot, Vec2};

use crate::bullet::{Bullet, BulletFlags, BulletType};
use crate::engine::{release_bullets_where, Engine};
use crate::error::{ScriptError, ScriptResult};
use crate::types::{Sprite, SpriteRegion};

/// Arguments of a type registration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeSpec {
    /// Collision radius.
    pub radius: f32,
    /// Raw engine flags.
    pub flags: u32,
    /// Game flags.
    pub game_flags: u32,
    /// Hitbox relative to the center.
    pub hitbox: Aabb,
    /// Sprite offset from the center.
    pub draw_offset: Vec2,
    /// Archive holding the sprite sheet.
    pub archive: String,
    /// Sprite sheet resource.
    pub resource: String,
    /// Sprite rectangle on the sheet.
    pub region: SpriteRegion,
    /// Optional behavior script in the same archive.
    pub script: Option<String>,
}

/// Script-facing view of an engine.
#[derive(Debug)]
pub struct ScriptContext<'e> {
    engine: &'e Engine,
    context: Option<usize>,
}

impl<'e> ScriptContext<'e> {
    /// A bridge with no bullet in context.
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            context: None,
        }
    }

    /// The engine this bridge drives.
    #[must_use]
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    fn bullet_index(&self, id: i64) -> ScriptResult<usize> {
        let capacity = self.engine.bullets().capacity();
        usize::try_from(id)
            .ok()
            .filter(|&index| index < capacity)
            .ok_or(ScriptError::BulletOutOfRange {
                index: id,
                capacity,
            })
    }

    fn context_index(&self) -> ScriptResult<usize> {
        self.context.ok_or(ScriptError::NoContext)
    }

    fn with_bullet<R>(&self, index: usize, f: impl FnOnce(&mut Bullet) -> R) -> ScriptResult<R> {
        let mut bullets = self.engine.bullets().write();
        Ok(f(bullets.get_mut(index)?))
    }

    fn read_bullet<R>(&self, index: usize, f: impl FnOnce(&Bullet) -> R) -> ScriptResult<R> {
        let pool = self.engine.bullets();
        let handle = pool.handle(index)?;
        Ok(f(&pool.read()[handle.index()]))
    }

    // ---------------------------------------------------------------------
    // Script runner support
    // ---------------------------------------------------------------------

    /// Sets the context bullet, or clears it with `None`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn set_bullet_context(&mut self, id: Option<i64>) -> ScriptResult<()> {
        self.context = id.map(|id| self.bullet_index(id)).transpose()?;
        Ok(())
    }

    /// The context bullet's index.
    #[must_use]
    pub fn bullet_context(&self) -> Option<usize> {
        self.context
    }

    /// True if the bullet's slot is dead.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn is_bullet_dead(&self, id: i64) -> ScriptResult<bool> {
        let index = self.bullet_index(id)?;
        self.read_bullet(index, |b| !b.is_alive())
    }

    /// Releases every kill-flagged bullet. Returns how many were released.
    pub fn kill_bullets(&self) -> usize {
        let mut bullets = self.engine.bullets().write();
        let mut enemies = self.engine.enemies().write();
        release_bullets_where(&mut bullets, &mut enemies, |b| {
            b.flags.contains(BulletFlags::KILL_ME)
        })
    }

    // ---------------------------------------------------------------------
    // Bullet types
    // ---------------------------------------------------------------------

    /// Registers a bullet type, loading its archive and cutting its sprite.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] for a bad index,
    /// [`ScriptError::Asset`] if the archive fails to load,
    /// [`ScriptError::MissingResource`] if a named resource is absent and
    /// [`ScriptError::NotAnImage`] if the sprite cannot be cut.
    pub fn register_type(&self, index: i64, spec: &TypeSpec) -> ScriptResult<()> {
        let types = self.engine.types();
        types.check_index(index)?;

        let assets = self.engine.assets();
        assets.load_arc(&spec.archive)?;
        let fetch = |resource: &str| -> ScriptResult<Arc<Resource>> {
            assets
                .get_res(&spec.archive, resource)?
                .ok_or_else(|| ScriptError::MissingResource {
                    archive: spec.archive.clone(),
                    resource: resource.to_owned(),
                })
        };

        let sheet = fetch(&spec.resource)?;
        let sprite = Sprite::cut(sheet, spec.region).ok_or_else(|| ScriptError::NotAnImage {
            archive: spec.archive.clone(),
            resource: spec.resource.clone(),
        })?;
        let script = spec.script.as_deref().map(fetch).transpose()?;

        types.register(
            index,
            BulletType {
                radius: spec.radius,
                sprite: Some(Arc::new(sprite)),
                flags: BulletFlags::from_bits(spec.flags),
                game_flags: spec.game_flags,
                script,
                hitbox: spec.hitbox,
                draw_offset: spec.draw_offset,
            },
        )
    }

    /// Unregisters a bullet type. Bullets already fired keep their sprite.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] for a bad index.
    pub fn unregister_type(&self, index: i64) -> ScriptResult<()> {
        self.engine.types().unregister(index).map(|_| ())
    }

    /// Unregisters every bullet type.
    pub fn clear_types(&self) {
        self.engine.types().clear();
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Fires a bullet of a registered type. Returns its index, or `None` if
    /// the pool is full.
    ///
    /// A type flagged `ANCHOR_PARENT` is anchored to the context bullet,
    /// if that bullet is alive.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] or [`ScriptError::TypeNotRegistered`].
    pub fn fire_bullet(
        &self,
        type_index: i64,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
    ) -> ScriptResult<Option<usize>> {
        let ty = self.engine.types().get(type_index)?;
        let parent = match self.context {
            Some(index) if ty.flags.contains(BulletFlags::ANCHOR_PARENT) => {
                let alive = self.read_bullet(index, Bullet::is_alive)?;
                if alive {
                    Some(self.engine.bullets().handle(index)?)
                } else {
                    None
                }
            }
            _ => None,
        };
        let handle = self.engine.bullets().acquire_with(|| {
            let mut bullet = Bullet::spawn(&ty, Vec2::new(x, y), Vec2::new(vx, vy));
            bullet.parent = parent;
            bullet
        });
        Ok(handle.map(|h| h.index()))
    }

    /// Spawns an enemy of a registered type with `hp` hit points. Returns
    /// its index, or `None` if a pool is full.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] or [`ScriptError::TypeNotRegistered`].
    pub fn create_enemy(
        &self,
        type_index: i64,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        hp: i32,
    ) -> ScriptResult<Option<usize>> {
        let ty = self.engine.types().get(type_index)?;
        let handle = self
            .engine
            .spawn_enemy(&ty, Vec2::new(x, y), Vec2::new(vx, vy), hp);
        Ok(handle.map(|h| h.index()))
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Velocity of the context bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::NoContext`] outside a bullet script.
    pub fn get_velocity_self(&self) -> ScriptResult<Vec2> {
        let index = self.context_index()?;
        self.read_bullet(index, |b| b.velocity)
    }

    /// Velocity of any bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn get_velocity_other(&self, id: i64) -> ScriptResult<Vec2> {
        let index = self.bullet_index(id)?;
        self.read_bullet(index, |b| b.velocity)
    }

    /// Position of any bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn get_position(&self, id: i64) -> ScriptResult<Vec2> {
        let index = self.bullet_index(id)?;
        self.read_bullet(index, |b| b.position)
    }

    /// Raw engine flags of any bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn get_flags(&self, id: i64) -> ScriptResult<u32> {
        let index = self.bullet_index(id)?;
        self.read_bullet(index, |b| b.flags.bits())
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Multiplies the context bullet's velocity and speed by `scale`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::NoContext`] outside a bullet script.
    pub fn accelerate_self_by_scale(&self, scale: f32) -> ScriptResult<()> {
        let index = self.context_index()?;
        self.with_bullet(index, |b| b.scale_velocity(scale))
    }

    /// Multiplies a bullet's velocity and speed by `scale`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn accelerate_other_by_scale(&self, id: i64, scale: f32) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, |b| b.scale_velocity(scale))
    }

    /// Adds `(ax, ay)` to the context bullet's velocity.
    ///
    /// # Errors
    ///
    /// [`ScriptError::NoContext`] outside a bullet script.
    pub fn accelerate_self_by_rect(&self, ax: f32, ay: f32) -> ScriptResult<()> {
        let index = self.context_index()?;
        self.with_bullet(index, |b| accelerate(b, ax, ay))
    }

    /// Adds `(ax, ay)` to a bullet's velocity.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn accelerate_other_by_rect(&self, id: i64, ax: f32, ay: f32) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, |b| accelerate(b, ax, ay))
    }

    /// Sets the context bullet's velocity.
    ///
    /// # Errors
    ///
    /// [`ScriptError::NoContext`] outside a bullet script.
    pub fn set_velocity_self(&self, vx: f32, vy: f32) -> ScriptResult<()> {
        let index = self.context_index()?;
        self.with_bullet(index, |b| set_velocity(b, vx, vy))
    }

    /// Sets a bullet's velocity.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn set_velocity_other(&self, id: i64, vx: f32, vy: f32) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, |b| set_velocity(b, vx, vy))
    }

    /// Moves a bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn set_position(&self, id: i64, x: f32, y: f32) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, |b| b.position = Vec2::new(x, y))
    }

    /// Replaces a bullet's engine flags. The alive bit cannot be changed
    /// this way, and a dead slot is left untouched.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn set_flags(&self, id: i64, bits: u32) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, |b| b.set_flags(BulletFlags::from_bits(bits)))
    }

    // ---------------------------------------------------------------------
    // Killing
    // ---------------------------------------------------------------------

    /// Kill-flags every alive bullet except the context bullet. Returns how
    /// many were flagged.
    pub fn clear_bullets(&self) -> usize {
        let context = self.context;
        let mut bullets = self.engine.bullets().write();
        let mut flagged = 0;
        for (index, bullet) in bullets.iter_all_mut().enumerate() {
            if bullet.is_alive() && Some(index) != context {
                bullet.kill();
                flagged += 1;
            }
        }
        flagged
    }

    /// Kill-flags the context bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::NoContext`] outside a bullet script.
    pub fn kill_me(&self) -> ScriptResult<()> {
        let index = self.context_index()?;
        self.with_bullet(index, Bullet::kill)
    }

    /// Kill-flags any bullet.
    ///
    /// # Errors
    ///
    /// [`ScriptError::BulletOutOfRange`] for a bad index.
    pub fn kill_other(&self, id: i64) -> ScriptResult<()> {
        let index = self.bullet_index(id)?;
        self.with_bullet(index, Bullet::kill)
    }
}

fn accelerate(bullet: &mut Bullet, ax: f32, ay: f32) {
    bullet.velocity += Vec2::new(ax, ay);
    bullet.invalidate_polar();
}

fn set_velocity(bullet: &mut Bullet, vx: f32, vy: f32) {
    bullet.velocity = Vec2::new(vx, vy);
    bullet.invalidate_polar();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> Engine {
        Engine::init(EngineConfig {
            bullet_capacity: 8,
            extended_capacity: 4,
            max_bullet_types: 4,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_bounds_checked() {
        let engine = engine();
        let mut script = engine.script();
        for bad in [-1, 8, i64::MIN] {
            assert!(matches!(
                script.is_bullet_dead(bad),
                Err(ScriptError::BulletOutOfRange { capacity: 8, .. })
            ));
            assert!(script.set_velocity_other(bad, 1.0, 1.0).is_err());
            assert!(script.kill_other(bad).is_err());
            assert!(script.set_bullet_context(Some(bad)).is_err());
        }
        assert!(script.is_bullet_dead(7).unwrap());
    }

    #[test]
    fn test_self_functions_need_context() {
        let engine = engine();
        let script = engine.script();
        assert!(matches!(
            script.get_velocity_self(),
            Err(ScriptError::NoContext)
        ));
        assert!(matches!(script.kill_me(), Err(ScriptError::NoContext)));
        assert!(matches!(
            script.accelerate_self_by_scale(2.0),
            Err(ScriptError::NoContext)
        ));
    }

    #[test]
    fn test_velocity_functions() {
        let engine = engine();
        engine.types().register(0, BulletType::default()).unwrap();
        let mut script = engine.script();

        let id = script.fire_bullet(0, 0.0, 0.0, 3.0, 4.0).unwrap().unwrap();
        let id = i64::try_from(id).unwrap();
        script.set_bullet_context(Some(id)).unwrap();

        script.accelerate_self_by_scale(2.0).unwrap();
        assert_eq!(script.get_velocity_self().unwrap(), Vec2::new(6.0, 8.0));
        let speed = engine.bullets().read()[0].speed;
        assert!((speed - 10.0).abs() < 1e-5);

        script.accelerate_other_by_rect(id, 1.0, 0.0).unwrap();
        assert_eq!(script.get_velocity_other(id).unwrap(), Vec2::new(7.0, 8.0));
        assert_ne!(script.get_flags(id).unwrap() & BulletFlags::P_INVALID.bits(), 0);

        script.set_velocity_self(0.0, -1.0).unwrap();
        assert_eq!(script.get_velocity_other(id).unwrap(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_clear_bullets_spares_context() {
        let engine = engine();
        engine.types().register(1, BulletType::default()).unwrap();
        let mut script = engine.script();
        for _ in 0..4 {
            script.fire_bullet(1, 0.0, 0.0, 0.0, 0.0).unwrap().unwrap();
        }
        script.set_bullet_context(Some(2)).unwrap();

        assert_eq!(script.clear_bullets(), 3);
        assert_eq!(script.kill_bullets(), 3);
        assert!(!script.is_bullet_dead(2).unwrap());
        assert!(script.is_bullet_dead(0).unwrap());
        // Dead slots stay clean
        assert_eq!(script.get_flags(5).unwrap(), 0);
    }

    #[test]
    fn test_kill_other_and_flags() {
        let engine = engine();
        engine.types().register(0, BulletType::default()).unwrap();
        let script = engine.script();
        let fired = script.fire_bullet(0, 1.0, 2.0, 0.0, 0.0).unwrap().unwrap();
        let id = i64::try_from(fired).unwrap();

        script.set_position(id, 5.0, 6.0).unwrap();
        assert_eq!(script.get_position(id).unwrap(), Vec2::new(5.0, 6.0));

        script.set_flags(id, BulletFlags::WIDE_STOP.bits()).unwrap();
        assert!(!script.is_bullet_dead(id).unwrap());

        script.kill_other(id).unwrap();
        assert_eq!(script.kill_bullets(), 1);
        assert!(script.is_bullet_dead(id).unwrap());
    }

    #[test]
    fn test_fire_unregistered_type() {
        let engine = engine();
        let script = engine.script();
        assert!(matches!(
            script.fire_bullet(3, 0.0, 0.0, 0.0, 0.0),
            Err(ScriptError::TypeNotRegistered(3))
        ));
        assert!(matches!(
            script.fire_bullet(4, 0.0, 0.0, 0.0, 0.0),
            Err(ScriptError::TypeOutOfRange { .. })
        ));
        assert!(script.unregister_type(4).is_err());
    }

    #[test]
    fn test_anchor_needs_live_context() {
        let engine = engine();
        engine.types().register(0, BulletType::default()).unwrap();
        engine
            .types()
            .register(
                1,
                BulletType {
                    flags: BulletFlags::ANCHOR_PARENT,
                    ..BulletType::default()
                },
            )
            .unwrap();
        let mut script = engine.script();
        let parent = script.fire_bullet(0, 0.0, 0.0, 0.0, 0.0).unwrap().unwrap();
        let parent_id = i64::try_from(parent).unwrap();
        script.set_bullet_context(Some(parent_id)).unwrap();

        let child = script.fire_bullet(1, 0.0, 0.0, 0.0, 0.0).unwrap().unwrap();
        assert_eq!(
            engine.bullets().read()[child].parent.map(|h| h.index()),
            Some(parent)
        );

        script.kill_other(parent_id).unwrap();
        script.kill_bullets();
        assert!(script.is_bullet_dead(parent_id).unwrap());

        let orphan = script.fire_bullet(1, 0.0, 0.0, 0.0, 0.0).unwrap().unwrap();
        assert!(engine.bullets().read()[orphan].parent.is_none());
    }

    #[test]
    fn test_create_enemy_links_data() {
        let engine = engine();
        engine.types().register(0, BulletType::default()).unwrap();
        let script = engine.script();
        let id = script.create_enemy(0, 0.0, 0.0, 0.0, 0.0, 12).unwrap().unwrap();

        let data = engine.bullets().read()[id].extended.unwrap();
        assert_eq!(engine.enemies().read()[data.index()].hp, 12);

        let id = i64::try_from(id).unwrap();
        assert_ne!(script.get_flags(id).unwrap() & BulletFlags::ENEMY.bits(), 0);
        script.kill_other(id).unwrap();
        script.kill_bullets();
        assert_eq!(engine.enemies().alive_count(), 0);
    }
}
