//! # Engine Context
//!
//! Owns every pool, the archive cache, the type registry and the clock.
//! Share it between threads with an `Arc<Engine>`.
//!
//! ```text
//!            ┌──────────── Engine ─────────────┐
//!  sim  ───► │ bullets (write)   types         │ ◄─── script bridge
//!            │ player bullets    assets        │
//!  render ─► │ enemies (read)    clock ────────┼───► pulses
//!            └─────────────────────────────────┘
//! ```
//!
//! ## Lock order
//!
//! bullets → player bullets → enemies. Every path that holds more than one
//! pool view takes them in this order.

use std::sync::Arc;

use bulletrain_assets::ArchiveCache;
use bulletrain_core::{EntityPool, PoolSlot, PoolWriteView, SlotHandle, Vec2};
use parking_lot::Mutex;

use crate::bullet::{Bullet, BulletFlags, BulletType, PlayField};
use crate::config::EngineConfig;
use crate::enemy::EnemyData;
use crate::error::{EngineError, EngineResult};
use crate::player::{Launch, PlayerBullet, PlayerBulletType};
use crate::script::ScriptContext;
use crate::timer::{Clock, ClockHandle};
use crate::types::TypeRegistry;

/// How far up a chain of anchored bullets a displacement is followed.
const MAX_ANCHOR_DEPTH: usize = 8;

/// What one simulation step did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Bullets moved.
    pub bullets_moved: usize,
    /// Bullets released (out of bounds or killed).
    pub bullets_released: usize,
    /// Player bullets released (out of bounds or spent on a hit).
    pub player_bullets_released: usize,
    /// Player bullet hits on enemies.
    pub hits: usize,
    /// Enemies whose hit points ran out this step.
    pub enemies_killed: usize,
}

/// The engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    field: PlayField,
    bullets: EntityPool<Bullet>,
    player_bullets: EntityPool<PlayerBullet>,
    enemies: EntityPool<EnemyData>,
    assets: ArchiveCache,
    types: TypeRegistry,
    clock: Mutex<Option<Clock>>,
}

impl Engine {
    /// Validates `config` and builds every subsystem: pools first, then the
    /// archive cache, then the type registry. The clock is started
    /// separately with [`Engine::start_clock`].
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] if `config` does not validate.
    pub fn init(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        tracing::info!(
            bullets = config.bullet_capacity,
            player_bullets = config.player_bullet_capacity,
            enemies = config.extended_capacity,
            assets = %config.asset_root.display(),
            "Initializing engine"
        );

        let bullets = EntityPool::new("bullets", config.bullet_capacity);
        let player_bullets = EntityPool::new("player_bullets", config.player_bullet_capacity);
        let enemies = EntityPool::new("enemies", config.extended_capacity);
        let assets =
            ArchiveCache::with_table_size(config.asset_root.clone(), config.resource_table_size);
        let types = TypeRegistry::new(config.max_bullet_types);

        Ok(Self {
            field: PlayField::from_config(&config),
            config,
            bullets,
            player_bullets,
            enemies,
            assets,
            types,
            clock: Mutex::new(None),
        })
    }

    /// Convenience for `Arc::new(Engine::init(config)?)`.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::init`].
    pub fn shared(config: EngineConfig) -> EngineResult<Arc<Self>> {
        Self::init(config).map(Arc::new)
    }

    /// The configuration the engine was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Play-field bounds.
    #[inline]
    #[must_use]
    pub fn field(&self) -> &PlayField {
        &self.field
    }

    /// Enemy bullet pool.
    #[inline]
    #[must_use]
    pub fn bullets(&self) -> &EntityPool<Bullet> {
        &self.bullets
    }

    /// Player bullet pool.
    #[inline]
    #[must_use]
    pub fn player_bullets(&self) -> &EntityPool<PlayerBullet> {
        &self.player_bullets
    }

    /// Enemy data pool.
    #[inline]
    #[must_use]
    pub fn enemies(&self) -> &EntityPool<EnemyData> {
        &self.enemies
    }

    /// Archive cache.
    #[inline]
    #[must_use]
    pub fn assets(&self) -> &ArchiveCache {
        &self.assets
    }

    /// Bullet type registry.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// A script bridge with no bullet in context.
    #[must_use]
    pub fn script(&self) -> ScriptContext<'_> {
        ScriptContext::new(self)
    }

    /// Starts the clock if it is not running and returns a handle to it.
    ///
    /// # Errors
    ///
    /// [`EngineError::Clock`] if the thread cannot be spawned.
    pub fn start_clock(&self) -> EngineResult<ClockHandle> {
        let mut clock = self.clock.lock();
        if let Some(running) = clock.as_ref() {
            return Ok(running.handle());
        }
        let started = Clock::start(self.config.tick_rate, self.config.timer_backlog)
            .map_err(EngineError::Clock)?;
        let handle = started.handle();
        *clock = Some(started);
        Ok(handle)
    }

    /// Handle to the running clock, if any.
    #[must_use]
    pub fn clock(&self) -> Option<ClockHandle> {
        self.clock.lock().as_ref().map(Clock::handle)
    }

    /// Fires a bullet. `None` if the pool is full.
    pub fn fire(&self, ty: &BulletType, at: Vec2, velocity: Vec2) -> Option<SlotHandle> {
        self.bullets
            .acquire_with(|| Bullet::spawn(ty, at, velocity))
    }

    /// Fires a player bullet. `None` if the pool is full.
    pub fn fire_player(
        &self,
        ty: &PlayerBulletType,
        at: Vec2,
        launch: Launch,
    ) -> Option<SlotHandle> {
        self.player_bullets
            .acquire_with(|| PlayerBullet::spawn(ty, at, launch))
    }

    /// Spawns an enemy: a bullet flagged `ENEMY` with an enemy data slot.
    ///
    /// `None` if either pool is full; nothing is left acquired in that case.
    pub fn spawn_enemy(
        &self,
        ty: &BulletType,
        at: Vec2,
        velocity: Vec2,
        hp: i32,
    ) -> Option<SlotHandle> {
        let data = self.enemies.acquire(EnemyData::new(hp))?;
        let bullet = self.bullets.acquire_with(|| {
            let mut bullet = Bullet::spawn(ty, at, velocity);
            bullet.flags.insert(BulletFlags::ENEMY);
            bullet.extended = Some(data);
            bullet
        });
        if bullet.is_none() {
            self.enemies.release(data);
        }
        bullet
    }

    /// Releases a bullet along with its enemy data.
    pub fn release_bullet(&self, handle: SlotHandle) -> bool {
        let mut bullets = self.bullets.write();
        let mut enemies = self.enemies.write();
        let extended = bullets.get(handle.index()).ok().and_then(|b| b.extended);
        let released = bullets.release(handle);
        if released {
            if let Some(data) = extended {
                enemies.release(data);
            }
            unlink_orphans(&mut bullets);
        }
        released
    }

    /// Runs one simulation tick.
    ///
    /// 1. Every bullet moves by its velocity, plus its parent's if anchored.
    /// 2. Every player bullet moves.
    /// 3. Player bullets hit enemies: damage is applied and the player
    ///    bullet is spent unless its pierce level beats the enemy's block.
    /// 4. Out-of-bounds and killed bullets are released with their enemy
    ///    data; expired and spent player bullets are released.
    pub fn step(&self) -> StepReport {
        let mut report = StepReport::default();
        let mut bullets = self.bullets.write();
        let mut shots = self.player_bullets.write();
        let mut enemies = self.enemies.write();

        for index in 0..bullets.len() {
            if !bullets[index].is_alive() {
                continue;
            }
            let displacement = displacement(&bullets, index);
            if let Ok(bullet) = bullets.get_mut(index) {
                bullet.advance(displacement);
                bullet.refresh_polar();
                report.bullets_moved += 1;
            }
        }

        let bound = self.field.bound;
        for shot in shots.iter_all_mut() {
            if shot.is_alive() {
                shot.advance();
            }
        }

        for s in 0..shots.len() {
            if !shots[s].is_alive() || shots[s].expired(bound) {
                continue;
            }
            for b in 0..bullets.len() {
                let target = &bullets[b];
                if !target.is_alive()
                    || !target.flags.contains(BulletFlags::ENEMY)
                    || target.flags.contains(BulletFlags::KILL_ME)
                    || !shots[s].collide(target)
                {
                    continue;
                }

                report.hits += 1;
                let damage = shots[s].damage_against(target);
                let pierces = shots[s].flags.pierces(target.flags);
                let fatal = match target.extended {
                    Some(data) => enemies
                        .get_mut(data.index())
                        .map_or(true, |enemy| enemy.damage(damage)),
                    None => true,
                };
                if fatal {
                    if let Ok(target) = bullets.get_mut(b) {
                        target.kill();
                    }
                    report.enemies_killed += 1;
                }
                if !pierces {
                    if let Ok(handle) = shots.handle(s) {
                        shots.release(handle);
                        report.player_bullets_released += 1;
                    }
                    break;
                }
            }
        }

        let field = self.field;
        report.bullets_released =
            release_bullets_where(&mut bullets, &mut enemies, |b| b.expired(&field));
        report.player_bullets_released += shots.release_where(|_, shot| shot.expired(bound));

        report
    }

    /// First alive, collidable bullet overlapping a circle.
    #[must_use]
    pub fn player_hit(&self, point: Vec2, radius: f32) -> Option<SlotHandle> {
        self.bullets
            .read()
            .iter_alive()
            .find(|(_, bullet)| bullet.collides_with_player() && bullet.collide(point, radius))
            .map(|(handle, _)| handle)
    }

    /// Kills everything: every pool goes back to its initial state.
    pub fn clear_all(&self) {
        self.bullets.reset();
        self.player_bullets.reset();
        self.enemies.reset();
    }

    /// Tears down in reverse order: clock, pools, types, archives.
    pub fn stop(&self) {
        if let Some(mut clock) = self.clock.lock().take() {
            clock.stop();
        }
        self.clear_all();
        self.types.clear();
        self.assets.shutdown();
        tracing::info!("Engine stopped");
    }
}

/// Own velocity plus the velocity of every anchored ancestor.
fn displacement(slots: &[Bullet], index: usize) -> Vec2 {
    let mut current = &slots[index];
    let mut total = current.velocity;
    for _ in 0..MAX_ANCHOR_DEPTH {
        if !current.flags.contains(BulletFlags::ANCHOR_PARENT) {
            break;
        }
        let Some(parent) = current
            .parent
            .and_then(|handle| slots.get(handle.index()))
            .filter(|parent| parent.is_alive())
        else {
            break;
        };
        total += parent.velocity;
        current = parent;
    }
    total
}

/// Drops parent links that point at dead slots, so a reused slot is never
/// mistaken for the old parent.
pub(crate) fn unlink_orphans(bullets: &mut PoolWriteView<'_, Bullet>) {
    for index in 0..bullets.len() {
        let orphaned = bullets[index].is_alive()
            && bullets[index]
                .parent
                .is_some_and(|parent| bullets.get(parent.index()).map_or(true, |p| !p.is_alive()));
        if orphaned {
            if let Ok(bullet) = bullets.get_mut(index) {
                bullet.parent = None;
            }
        }
    }
}

/// Releases every alive bullet matching `expired`, with its enemy data, then
/// unlinks orphans.
pub(crate) fn release_bullets_where<F>(
    bullets: &mut PoolWriteView<'_, Bullet>,
    enemies: &mut PoolWriteView<'_, EnemyData>,
    mut expired: F,
) -> usize
where
    F: FnMut(&Bullet) -> bool,
{
    let released = bullets.release_where(|_, bullet| {
        let gone = expired(bullet);
        if gone {
            if let Some(data) = bullet.extended {
                enemies.release(data);
            }
        }
        gone
    });
    if released > 0 {
        unlink_orphans(bullets);
    }
    released
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Engine {
        Engine::init(EngineConfig {
            bullet_capacity: 16,
            player_bullet_capacity: 8,
            extended_capacity: 4,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let config = EngineConfig {
            bullet_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::init(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_step_moves_and_releases() {
        let engine = small();
        let ty = BulletType::default();
        let inside = engine.fire(&ty, Vec2::ZERO, Vec2::new(1.0, 0.0)).unwrap();
        let leaving = engine
            .fire(&ty, Vec2::new(399.5, 0.0), Vec2::new(1.0, 0.0))
            .unwrap();

        let report = engine.step();
        assert_eq!(report.bullets_moved, 2);
        assert_eq!(report.bullets_released, 1);

        let bullets = engine.bullets().read();
        assert_eq!(bullets[inside.index()].position, Vec2::new(1.0, 0.0));
        assert!(!bullets[leaving.index()].is_alive());
    }

    #[test]
    fn test_anchored_bullet_follows_parent() {
        let engine = small();
        let parent = engine
            .fire(&BulletType::default(), Vec2::ZERO, Vec2::new(2.0, 0.0))
            .unwrap();
        let child_type = BulletType {
            flags: BulletFlags::ANCHOR_PARENT,
            ..BulletType::default()
        };
        let child = engine
            .fire(&child_type, Vec2::new(0.0, 10.0), Vec2::new(0.0, 1.0))
            .unwrap();
        engine.bullets().write().get_mut(child.index()).unwrap().parent = Some(parent);

        engine.step();
        assert_eq!(
            engine.bullets().read()[child.index()].position,
            Vec2::new(2.0, 11.0)
        );

        // Parent gone: link dropped, child keeps its own velocity
        assert!(engine.release_bullet(parent));
        assert!(engine.bullets().read()[child.index()].parent.is_none());
        engine.step();
        assert_eq!(
            engine.bullets().read()[child.index()].position,
            Vec2::new(2.0, 12.0)
        );
    }

    #[test]
    fn test_spawn_enemy_rolls_back_when_bullets_full() {
        let engine = Engine::init(EngineConfig {
            bullet_capacity: 1,
            extended_capacity: 4,
            ..EngineConfig::default()
        })
        .unwrap();
        let ty = BulletType::default();
        assert!(engine.fire(&ty, Vec2::ZERO, Vec2::ZERO).is_some());
        assert!(engine.spawn_enemy(&ty, Vec2::ZERO, Vec2::ZERO, 5).is_none());
        assert_eq!(engine.enemies().free_count(), 4);
    }

    #[test]
    fn test_player_hit_skips_no_collide() {
        let engine = small();
        let ghost = BulletType {
            radius: 5.0,
            flags: BulletFlags::NO_COLLIDE,
            ..BulletType::default()
        };
        let solid = BulletType {
            radius: 5.0,
            ..BulletType::default()
        };
        engine.fire(&ghost, Vec2::ZERO, Vec2::ZERO).unwrap();
        assert!(engine.player_hit(Vec2::new(1.0, 1.0), 2.0).is_none());

        let hit = engine.fire(&solid, Vec2::ZERO, Vec2::ZERO).unwrap();
        assert_eq!(engine.player_hit(Vec2::new(1.0, 1.0), 2.0), Some(hit));
        assert!(engine.player_hit(Vec2::new(100.0, 0.0), 2.0).is_none());
    }

    #[test]
    fn test_stop_clears_everything() {
        let engine = small();
        engine.fire(&BulletType::default(), Vec2::ZERO, Vec2::ZERO);
        engine.types().register(0, BulletType::default()).unwrap();
        engine.start_clock().unwrap();

        engine.stop();
        assert_eq!(engine.bullets().alive_count(), 0);
        assert_eq!(engine.types().registered(), 0);
        assert!(engine.clock().is_none());
    }
}
