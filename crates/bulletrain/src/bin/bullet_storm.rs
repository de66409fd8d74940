//! # Bullet Storm
//!
//! Stress run: the clock drives a simulation thread firing seeded ring
//! patterns while a render thread reads the pools every frame.
//!
//! Usage: `bullet_storm [seconds] [seed]`

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bulletrain::{
    BulletFlags, BulletType, Engine, EngineConfig, Launch, PlayerBulletFlags, PlayerBulletType,
    StepReport,
};
use bulletrain_core::{Aabb, PoolSlot, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const RING_SIZE: usize = 48;
const RING_EVERY: u64 = 4;
const ENEMY_EVERY: u64 = 30;

#[derive(Default)]
struct Totals {
    ticks: u64,
    fired: u64,
    skipped: u64,
    released: u64,
    hits: u64,
    kills: u64,
    peak_alive: usize,
}

impl Totals {
    fn absorb(&mut self, report: StepReport) {
        self.ticks += 1;
        self.released += report.bullets_released as u64;
        self.hits += report.hits as u64;
        self.kills += report.enemies_killed as u64;
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(5);
    let seed: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0xB011_E7);

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         BULLETRAIN - BULLET STORM                                ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = EngineConfig::default();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bullets:            {:<8}                                     │", config.bullet_capacity);
    println!("│ Player Bullets:     {:<8}                                     │", config.player_bullet_capacity);
    println!("│ Enemies:            {:<8}                                     │", config.extended_capacity);
    println!("│ Tick Rate:          {:<4} Hz                                      │", config.tick_rate);
    println!("│ Duration:           {:<4} seconds                                 │", seconds);
    println!("│ Seed:               {:<#10x}                                   │", seed);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let engine = match Engine::shared(config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("Engine failed to start: {err}");
            std::process::exit(1);
        }
    };
    let clock = match engine.start_clock() {
        Ok(clock) => clock,
        Err(err) => {
            eprintln!("Clock failed to start: {err}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let frames = Arc::new(AtomicU64::new(0));

    let render = {
        let engine = Arc::clone(&engine);
        let running = Arc::clone(&running);
        let frames = Arc::clone(&frames);
        thread::spawn(move || {
            let mut checksum = 0.0f64;
            while running.load(Ordering::Acquire) {
                {
                    let bullets = engine.bullets().read();
                    for (_, bullet) in bullets.iter_alive() {
                        let at = bullet.draw_position();
                        checksum += f64::from(at.x + at.y);
                    }
                }
                {
                    let shots = engine.player_bullets().read();
                    for (_, shot) in shots.iter_alive() {
                        let at = shot.draw_position();
                        checksum += f64::from(at.x - at.y);
                    }
                }
                frames.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(16));
            }
            checksum
        })
    };

    let simulation = {
        let engine = Arc::clone(&engine);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let ring = BulletType {
                radius: 3.0,
                hitbox: Aabb::new(Vec2::new(-3.0, -3.0), Vec2::new(3.0, 3.0)),
                ..BulletType::default()
            };
            let enemy = BulletType {
                radius: 12.0,
                flags: BulletFlags::NO_COLLIDE,
                hitbox: Aabb::new(Vec2::new(-12.0, -12.0), Vec2::new(12.0, 12.0)),
                ..BulletType::default()
            };
            let shot = PlayerBulletType {
                hitbox: Aabb::new(Vec2::new(-2.0, -6.0), Vec2::new(2.0, 6.0)),
                flags: PlayerBulletFlags::from_bits(1),
                enemy_damage: 4,
                boss_damage: 1,
                ..PlayerBulletType::default()
            };

            let mut totals = Totals::default();
            while running.load(Ordering::Acquire) {
                let Some(tick) = clock.wait_pulse_timeout(Duration::from_millis(100)) else {
                    continue;
                };

                if tick % RING_EVERY == 0 {
                    let center = Vec2::new(rng.gen_range(-150.0..150.0), rng.gen_range(-150.0..0.0));
                    let speed = rng.gen_range(1.0..4.0);
                    let phase = rng.gen_range(0.0..TAU);
                    for i in 0..RING_SIZE {
                        let heading = phase + TAU * i as f32 / RING_SIZE as f32;
                        match engine.fire(&ring, center, Vec2::from_polar(speed, heading)) {
                            Some(_) => totals.fired += 1,
                            None => totals.skipped += 1,
                        }
                    }
                }
                if tick % ENEMY_EVERY == 0 {
                    let at = Vec2::new(rng.gen_range(-300.0..300.0), -350.0);
                    if engine
                        .spawn_enemy(&enemy, at, Vec2::new(0.0, 1.5), 40)
                        .is_none()
                    {
                        totals.skipped += 1;
                    }
                }
                let x = rng.gen_range(-300.0..300.0);
                let _ = engine.fire_player(
                    &shot,
                    Vec2::new(x, 380.0),
                    Launch::Polar {
                        speed: 8.0,
                        heading: -TAU / 4.0,
                    },
                );

                totals.absorb(engine.step());
                totals.peak_alive = totals.peak_alive.max(engine.bullets().alive_count());
            }
            totals
        })
    };

    let start = Instant::now();
    thread::sleep(Duration::from_secs(seconds));
    running.store(false, Ordering::Release);

    let totals = simulation.join().unwrap_or_default();
    let checksum = render.join().unwrap_or_default();
    let elapsed = start.elapsed();

    let bullets = engine.bullets().stats();
    let shots = engine.player_bullets().stats();
    let enemies = engine.enemies().stats();
    let still_alive = engine
        .bullets()
        .read()
        .iter_all()
        .filter(|b| b.is_alive())
        .count();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    STORM RESULTS                                 ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Elapsed:            {elapsed:.2?}");
    println!("  Ticks:              {}", totals.ticks);
    println!("  Frames rendered:    {}", frames.load(Ordering::Relaxed));
    println!("  Bullets fired:      {}", totals.fired);
    println!("  Spawns skipped:     {}", totals.skipped);
    println!("  Bullets released:   {}", totals.released);
    println!("  Peak alive:         {}", totals.peak_alive);
    println!("  Hits / kills:       {} / {}", totals.hits, totals.kills);
    println!("  Render checksum:    {checksum:.1}");
    println!();
    println!("  Pool          capacity     free    alive");
    for (name, stats) in [("bullets", bullets), ("player", shots), ("enemies", enemies)] {
        println!(
            "  {name:<12} {:>9} {:>8} {:>8}",
            stats.capacity, stats.free, stats.alive
        );
    }
    println!();

    let conserved = [bullets, shots, enemies]
        .iter()
        .all(|s| s.free + s.alive == s.capacity);
    engine.stop();

    if conserved && still_alive == bullets.alive {
        println!("✅ Pools conserved");
    } else {
        println!("❌ Pool accounting broken");
        std::process::exit(1);
    }
}
