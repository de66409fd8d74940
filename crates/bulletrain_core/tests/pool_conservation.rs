//! # Pool Conservation Tests
//!
//! For every sequence of acquire/release operations, free + alive == capacity,
//! including under concurrent simulation and render threads.
//!
//! Run with: cargo test --test pool_conservation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bulletrain_core::{EntityPool, PoolSlot, SlotHandle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Clone, Debug, Default)]
struct Shot {
    alive: bool,
    owner: u32,
}

impl PoolSlot for Shot {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mark_alive(&mut self) {
        self.alive = true;
    }
}

fn shot(owner: u32) -> Shot {
    Shot {
        alive: false,
        owner,
    }
}

#[test]
fn random_sequences_conserve_slots() {
    for seed in 0..8u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pool: EntityPool<Shot> = EntityPool::new("shots", 64);
        let mut live: Vec<SlotHandle> = Vec::new();

        for step in 0..2_000u32 {
            match rng.gen_range(0..10) {
                0..=5 => {
                    if let Some(h) = pool.acquire(shot(step)) {
                        assert!(!live.contains(&h), "slot handed out twice");
                        live.push(h);
                    } else {
                        assert_eq!(live.len(), 64);
                    }
                }
                6..=8 if !live.is_empty() => {
                    let victim = live.swap_remove(rng.gen_range(0..live.len()));
                    assert!(pool.release(victim));
                }
                9 => {
                    pool.reset();
                    live.clear();
                }
                _ => {}
            }

            let stats = pool.stats();
            assert_eq!(stats.free + stats.alive, stats.capacity);
            assert_eq!(stats.alive, live.len());
        }
    }
}

#[test]
fn acquire_after_exhaustion_returns_none() {
    let pool: EntityPool<Shot> = EntityPool::new("shots", 16);
    for i in 0..16 {
        assert!(pool.acquire(shot(i)).is_some());
    }
    assert!(pool.acquire(shot(16)).is_none());
}

#[test]
fn concurrent_simulation_and_render() {
    let pool: Arc<EntityPool<Shot>> = Arc::new(EntityPool::new("shots", 256));
    let done = Arc::new(AtomicBool::new(false));

    let render = {
        let pool = Arc::clone(&pool);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut frames = 0u32;
            while !done.load(Ordering::Acquire) {
                let view = pool.read();
                assert_eq!(view.iter_all().count(), 256);
                frames += 1;
            }
            frames
        })
    };

    let spawners: Vec<_> = (0..4u32)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut mine = Vec::new();
                for i in 0..5_000u32 {
                    if let Some(h) = pool.acquire(shot(t * 10_000 + i)) {
                        mine.push(h);
                    }
                    if i % 3 == 0 {
                        if let Some(h) = mine.pop() {
                            assert!(pool.release(h));
                        }
                    }
                }
                for h in mine {
                    assert!(pool.release(h));
                }
            })
        })
        .collect();

    for s in spawners {
        s.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let _frames = render.join().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.alive, 0);
    assert_eq!(stats.free, 256);
}
