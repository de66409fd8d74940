//! # Pool Performance Benchmark
//!
//! REQUIREMENTS:
//! - Full 8192-slot bullet wave spawned and cleared well inside one 60 Hz frame
//! - Acquire/release O(1), no allocation
//!
//! Run with: `cargo bench --package bulletrain_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bulletrain_core::{sid, EntityPool, PoolSlot};

/// Default bullet pool size.
const BULLET_CAPACITY: usize = 8192;

#[derive(Clone, Copy, Default)]
struct BenchShot {
    alive: bool,
    pos: [f32; 2],
    vel: [f32; 2],
}

impl PoolSlot for BenchShot {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mark_alive(&mut self) {
        self.alive = true;
    }
}

/// Benchmark: Fill the pool, then release everything.
fn bench_fill_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_and_drain");

    for count in [1024, BULLET_CAPACITY] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let pool: EntityPool<BenchShot> = EntityPool::new("bench", count);
            let mut handles = Vec::with_capacity(count);
            b.iter(|| {
                for i in 0..count {
                    #[allow(clippy::cast_precision_loss)]
                    let x = i as f32;
                    if let Some(h) = pool.acquire_with(|| BenchShot {
                        alive: false,
                        pos: [x, 0.0],
                        vel: [0.0, 1.0],
                    }) {
                        handles.push(h);
                    }
                }
                for h in handles.drain(..) {
                    black_box(pool.release(h));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: One simulation step over a full pool with a write view.
fn bench_step_full_pool(c: &mut Criterion) {
    let pool: EntityPool<BenchShot> = EntityPool::new("bench", BULLET_CAPACITY);
    for _ in 0..BULLET_CAPACITY {
        let _ = pool.acquire(BenchShot {
            alive: false,
            pos: [0.0, 0.0],
            vel: [0.5, 0.25],
        });
    }

    c.bench_function("step_8192", |b| {
        b.iter(|| {
            let mut view = pool.write();
            for shot in view.iter_all_mut().filter(|s| s.alive) {
                shot.pos[0] += shot.vel[0];
                shot.pos[1] += shot.vel[1];
            }
            black_box(view.len())
        });
    });
}

/// Benchmark: Identifier hashing of typical resource names.
fn bench_sid(c: &mut Criterion) {
    c.bench_function("sid_resource_name", |b| {
        b.iter(|| black_box(sid(black_box(b"enemy_boss1.png"))));
    });
}

criterion_group!(benches, bench_fill_and_drain, bench_step_full_pool, bench_sid);
criterion_main!(benches);
