/*!
 * Bakery Lock Benchmarks
 *
 * Critical-section entry cost with and without contention, and the cost of a
 * state manager snapshot
 */

use bakery_sim::{BakeryLock, ProcessRecord, SpinConfig, StateManager};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock");

    for registered in [1u64, 8, 32] {
        let lock = BakeryLock::new(64);
        for id in 1..=registered {
            lock.register(id).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(registered),
            &lock,
            |b, lock| {
                b.iter(|| {
                    let ticket = lock.lock(black_box(1)).unwrap();
                    black_box(ticket.number());
                });
            },
        );
    }

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_lock");
    group.measurement_time(Duration::from_secs(3));

    for contenders in [1u64, 2, 4] {
        let lock = Arc::new(BakeryLock::with_spin(16, SpinConfig::low_latency()));
        lock.register(1).unwrap();
        let stop = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let id = 100 + i;
                lock.register(id).unwrap();
                let lock = Arc::clone(&lock);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let _ticket = lock.lock(id).unwrap();
                    }
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(contenders),
            &lock,
            |b, lock| {
                b.iter(|| {
                    let ticket = lock.lock(black_box(1)).unwrap();
                    black_box(ticket.number());
                });
            },
        );

        stop.store(true, Ordering::Relaxed);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let manager = StateManager::new();
    for pid in 1..=16u32 {
        manager.register(u64::from(pid)).unwrap();
        manager
            .admit(u64::from(pid), ProcessRecord::new(pid, Duration::from_millis(10)))
            .unwrap();
    }

    c.bench_function("snapshot_16_ready", |b| {
        b.iter(|| black_box(manager.snapshot().unwrap()));
    });
}

criterion_group!(benches, bench_uncontended, bench_contended, bench_snapshot);
criterion_main!(benches);
