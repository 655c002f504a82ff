//! Benchmarks for the scheduler's hot paths.
//!
//! Preemption is off so every switch is an explicit yield or join.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;
use std::time::Duration;
use uthread_runtime::{Condvar, Runtime, RuntimeConfig};

fn cooperative() -> Runtime {
    Runtime::new(RuntimeConfig::new().preempt_period(Duration::ZERO)).unwrap()
}

/// Main yields to a partner that yields straight back: two switches per iteration.
fn bench_yield_round_trip(c: &mut Criterion) {
    let rt = cooperative();
    let stop = Rc::new(Cell::new(false));
    let partner = rt
        .spawn(
            |(rt, stop): (Runtime, Rc<Cell<bool>>)| {
                while !stop.get() {
                    rt.yield_now();
                }
            },
            (rt.clone(), Rc::clone(&stop)),
        )
        .unwrap();

    let mut group = c.benchmark_group("yield");
    group.throughput(Throughput::Elements(2));
    group.bench_function("round_trip", |b| b.iter(|| rt.yield_now()));
    group.finish();

    stop.set(true);
    rt.join(partner).unwrap();
}

/// Spawn a trivial thread and join it; the stack comes from the cache after the first round.
fn bench_spawn_join(c: &mut Criterion) {
    let rt = cooperative();
    c.bench_function("spawn_join", |b| {
        b.iter(|| {
            let h = rt.spawn(|x: u64| x + 1, black_box(41)).unwrap();
            black_box(rt.join(h).unwrap())
        });
    });
}

/// Signal a waiting thread: switch to it, then back when it waits again.
fn bench_condvar_signal(c: &mut Criterion) {
    let rt = cooperative();
    let cv = Rc::new(Condvar::new(&rt));
    let stop = Rc::new(Cell::new(false));
    let waiter = rt
        .spawn(
            |(cv, stop): (Rc<Condvar>, Rc<Cell<bool>>)| {
                while !stop.get() {
                    cv.wait_unlocked();
                }
            },
            (Rc::clone(&cv), Rc::clone(&stop)),
        )
        .unwrap();
    rt.yield_now();

    c.bench_function("condvar_signal", |b| {
        // Returns once the waiter has parked again
        b.iter(|| cv.signal())
    });

    stop.set(true);
    cv.signal();
    rt.join(waiter).unwrap();
}

criterion_group!(benches, bench_yield_round_trip, bench_spawn_join, bench_condvar_signal);
criterion_main!(benches);
