use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ripple_core::{Computed, Runtime, Signal};

/// A chain of `depth` computeds hanging off one signal.
fn build_chain(rt: &Runtime, depth: usize) -> (Signal<u64>, Computed<u64>) {
    let source = rt.signal(0_u64);
    let mut tail = rt.computed({
        let source = source.clone();
        move || source.get() + 1
    });
    for _ in 1..depth {
        let prev = tail.clone();
        tail = rt.computed(move || prev.get() + 1);
    }
    (source, tail)
}

/// One signal feeding `width` computeds, all summed by one effect.
fn build_fan(rt: &Runtime, width: usize) -> Signal<u64> {
    let source = rt.signal(0_u64);
    let branches: Vec<Computed<u64>> = (0..width as u64)
        .map(|i| {
            let source = source.clone();
            rt.computed(move || source.get() * i)
        })
        .collect();
    rt.effect(move || {
        black_box(branches.iter().map(Computed::get).sum::<u64>());
    });
    source
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    for depth in [10, 100, 1000] {
        group.bench_function(format!("write_then_read/{depth}"), |b| {
            let rt = Runtime::new();
            let (source, tail) = build_chain(&rt, depth);
            let mut next = 0;
            b.iter(|| {
                next += 1;
                source.set(next);
                black_box(tail.get())
            });
        });
    }
    group.finish();
}

fn bench_fan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan");
    for width in [10, 100, 1000] {
        group.bench_function(format!("effect_rerun/{width}"), |b| {
            let rt = Runtime::new();
            let source = build_fan(&rt, width);
            let mut next = 0;
            b.iter(|| {
                next += 1;
                source.set(next);
            });
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    c.bench_function("batch/100_writes_one_flush", |b| {
        let rt = Runtime::new();
        let signals: Vec<Signal<u64>> = (0..100).map(|_| rt.signal(0)).collect();
        let readers = signals.clone();
        rt.effect(move || {
            black_box(readers.iter().map(Signal::get).sum::<u64>());
        });
        let mut next = 0;
        b.iter(|| {
            next += 1;
            rt.batch(|| {
                for signal in &signals {
                    signal.set(next);
                }
            });
        });
    });
}

fn bench_create_dispose(c: &mut Criterion) {
    c.bench_function("lifecycle/create_dispose_effect", |b| {
        let rt = Runtime::new();
        let source = rt.signal(0_u64);
        b.iter_batched(
            || source.clone(),
            |source| {
                let effect = rt.effect(move || {
                    black_box(source.get());
                });
                effect.dispose();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_chain,
    bench_fan,
    bench_batch,
    bench_create_dispose
);
criterion_main!(benches);
