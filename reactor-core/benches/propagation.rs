//! Benchmarks for write propagation.
//!
//! Run with: `cargo bench --package reactor-core --bench propagation`
//!
//! # Performance Baselines
//!
//! These benchmarks establish baselines for:
//! - Diamond graphs, where one descendant is reached through two paths
//! - Wide fan-out from a single atom
//! - Deep chains of calcs
//! - Writes that stop at an unchanged intermediate value

use std::cell::Cell;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reactor_core::{Atom, Calc, Effect};

// ============================================================================
// Graph Construction
// ============================================================================

/// An atom feeding `width` independent calcs.
fn fan_out(width: usize) -> (Atom<u64>, Vec<Calc<u64>>) {
    let source = Atom::new(0u64);
    let calcs = (0..width as u64)
        .map(|offset| source.map(move |v| v + offset).unwrap())
        .collect();
    (source, calcs)
}

/// An atom at the head of `depth` calcs, each reading the previous one.
fn chain(depth: usize) -> (Atom<u64>, Calc<u64>) {
    let source = Atom::new(0u64);
    let mut tail = source.map(|v| v + 1).unwrap();
    for _ in 1..depth {
        tail = tail.map(|v| v + 1).unwrap();
    }
    (source, tail)
}

/// Write a value that differs from the previous write on every call.
fn write_next(source: &Atom<u64>, counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
    source.set(black_box(counter.get())).unwrap();
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_diamond(c: &mut Criterion) {
    let mut group = c.benchmark_group("diamond");

    let source = Atom::new(0u64);
    let left = source.map(|v| v + 1).unwrap();
    let right = source.map(|v| v * 2).unwrap();
    let joined = Calc::new({
        let (left, right) = (left.clone(), right.clone());
        move || Ok(left.get()? + right.get()?)
    })
    .unwrap();
    let _sink = Effect::new({
        let joined = joined.clone();
        move || {
            black_box(joined.get()?);
            Ok(())
        }
    })
    .unwrap();

    let counter = Cell::new(0);
    group.bench_function("set", |b| b.iter(|| write_next(&source, &counter)));

    group.bench_function("set_equal", |b| {
        b.iter(|| source.set(black_box(source.peek())).unwrap())
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for width in [10, 100, 1_000] {
        let (source, calcs) = fan_out(width);
        let counter = Cell::new(0);
        group.throughput(Throughput::Elements(calcs.len() as u64));
        group.bench_with_input(BenchmarkId::new("set", width), &source, |b, source| {
            b.iter(|| write_next(source, &counter));
        });
    }

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");

    for depth in [10, 100] {
        let (source, tail) = chain(depth);
        let counter = Cell::new(0);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("set", depth), &source, |b, source| {
            b.iter(|| {
                write_next(source, &counter);
                black_box(tail.peek())
            });
        });
    }

    group.finish();
}

fn bench_short_circuit(c: &mut Criterion) {
    let mut group = c.benchmark_group("short_circuit");

    // Every write recomputes `parity` but stops there while it stays 0.
    let source = Atom::new(0u64);
    let parity = source.map(|v| v % 2).unwrap();
    let mut downstream = parity.map(|v| v + 1).unwrap();
    for _ in 1..100 {
        downstream = downstream.map(|v| v + 1).unwrap();
    }

    let counter = Cell::new(0);
    group.bench_function("even_writes", |b| {
        b.iter(|| {
            counter.set(counter.get() + 2);
            source.set(black_box(counter.get())).unwrap();
        })
    });
    black_box(downstream.peek());

    group.finish();
}

criterion_group!(
    benches,
    bench_diamond,
    bench_fan_out,
    bench_chain,
    bench_short_circuit,
);

criterion_main!(benches);
