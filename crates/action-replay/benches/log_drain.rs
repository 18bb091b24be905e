//! Action log benchmarks.
#![allow(missing_docs)]

use std::hint::black_box;

use action_replay::{ActionLog, Event};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn recorded(count: usize) -> ActionLog {
    ActionLog::from_events(
        (0..count)
            .map(|i| Event::pointer_move(i as i64 * 4, i as f64, 0.0))
            .collect(),
    )
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("append_1k", |b| {
        b.iter(|| {
            let log = ActionLog::new();
            for i in 0..1000i64 {
                log.append(Event::pointer_move(i, 0.0, 0.0)).unwrap();
            }
            black_box(log.len())
        });
    });

    c.bench_function("append_clamped_1k", |b| {
        b.iter(|| {
            let log = ActionLog::new();
            for i in 0..1000i64 {
                log.append(Event::pointer_move(1000 - i, 0.0, 0.0)).unwrap();
            }
            black_box(log.len())
        });
    });
}

fn bench_tick_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_drain");

    // One tick's worth of events out of logs of increasing size.
    for size in &[100usize, 1_000, 10_000] {
        let log = recorded(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let from = size / 2;
            let until = (from as f64).mul_add(4.0, 40.0);
            b.iter(|| log.due(black_box(from), size, black_box(until)));
        });
    }

    group.finish();
}

fn bench_full_drain(c: &mut Criterion) {
    let log = recorded(10_000);

    c.bench_function("drain_10k_in_10ms_ticks", |b| {
        b.iter(|| {
            let mut cursor = 0;
            let mut virtual_time = 0.0;
            while cursor < log.len() {
                cursor += log.due(cursor, usize::MAX, virtual_time).len();
                virtual_time += 10.0;
            }
            black_box(cursor)
        });
    });
}

criterion_group!(benches, bench_append, bench_tick_drain, bench_full_drain);
criterion_main!(benches);
