//! Benchmarks for the shared record log.
//!
//! Append, scan and maintenance are what every agent pays for each turn.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use hivelog::{CellArray, Layout, Location, Record, RecordLog, RegionKind, Watermarks, WorkingSet, sync};

const CAPACITY: usize = 30_000;

/// A log with `records` hazards spread over ticks 0..10.
fn filled(records: usize) -> RecordLog<CellArray> {
    let layout = Layout::compact(CAPACITY);
    let mut log = RecordLog::new(CellArray::new(layout.len), layout);
    log.init().unwrap();
    for i in 0..records {
        let i = i as i32;
        log.append(RegionKind::Hazard, Record::new(i % 10, Location::new(i % 97, i / 97)))
            .unwrap();
    }
    log
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("append_1000", |b| {
        b.iter_batched(
            || filled(0),
            |mut log| {
                for i in 0..1000 {
                    let _ = log.append(RegionKind::Hazard, Record::new(1, Location::new(i, i)));
                }
                black_box(log)
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_scan(c: &mut Criterion) {
    let log = filled(5_000);

    c.bench_function("scan_5000", |b| {
        b.iter(|| black_box(log.live_records(RegionKind::Hazard).unwrap().len()));
    });

    c.bench_function("sync_5000", |b| {
        b.iter(|| {
            let mut set = WorkingSet::new();
            let mut marks = Watermarks::default();
            sync::sync_all(log.array(), log.layout(), &mut set, &mut marks, 10).unwrap();
            black_box(set.len())
        });
    });
}

fn bench_maintenance(c: &mut Criterion) {
    // Six in ten records expire; compaction shifts the rest down
    c.bench_function("maintain_5000_mostly_expired", |b| {
        b.iter_batched(
            || filled(5_000),
            |mut log| black_box(log.maintain(7, 2).unwrap()),
            BatchSize::LargeInput,
        );
    });

    c.bench_function("maintain_5000_nothing_expired", |b| {
        b.iter_batched(
            || filled(5_000),
            |mut log| black_box(log.maintain(0, 100).unwrap()),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_append, bench_scan, bench_maintenance);
criterion_main!(benches);
