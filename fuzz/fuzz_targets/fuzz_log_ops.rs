#![no_main]

use arbitrary::Arbitrary;
use hivelog::log::{check_all, RECORD_WIDTH};
use hivelog::{Board, CellFault, Layout, Location, LogError, Record, RecordLog, RegionKind};
use libfuzzer_sys::fuzz_target;

/// One operation against the shared log.
#[derive(Arbitrary, Debug)]
enum Op {
    Append { hazard: bool, tick: u8, x: i8, y: i8 },
    Tombstone { hazard: bool, slot: u8 },
    Maintain { now: u8, max_age: u8 },
    /// Next operation runs with this many cell operations.
    Budget(u8),
    /// Overwrite one cell with garbage; scans must error, not panic.
    Corrupt { cell: u16, value: i32 },
}

#[derive(Arbitrary, Debug)]
struct LogInput {
    /// Region capacity in records (capped).
    records: u8,
    ops: Vec<Op>,
}

fn kind(hazard: bool) -> RegionKind {
    if hazard { RegionKind::Hazard } else { RegionKind::Cleared }
}

fuzz_target!(|input: LogInput| {
    let layout = Layout::compact(usize::from(input.records.clamp(1, 64)) * RECORD_WIDTH);
    let board = Board::new(layout.len);
    let mut log = RecordLog::new(board.clone(), layout);
    if log.init().is_err() {
        return;
    }

    let mut corrupted = false;
    for op in input.ops.iter().take(256) {
        let result = match *op {
            Op::Append { hazard, tick, x, y } => log
                .append(
                    kind(hazard),
                    Record::new(i32::from(tick), Location::new(i32::from(x), i32::from(y))),
                )
                .map(|_| ()),
            Op::Tombstone { hazard, slot } => log
                .tombstone(kind(hazard), usize::from(slot) * RECORD_WIDTH)
                .map(|_| ()),
            Op::Maintain { now, max_age } => {
                log.maintain(i32::from(now), i32::from(max_age)).map(|_| ())
            }
            Op::Budget(ops) => {
                board.begin_turn(Some(u64::from(ops)));
                continue;
            }
            Op::Corrupt { cell, value } => {
                let mut raw = board.clone();
                let cell = usize::from(cell) % layout.len;
                if hivelog::SharedArray::write_cell(&mut raw, cell, value).is_ok() {
                    corrupted = true;
                }
                continue;
            }
        };
        board.end_turn();

        match result {
            Ok(()) => {}
            Err(LogError::RegionExhausted { .. } | LogError::BadOffset { .. }) => {}
            Err(LogError::Fault(CellFault::BudgetExhausted)) => {}
            Err(err) => assert!(corrupted, "uncorrupted log failed: {err}"),
        }

        if !corrupted {
            let Ok(snapshot) = board.snapshot() else {
                return;
            };
            for violation in check_all(&snapshot, &layout) {
                assert!(violation.recoverable, "fatal violation: {violation}");
            }
        }
    }
});
