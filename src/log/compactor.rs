//! Expiry and compaction of log regions.
//!
//! Only the privileged agent calls into this module, once per tick. The pass
//! runs inside [`SharedArray::exclusive`] so that on a host with real
//! parallelism no append can interleave with the in-place shift.
//!
//! Cut-off safety: a copy marks its destination tick cell as a tombstone
//! before writing coordinates and publishes the tick last, and truncation
//! moves the end pointer before writing the new terminator. A pass stopped
//! anywhere therefore leaves at worst duplicated records, which sync folds
//! idempotently.

use serde::Serialize;

use crate::error::LogResult;
use crate::layout::Layout;
use crate::log::{RECORD_WIDTH, Region, RegionKind, Slot};
use crate::shared::{SharedArray, Tick};

/// Records at least this many ticks old are expired.
pub const DEFAULT_MAX_AGE: Tick = 2;

/// What one maintenance pass did to one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    /// Records tombstoned by expiry.
    pub expired: usize,
    /// Slots physically reclaimed by compaction.
    pub reclaimed: usize,
    /// Live records left after compaction.
    pub live: usize,
}

impl RegionReport {
    /// Add another report's counts.
    pub fn merge(&mut self, other: RegionReport) {
        self.expired += other.expired;
        self.reclaimed += other.reclaimed;
        self.live = other.live;
    }
}

/// What one maintenance pass did to both regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Hazard region.
    pub hazard: RegionReport,
    /// Cleared region.
    pub cleared: RegionReport,
}

impl MaintenanceReport {
    /// Report for `kind`.
    #[must_use]
    pub fn region(&self, kind: RegionKind) -> &RegionReport {
        match kind {
            RegionKind::Hazard => &self.hazard,
            RegionKind::Cleared => &self.cleared,
        }
    }

    fn region_mut(&mut self, kind: RegionKind) -> &mut RegionReport {
        match kind {
            RegionKind::Hazard => &mut self.hazard,
            RegionKind::Cleared => &mut self.cleared,
        }
    }

    /// Accumulate another pass.
    pub fn merge(&mut self, other: &MaintenanceReport) {
        self.hazard.merge(other.hazard);
        self.cleared.merge(other.cleared);
    }
}

/// Tombstone every live record with `tick <= now - max_age`.
///
/// Returns the number of records tombstoned.
///
/// # Errors
///
/// Returns the first scan or write error.
pub fn expire<A: SharedArray + ?Sized>(
    array: &mut A,
    region: &Region,
    now: Tick,
    max_age: Tick,
) -> LogResult<usize> {
    let cutoff = now.saturating_sub(max_age);
    let mut stale = Vec::new();
    for entry in region.scan(&*array) {
        let entry = entry?;
        if let Some(record) = entry.record()
            && record.tick <= cutoff
        {
            stale.push(entry.offset);
        }
    }
    for &offset in &stale {
        region.write_tombstone(array, offset)?;
    }
    Ok(stale.len())
}

/// Shift live records down over tombstones and truncate the region.
///
/// Returns `(reclaimed, live)` slot counts. A region without tombstones is
/// scanned but not written.
///
/// # Errors
///
/// Returns the first scan or write error.
pub fn compact<A: SharedArray + ?Sized>(array: &mut A, region: &Region) -> LogResult<(usize, usize)> {
    let end = region.heal_end_pointer(array)?;
    let mut write = 0;
    let mut read = 0;
    while read < end {
        match region.slot(&*array, read)? {
            Some(Slot::Live(record)) => {
                if write != read {
                    region.write_record_at(array, write, record)?;
                }
                write += RECORD_WIDTH;
            }
            Some(Slot::Tombstone) => {}
            None => break,
        }
        read += RECORD_WIDTH;
    }
    if write != end {
        region.truncate_at(array, write)?;
    }
    Ok(((end - write) / RECORD_WIDTH, write / RECORD_WIDTH))
}

/// Expire then compact both regions under exclusive access.
///
/// Precondition: every other agent has finished appending for the records
/// this pass may expire. The host's turn order guarantees it.
///
/// # Errors
///
/// Returns the first error from either region. Work already done on the
/// first region stays done.
pub fn run_maintenance<A: SharedArray + ?Sized>(
    array: &mut A,
    layout: &Layout,
    now: Tick,
    max_age: Tick,
) -> LogResult<MaintenanceReport> {
    let mut scope = array.exclusive()?;
    let mut report = MaintenanceReport::default();
    for kind in RegionKind::ALL {
        let region = layout.region(kind);
        let expired = expire(&mut scope, &region, now, max_age)?;
        let (reclaimed, live) = compact(&mut scope, &region)?;
        *report.region_mut(kind) = RegionReport {
            expired,
            reclaimed,
            live,
        };
        tracing::debug!(region = %kind, now, expired, reclaimed, live, "maintenance");
    }
    Ok(report)
}
