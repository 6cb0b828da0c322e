//! Bounded append-only record log inside the shared array.
//!
//! Two regions, one per [`RegionKind`], each hold `(tick, x, y)` records
//! terminated by [`TERMINATOR`]. Any agent may append and scan; only the
//! privileged agent tombstones and compacts (see [`compactor`]).
//!
//! # Layout of one region
//!
//! ```text
//! start                                  end pointer ──┐
//! │                                                    ▼
//! [t x y][-2 -2 -2][t x y] ... [t x y][-1][ unused ... ]
//!  live   tombstone  live        live  terminator
//! ```

pub mod compactor;
pub mod invariants;
mod record;
mod region;

pub use compactor::{DEFAULT_MAX_AGE, MaintenanceReport, RegionReport};
pub use invariants::{InvariantViolation, assert_invariants, check_all, check_region};
pub use record::{Entry, Location, RECORD_WIDTH, Record, Slot, TERMINATOR, TOMBSTONE};
pub use region::{Region, RegionKind, Scan};

use crate::error::LogResult;
use crate::layout::Layout;
use crate::shared::{SharedArray, Tick};

/// A shared-array handle bound to a layout.
///
/// All state lives in the array; two `RecordLog`s over clones of the same
/// [`Board`](crate::shared::Board) observe the same log.
#[derive(Debug, Clone)]
pub struct RecordLog<A> {
    array: A,
    layout: Layout,
}

impl<A: SharedArray> RecordLog<A> {
    /// Bind `array` to `layout`.
    #[must_use]
    pub fn new(array: A, layout: Layout) -> Self {
        Self { array, layout }
    }

    /// The layout in use.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Region descriptor for `kind`.
    #[must_use]
    pub fn region(&self, kind: RegionKind) -> Region {
        self.layout.region(kind)
    }

    /// The underlying array.
    #[must_use]
    pub fn array(&self) -> &A {
        &self.array
    }

    /// Mutable access to the underlying array (scalar counters).
    pub fn array_mut(&mut self) -> &mut A {
        &mut self.array
    }

    /// Write empty logs for both regions.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell write fails.
    pub fn init(&mut self) -> LogResult<()> {
        for kind in RegionKind::ALL {
            self.layout.region(kind).init(&mut self.array)?;
        }
        Ok(())
    }

    /// Append a record to `kind`'s region; returns its offset.
    ///
    /// # Errors
    ///
    /// See [`Region::append`].
    pub fn append(&mut self, kind: RegionKind, record: Record) -> LogResult<usize> {
        self.layout.region(kind).append(&mut self.array, record)
    }

    /// Scan `kind`'s region from the start.
    #[must_use]
    pub fn scan(&self, kind: RegionKind) -> Scan<'_, A> {
        self.layout.region(kind).scan(&self.array)
    }

    /// Scan `kind`'s region from `offset`.
    #[must_use]
    pub fn scan_from(&self, kind: RegionKind, offset: usize) -> Scan<'_, A> {
        self.layout.region(kind).scan_from(&self.array, offset)
    }

    /// Tombstone the record at `offset`.
    ///
    /// # Errors
    ///
    /// See [`Region::tombstone`].
    pub fn tombstone(&mut self, kind: RegionKind, offset: usize) -> LogResult<bool> {
        self.layout.region(kind).tombstone(&mut self.array, offset)
    }

    /// Current end offset of `kind`'s region.
    ///
    /// # Errors
    ///
    /// See [`Region::end_offset`].
    pub fn end_offset(&self, kind: RegionKind) -> LogResult<usize> {
        self.layout.region(kind).end_offset(&self.array)
    }

    /// Live records of `kind`'s region, in log order.
    ///
    /// # Errors
    ///
    /// Returns the first scan error.
    pub fn live_records(&self, kind: RegionKind) -> LogResult<Vec<Record>> {
        self.scan(kind)
            .filter_map(|entry| entry.map(|e| e.record()).transpose())
            .collect()
    }

    /// Expire and compact both regions under exclusive access.
    ///
    /// # Errors
    ///
    /// See [`compactor::run_maintenance`].
    pub fn maintain(&mut self, now: Tick, max_age: Tick) -> LogResult<MaintenanceReport> {
        compactor::run_maintenance(&mut self.array, &self.layout, now, max_age)
    }
}
