//! Per-agent working set and watermark sync.
//!
//! Compaction moves records to lower offsets, so an agent cannot remember
//! "the last offset I read". Instead it rescans from the region start and
//! applies every live record whose tick is at or after its watermark. Facts
//! may be delivered more than once; applying them is idempotent.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::LogResult;
use crate::layout::Layout;
use crate::log::{Location, Region, RegionKind};
use crate::shared::{SharedArray, Tick};

/// Locations an agent currently believes are hazardous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    hazards: HashSet<Location>,
}

impl WorkingSet {
    /// Create an empty working set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `location` is a known hazard.
    #[must_use]
    pub fn contains(&self, location: Location) -> bool {
        self.hazards.contains(&location)
    }

    /// Number of known hazards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    /// Whether no hazard is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }

    /// Known hazards, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.hazards.iter()
    }

    /// Known hazard closest to `from`, ties broken by location order.
    #[must_use]
    pub fn nearest(&self, from: Location) -> Option<Location> {
        self.hazards
            .iter()
            .copied()
            .min_by_key(|&loc| (loc.distance_squared(from), loc))
    }

    /// Apply one record of region `kind`.
    pub fn apply(&mut self, kind: RegionKind, location: Location) {
        match kind {
            RegionKind::Hazard => {
                self.hazards.insert(location);
            }
            RegionKind::Cleared => {
                self.hazards.remove(&location);
            }
        }
    }
}

/// Per-region ticks below which records have already been folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Watermarks {
    /// Hazard region watermark.
    pub hazard: Tick,
    /// Cleared region watermark.
    pub cleared: Tick,
}

impl Watermarks {
    /// Watermark for `kind`.
    #[must_use]
    pub const fn get(&self, kind: RegionKind) -> Tick {
        match kind {
            RegionKind::Hazard => self.hazard,
            RegionKind::Cleared => self.cleared,
        }
    }

    fn get_mut(&mut self, kind: RegionKind) -> &mut Tick {
        match kind {
            RegionKind::Hazard => &mut self.hazard,
            RegionKind::Cleared => &mut self.cleared,
        }
    }
}

/// Records applied by one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Hazard records applied.
    pub hazards: usize,
    /// Cleared records applied.
    pub cleared: usize,
}

/// Fold one region into `set`, then raise `watermark` to `now`.
///
/// The watermark only moves once the scan reaches the terminator; a scan
/// cut off by the host budget is retried from the old watermark.
///
/// # Errors
///
/// Returns the first scan error, leaving the watermark untouched.
pub fn sync_region<A: SharedArray + ?Sized>(
    array: &A,
    region: &Region,
    set: &mut WorkingSet,
    watermark: &mut Tick,
    now: Tick,
) -> LogResult<usize> {
    let mut applied = 0;
    for entry in region.scan(array) {
        if let Some(record) = entry?.record()
            && record.tick >= *watermark
        {
            set.apply(region.kind, record.location);
            applied += 1;
        }
    }
    *watermark = now;
    Ok(applied)
}

/// Fold hazards, then cleared facts.
///
/// # Errors
///
/// Returns the first scan error. A hazard pass that completed keeps its
/// raised watermark.
pub fn sync_all<A: SharedArray + ?Sized>(
    array: &A,
    layout: &Layout,
    set: &mut WorkingSet,
    marks: &mut Watermarks,
    now: Tick,
) -> LogResult<SyncReport> {
    let mut report = SyncReport::default();
    for kind in RegionKind::ALL {
        let applied = sync_region(array, &layout.region(kind), set, marks.get_mut(kind), now)?;
        match kind {
            RegionKind::Hazard => report.hazards = applied,
            RegionKind::Cleared => report.cleared = applied,
        }
    }
    tracing::trace!(now, hazards = report.hazards, cleared = report.cleared, known = set.len(), "sync");
    Ok(report)
}
