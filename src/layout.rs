//! Map of the shared array: scalar cells and log regions.
//!
//! ```text
//! 0..=8    current count per unit kind
//! 9        build progress (fixed-order phase cursor)
//! 21       hazard end pointer
//! 22       cleared end pointer
//! 24..=32  lifetime built count per unit kind
//! 70..     hazard region
//! 500000.. cleared region
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::log::{RECORD_WIDTH, Region, RegionKind};
use crate::scheduler::UnitKind;

/// Array length of the reference layout.
pub const REFERENCE_LEN: usize = 1_000_000;

const COUNTERS: usize = 0;
const BUILD_PROGRESS: usize = 9;
const HAZARD_END: usize = 21;
const CLEARED_END: usize = 22;
const LIFETIME: usize = 24;
const HAZARD_START: usize = 70;
const CLEARED_START: usize = 500_000;

/// First region cell of a compact layout.
const COMPACT_START: usize = 40;

/// Largest record-aligned capacity whose span ends at or before `limit`.
const fn fit(start: usize, limit: usize) -> usize {
    (limit - start - 1) / RECORD_WIDTH * RECORD_WIDTH
}

/// Cell assignment for one shared array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Array length.
    pub len: usize,
    /// First of [`UnitKind::COUNT`] current-count cells.
    pub counters: usize,
    /// Build progress cell.
    pub build_progress: usize,
    /// First of [`UnitKind::COUNT`] lifetime-built cells.
    pub lifetime: usize,
    /// Hazard region.
    pub hazard: Region,
    /// Cleared region.
    pub cleared: Region,
}

impl Default for Layout {
    fn default() -> Self {
        Self::reference()
    }
}

impl Layout {
    /// The reference layout over a million cells.
    #[must_use]
    pub const fn reference() -> Self {
        Self {
            len: REFERENCE_LEN,
            counters: COUNTERS,
            build_progress: BUILD_PROGRESS,
            lifetime: LIFETIME,
            hazard: Region::new(
                RegionKind::Hazard,
                HAZARD_START,
                fit(HAZARD_START, CLEARED_START),
                HAZARD_END,
            ),
            cleared: Region::new(
                RegionKind::Cleared,
                CLEARED_START,
                fit(CLEARED_START, REFERENCE_LEN),
                CLEARED_END,
            ),
        }
    }

    /// A small layout with `capacity` record cells per region.
    ///
    /// The capacity is rounded down to a whole number of records, and is at
    /// least one record.
    #[must_use]
    pub const fn compact(capacity: usize) -> Self {
        let mut capacity = capacity / RECORD_WIDTH * RECORD_WIDTH;
        if capacity < RECORD_WIDTH {
            capacity = RECORD_WIDTH;
        }
        let hazard = Region::new(RegionKind::Hazard, COMPACT_START, capacity, HAZARD_END);
        let cleared = Region::new(RegionKind::Cleared, hazard.end(), capacity, CLEARED_END);
        Self {
            len: cleared.end(),
            counters: COUNTERS,
            build_progress: BUILD_PROGRESS,
            lifetime: LIFETIME,
            hazard,
            cleared,
        }
    }

    /// Region for `kind`.
    #[must_use]
    pub const fn region(&self, kind: RegionKind) -> Region {
        match kind {
            RegionKind::Hazard => self.hazard,
            RegionKind::Cleared => self.cleared,
        }
    }

    /// Current-count cell for `kind`.
    #[must_use]
    pub const fn counter_cell(&self, kind: UnitKind) -> usize {
        self.counters + kind.index()
    }

    /// Lifetime-built cell for `kind`.
    #[must_use]
    pub const fn lifetime_cell(&self, kind: UnitKind) -> usize {
        self.lifetime + kind.index()
    }

    /// Every scalar cell the layout assigns.
    #[must_use]
    pub fn scalar_cells(&self) -> Vec<usize> {
        let mut cells: Vec<usize> = UnitKind::ALL
            .iter()
            .flat_map(|&kind| [self.counter_cell(kind), self.lifetime_cell(kind)])
            .collect();
        cells.push(self.build_progress);
        cells.push(self.hazard.end_cell);
        cells.push(self.cleared.end_cell);
        cells
    }

    /// Check the layout is usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if i32::try_from(self.len).is_err() {
            return Err(LayoutError::TooLarge { len: self.len });
        }
        for (expected, region) in [
            (RegionKind::Hazard, &self.hazard),
            (RegionKind::Cleared, &self.cleared),
        ] {
            if region.kind != expected {
                return Err(LayoutError::WrongKind {
                    expected,
                    found: region.kind,
                });
            }
            if region.capacity < RECORD_WIDTH || region.capacity % RECORD_WIDTH != 0 {
                return Err(LayoutError::BadCapacity {
                    region: region.kind,
                    capacity: region.capacity,
                });
            }
            if region.end() > self.len {
                return Err(LayoutError::RegionOutOfBounds {
                    region: region.kind,
                    end: region.end(),
                    len: self.len,
                });
            }
        }
        if self.hazard.overlaps(&self.cleared) {
            return Err(LayoutError::Overlap);
        }
        let mut seen = Vec::new();
        for cell in self.scalar_cells() {
            if cell >= self.len {
                return Err(LayoutError::CellOutOfBounds {
                    cell,
                    len: self.len,
                });
            }
            if let Some(region) = [&self.hazard, &self.cleared]
                .into_iter()
                .find(|region| region.contains(cell))
            {
                return Err(LayoutError::CellInRegion {
                    cell,
                    region: region.kind,
                });
            }
            if seen.contains(&cell) {
                return Err(LayoutError::DuplicateCell { cell });
            }
            seen.push(cell);
        }
        Ok(())
    }
}

/// A layout that cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Cell indices would not fit in a cell value.
    TooLarge {
        /// Requested length.
        len: usize,
    },
    /// A region descriptor is in the wrong slot.
    WrongKind {
        /// Kind the slot holds.
        expected: RegionKind,
        /// Kind found.
        found: RegionKind,
    },
    /// Capacity is zero or not record aligned.
    BadCapacity {
        /// Region.
        region: RegionKind,
        /// Capacity given.
        capacity: usize,
    },
    /// A region runs past the array.
    RegionOutOfBounds {
        /// Region.
        region: RegionKind,
        /// One past its last cell.
        end: usize,
        /// Array length.
        len: usize,
    },
    /// The regions share cells.
    Overlap,
    /// A scalar cell lies past the array.
    CellOutOfBounds {
        /// Cell index.
        cell: usize,
        /// Array length.
        len: usize,
    },
    /// A scalar cell lies inside a region.
    CellInRegion {
        /// Cell index.
        cell: usize,
        /// Region hit.
        region: RegionKind,
    },
    /// Two scalars share a cell.
    DuplicateCell {
        /// Cell index.
        cell: usize,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::TooLarge { len } => write!(f, "array length {len} exceeds i32 range"),
            LayoutError::WrongKind { expected, found } => {
                write!(f, "{expected} slot holds a {found} region")
            }
            LayoutError::BadCapacity { region, capacity } => write!(
                f,
                "{region} capacity {capacity} is not a positive multiple of {RECORD_WIDTH}"
            ),
            LayoutError::RegionOutOfBounds { region, end, len } => {
                write!(f, "{region} region ends at {end}, past array length {len}")
            }
            LayoutError::Overlap => write!(f, "hazard and cleared regions overlap"),
            LayoutError::CellOutOfBounds { cell, len } => {
                write!(f, "scalar cell {cell} is past array length {len}")
            }
            LayoutError::CellInRegion { cell, region } => {
                write!(f, "scalar cell {cell} lies inside the {region} region")
            }
            LayoutError::DuplicateCell { cell } => {
                write!(f, "scalar cell {cell} is assigned twice")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout_is_valid() {
        let layout = Layout::reference();
        assert_eq!(layout.validate(), Ok(()));
        assert_eq!(layout.hazard.start, 70);
        assert_eq!(layout.cleared.start, 500_000);
        assert_eq!(layout.hazard.end_cell, 21);
        assert_eq!(layout.cleared.end_cell, 22);
        assert!(layout.hazard.end() <= layout.cleared.start);
        assert!(layout.cleared.end() <= layout.len);
        assert_eq!(layout.counter_cell(UnitKind::Farm), 0);
        assert_eq!(layout.counter_cell(UnitKind::Soldier), 8);
        assert_eq!(layout.lifetime_cell(UnitKind::Farm), 24);
        assert_eq!(layout.lifetime_cell(UnitKind::Soldier), 32);
    }

    #[test]
    fn test_compact_layout() {
        let layout = Layout::compact(30);
        assert_eq!(layout.validate(), Ok(()));
        assert_eq!(layout.hazard.capacity, 30);
        assert_eq!(layout.cleared.start, layout.hazard.end());
        assert_eq!(layout.len, layout.cleared.end());

        assert_eq!(Layout::compact(31).hazard.capacity, 30);
        assert_eq!(Layout::compact(0).hazard.capacity, RECORD_WIDTH);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut layout = Layout::compact(30);
        layout.cleared.start -= 1;
        assert_eq!(layout.validate(), Err(LayoutError::Overlap));
    }

    #[test]
    fn test_misaligned_capacity_rejected() {
        let mut layout = Layout::compact(30);
        layout.hazard.capacity = 29;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::BadCapacity {
                region: RegionKind::Hazard,
                ..
            })
        ));
    }

    #[test]
    fn test_scalar_inside_region_rejected() {
        let mut layout = Layout::compact(30);
        layout.build_progress = layout.hazard.start + 1;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::CellInRegion { .. })
        ));
    }

    #[test]
    fn test_duplicate_scalar_rejected() {
        let mut layout = Layout::compact(30);
        layout.build_progress = layout.hazard.end_cell;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::DuplicateCell { .. })
        ));
    }

    #[test]
    fn test_region_past_end_rejected() {
        let mut layout = Layout::compact(30);
        layout.len -= 1;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::RegionOutOfBounds {
                region: RegionKind::Cleared,
                ..
            })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let layout = Layout::compact(12);
        let json = serde_json::to_string(&layout).unwrap();
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
