//! Record and location types.

use serde::{Deserialize, Serialize};

use crate::shared::Tick;

/// Cells per record: `(tick, x, y)`.
pub const RECORD_WIDTH: usize = 3;

/// Marks the first unused slot of a region.
pub const TERMINATOR: i32 = -1;

/// Fills all three cells of a logically deleted record.
pub const TOMBSTONE: i32 = -2;

/// A map location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance.
    #[must_use]
    pub fn distance_squared(self, other: Location) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// The eight surrounding locations. Neighbours whose coordinates would
    /// overflow are left out.
    pub fn neighbours(self) -> impl Iterator<Item = Location> {
        NEIGHBOUR_OFFSETS.into_iter().filter_map(move |(dx, dy)| {
            Some(Location::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
        })
    }

    /// The location itself followed by its neighbours.
    pub fn with_neighbours(self) -> impl Iterator<Item = Location> {
        std::iter::once(self).chain(self.neighbours())
    }
}

const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A published fact about a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    /// Tick the fact was published at. Fixed at creation.
    pub tick: Tick,
    /// Location the fact is about.
    pub location: Location,
}

impl Record {
    /// Create a new record.
    #[must_use]
    pub const fn new(tick: Tick, location: Location) -> Self {
        Self { tick, location }
    }
}

/// Contents of one record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A live record.
    Live(Record),
    /// A deleted record still occupying space.
    Tombstone,
}

/// One slot yielded by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Region-relative offset of the slot.
    pub offset: usize,
    /// What the slot holds.
    pub slot: Slot,
}

impl Entry {
    /// The record, if the slot is live.
    #[must_use]
    pub const fn record(&self) -> Option<Record> {
        match self.slot {
            Slot::Live(record) => Some(record),
            Slot::Tombstone => None,
        }
    }
}
