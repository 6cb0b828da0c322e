//! Region primitives: append, scan, tombstone.
//!
//! A region is a run of fixed-width records followed by a terminator. The
//! region's end-pointer cell holds the absolute index of that terminator.
//! Every multi-cell mutation orders its writes so that a turn cut off at any
//! point leaves the region readable: the single cell write that makes new
//! data visible always comes last.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};
use crate::log::{Entry, Location, RECORD_WIDTH, Record, Slot, TERMINATOR, TOMBSTONE};
use crate::shared::SharedArray;

/// Fact category stored in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// "This location became dangerous."
    Hazard,
    /// "This location was cleaned."
    Cleared,
}

impl RegionKind {
    /// Both regions, in sync order.
    pub const ALL: [RegionKind; 2] = [RegionKind::Hazard, RegionKind::Cleared];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RegionKind::Hazard => "hazard",
            RegionKind::Cleared => "cleared",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placement of one log region inside the shared array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Fact category.
    pub kind: RegionKind,
    /// Absolute index of the first cell.
    pub start: usize,
    /// Record cells available. A multiple of [`RECORD_WIDTH`].
    pub capacity: usize,
    /// Absolute index of the end-pointer scalar.
    pub end_cell: usize,
}

fn cell_value(index: usize) -> LogResult<i32> {
    i32::try_from(index).map_err(|_| LogError::IndexOverflow(index))
}

impl Region {
    /// Create a region descriptor.
    #[must_use]
    pub const fn new(kind: RegionKind, start: usize, capacity: usize, end_cell: usize) -> Self {
        Self {
            kind,
            start,
            capacity,
            end_cell,
        }
    }

    /// Cells reserved: the record capacity plus one terminator cell.
    #[must_use]
    pub const fn span(&self) -> usize {
        self.capacity + 1
    }

    /// One past the last reserved cell.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.span()
    }

    /// Maximum number of records (live plus tombstoned).
    #[must_use]
    pub const fn max_records(&self) -> usize {
        self.capacity / RECORD_WIDTH
    }

    /// Whether an absolute cell index lies in the reserved span.
    #[must_use]
    pub const fn contains(&self, cell: usize) -> bool {
        cell >= self.start && cell < self.end()
    }

    /// Whether two regions share any cell.
    #[must_use]
    pub const fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Write an empty log: terminator at the start, end pointer to it.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell write fails.
    pub fn init<A: SharedArray + ?Sized>(&self, array: &mut A) -> LogResult<()> {
        array.write_cell(self.start, TERMINATOR)?;
        array.write_cell(self.end_cell, cell_value(self.start)?)?;
        Ok(())
    }

    fn decode_end(&self, raw: i32) -> LogResult<usize> {
        usize::try_from(raw)
            .ok()
            .filter(|&abs| abs >= self.start && abs <= self.start + self.capacity)
            .map(|abs| abs - self.start)
            .filter(|rel| rel % RECORD_WIDTH == 0)
            .ok_or(LogError::CorruptEndPointer {
                region: self.kind,
                value: raw,
            })
    }

    /// Region-relative offset stored in the end pointer.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::CorruptEndPointer`] if the pointer is outside the
    /// region or not record aligned.
    pub fn end_offset<A: SharedArray + ?Sized>(&self, array: &A) -> LogResult<usize> {
        let raw = array.read_cell(self.end_cell)?;
        self.decode_end(raw)
    }

    /// Read one slot. `None` means the terminator.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BadOffset`] for an offset that is not a slot and
    /// [`LogError::CorruptSlot`] if the slot holds garbage.
    pub fn slot<A: SharedArray + ?Sized>(&self, array: &A, offset: usize) -> LogResult<Option<Slot>> {
        if offset % RECORD_WIDTH != 0 || offset >= self.span() {
            return Err(LogError::BadOffset {
                region: self.kind,
                offset,
            });
        }
        let at = self.start + offset;
        match array.read_cell(at)? {
            TERMINATOR => Ok(None),
            TOMBSTONE => Ok(Some(Slot::Tombstone)),
            tick if tick >= 0 && offset + RECORD_WIDTH <= self.capacity => {
                let x = array.read_cell(at + 1)?;
                let y = array.read_cell(at + 2)?;
                Ok(Some(Slot::Live(Record::new(tick, Location::new(x, y)))))
            }
            value => Err(LogError::CorruptSlot {
                region: self.kind,
                offset,
                value,
            }),
        }
    }

    /// Find the terminator by walking from the region start.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Unterminated`] if the reserved span holds none.
    pub fn locate_terminator<A: SharedArray + ?Sized>(&self, array: &A) -> LogResult<usize> {
        let mut offset = 0;
        while offset <= self.capacity {
            if self.slot(array, offset)?.is_none() {
                return Ok(offset);
            }
            offset += RECORD_WIDTH;
        }
        Err(LogError::Unterminated(self.kind))
    }

    /// Trusted end offset, repairing the end pointer if a previous turn was
    /// cut off between publishing a record and moving the pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if no terminator can be found or a cell access fails.
    pub fn heal_end_pointer<A: SharedArray + ?Sized>(&self, array: &mut A) -> LogResult<usize> {
        let raw = array.read_cell(self.end_cell)?;
        if let Ok(end) = self.decode_end(raw)
            && array.read_cell(self.start + end)? == TERMINATOR
        {
            return Ok(end);
        }
        let end = self.locate_terminator(array)?;
        tracing::warn!(region = %self.kind, stale = raw, end, "repairing end pointer");
        array.write_cell(self.end_cell, cell_value(self.start + end)?)?;
        Ok(end)
    }

    /// Append a record and return its region-relative offset.
    ///
    /// Write order: new terminator, `x`, `y`, then the tick over the old
    /// terminator (publishing the record), then the end pointer.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::RegionExhausted`] without writing anything if the
    /// record does not fit, [`LogError::InvalidTick`] for a negative tick.
    pub fn append<A: SharedArray + ?Sized>(&self, array: &mut A, record: Record) -> LogResult<usize> {
        if record.tick < 0 {
            return Err(LogError::InvalidTick(record.tick));
        }
        let end = self.heal_end_pointer(array)?;
        if end + RECORD_WIDTH > self.capacity {
            return Err(LogError::RegionExhausted {
                region: self.kind,
                end,
                capacity: self.capacity,
            });
        }
        let at = self.start + end;
        let next = cell_value(at + RECORD_WIDTH)?;
        array.write_cell(at + RECORD_WIDTH, TERMINATOR)?;
        array.write_cell(at + 1, record.location.x)?;
        array.write_cell(at + 2, record.location.y)?;
        array.write_cell(at, record.tick)?;
        array.write_cell(self.end_cell, next)?;
        Ok(end)
    }

    /// Scan from the region start.
    #[must_use]
    pub fn scan<'a, A: SharedArray + ?Sized>(&self, array: &'a A) -> Scan<'a, A> {
        self.scan_from(array, 0)
    }

    /// Scan from a previously observed offset.
    #[must_use]
    pub fn scan_from<'a, A: SharedArray + ?Sized>(&self, array: &'a A, offset: usize) -> Scan<'a, A> {
        Scan {
            array,
            region: *self,
            offset,
            done: false,
        }
    }

    /// Tombstone the record at `offset`. Returns `false` if it already was.
    ///
    /// The tick cell is overwritten first, which deletes the record in one
    /// write; the coordinate cells follow.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BadOffset`] if `offset` is not a slot before the
    /// terminator.
    pub fn tombstone<A: SharedArray + ?Sized>(&self, array: &mut A, offset: usize) -> LogResult<bool> {
        let end = self.heal_end_pointer(array)?;
        if offset >= end {
            return Err(LogError::BadOffset {
                region: self.kind,
                offset,
            });
        }
        match self.slot(array, offset)? {
            Some(Slot::Tombstone) => Ok(false),
            Some(Slot::Live(_)) => {
                self.write_tombstone(array, offset)?;
                Ok(true)
            }
            None => Err(LogError::BadOffset {
                region: self.kind,
                offset,
            }),
        }
    }

    pub(crate) fn write_tombstone<A: SharedArray + ?Sized>(
        &self,
        array: &mut A,
        offset: usize,
    ) -> LogResult<()> {
        let at = self.start + offset;
        for cell in at..at + RECORD_WIDTH {
            array.write_cell(cell, TOMBSTONE)?;
        }
        Ok(())
    }

    /// Move a live record to `offset`, which must already be consumed.
    ///
    /// The destination is first marked as a tombstone so a cut-off copy is
    /// never read as a record with mixed coordinates.
    pub(crate) fn write_record_at<A: SharedArray + ?Sized>(
        &self,
        array: &mut A,
        offset: usize,
        record: Record,
    ) -> LogResult<()> {
        let at = self.start + offset;
        array.write_cell(at, TOMBSTONE)?;
        array.write_cell(at + 1, record.location.x)?;
        array.write_cell(at + 2, record.location.y)?;
        array.write_cell(at, record.tick)?;
        Ok(())
    }

    /// Truncate the log at `offset`: end pointer first, then terminator.
    ///
    /// A turn cut off between the two leaves a pointer at a non-terminator,
    /// which the next [`Region::heal_end_pointer`] resolves back to the old
    /// terminator.
    pub(crate) fn truncate_at<A: SharedArray + ?Sized>(
        &self,
        array: &mut A,
        offset: usize,
    ) -> LogResult<()> {
        let at = self.start + offset;
        array.write_cell(self.end_cell, cell_value(at)?)?;
        array.write_cell(at, TERMINATOR)?;
        Ok(())
    }
}

/// Lazy, finite walk over a region's slots up to the terminator.
#[derive(Debug)]
pub struct Scan<'a, A: ?Sized> {
    array: &'a A,
    region: Region,
    offset: usize,
    done: bool,
}

impl<A: SharedArray + ?Sized> Iterator for Scan<'_, A> {
    type Item = LogResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.offset > self.region.capacity {
            self.done = true;
            return Some(Err(LogError::Unterminated(self.region.kind)));
        }
        match self.region.slot(self.array, self.offset) {
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some(slot)) => {
                let entry = Entry {
                    offset: self.offset,
                    slot,
                };
                self.offset += RECORD_WIDTH;
                Some(Ok(entry))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
