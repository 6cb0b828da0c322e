//! Error types for shared-array access and the record log.

use std::fmt;

use crate::log::RegionKind;

/// Cell access type for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    /// Read access.
    Read,
    /// Write access.
    Write,
}

/// Faults raised by the host array itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFault {
    /// Access outside the array.
    OutOfBounds {
        /// The offending absolute offset.
        offset: usize,
        /// The type of access attempted.
        access: AccessType,
    },
    /// The host ended the turn because its operation budget ran out.
    BudgetExhausted,
    /// The host lock was poisoned by a panicking holder.
    Poisoned,
}

impl fmt::Display for CellFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellFault::OutOfBounds { offset, access } => {
                write!(f, "cell {access:?} out of bounds at offset {offset}")
            }
            CellFault::BudgetExhausted => write!(f, "turn budget exhausted"),
            CellFault::Poisoned => write!(f, "shared array lock poisoned"),
        }
    }
}

impl std::error::Error for CellFault {}

/// Result type for single-cell access.
pub type CellResult<T> = Result<T, CellFault>;

/// Errors raised by record log operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    /// The underlying cell access failed.
    Fault(CellFault),
    /// Appending would exceed the region's reserved capacity.
    RegionExhausted {
        /// Region that is full.
        region: RegionKind,
        /// Current end offset (region-relative).
        end: usize,
        /// Reserved record capacity in cells.
        capacity: usize,
    },
    /// Record ticks must be non-negative; negative values are sentinels.
    InvalidTick(i32),
    /// The region's end pointer does not point inside the region.
    CorruptEndPointer {
        /// Region with the bad pointer.
        region: RegionKind,
        /// Raw value found in the end-pointer cell.
        value: i32,
    },
    /// A slot's first cell holds a negative value that is not a sentinel.
    CorruptSlot {
        /// Region containing the slot.
        region: RegionKind,
        /// Region-relative offset of the slot.
        offset: usize,
        /// Raw value found.
        value: i32,
    },
    /// No terminator was found inside the reserved span.
    Unterminated(RegionKind),
    /// The offset is not a record slot of the live run.
    BadOffset {
        /// Region addressed.
        region: RegionKind,
        /// Region-relative offset given.
        offset: usize,
    },
    /// An absolute index does not fit into a cell value.
    IndexOverflow(usize),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Fault(fault) => write!(f, "{fault}"),
            LogError::RegionExhausted {
                region,
                end,
                capacity,
            } => write!(
                f,
                "{region} region exhausted: end {end} + record exceeds capacity {capacity}"
            ),
            LogError::InvalidTick(tick) => write!(f, "invalid record tick {tick}"),
            LogError::CorruptEndPointer { region, value } => {
                write!(f, "{region} region end pointer {value} is outside the region")
            }
            LogError::CorruptSlot {
                region,
                offset,
                value,
            } => write!(f, "{region} region slot {offset} holds corrupt value {value}"),
            LogError::Unterminated(region) => {
                write!(f, "{region} region has no terminator")
            }
            LogError::BadOffset { region, offset } => {
                write!(f, "{region} region has no record at offset {offset}")
            }
            LogError::IndexOverflow(index) => {
                write!(f, "index {index} does not fit in a cell")
            }
        }
    }
}

impl std::error::Error for LogError {}

impl From<CellFault> for LogError {
    fn from(fault: CellFault) -> Self {
        LogError::Fault(fault)
    }
}

/// Result type for record log operations.
pub type LogResult<T> = Result<T, LogError>;
