//! Log invariants - structural checks that detect bugs.
//!
//! A region written only through [`Region`] operations should never show a
//! non-recoverable violation, even when turns are cut off by the host
//! budget. Recoverable violations are the transient states a cut-off turn
//! may leave behind; the next append or maintenance pass repairs them.

use std::fmt;

use crate::layout::Layout;
use crate::log::{RECORD_WIDTH, Region, RegionKind, Slot, TERMINATOR, TOMBSTONE};
use crate::shared::SharedArray;

/// Invariant violation found in one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Region checked.
    pub region: RegionKind,
    /// Whether the next append or maintenance pass repairs it.
    pub recoverable: bool,
    /// Description of the violated invariant.
    pub message: String,
}

impl InvariantViolation {
    fn fatal(region: RegionKind, message: String) -> Self {
        Self {
            region,
            recoverable: false,
            message,
        }
    }

    fn transient(region: RegionKind, message: String) -> Self {
        Self {
            region,
            recoverable: true,
            message,
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invariant violation in {} region: {}", self.region, self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check one region.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_region<A: SharedArray + ?Sized>(
    array: &A,
    layout: &Layout,
    kind: RegionKind,
) -> Vec<InvariantViolation> {
    let region = layout.region(kind);
    let mut violations = Vec::new();

    for entry in region.scan(array) {
        match entry {
            Ok(entry) => {
                if entry.slot == Slot::Tombstone {
                    check_tombstone(array, &region, entry.offset, &mut violations);
                }
            }
            Err(err) => {
                violations.push(InvariantViolation::fatal(kind, err.to_string()));
                return violations;
            }
        }
    }
    let terminator = region.locate_terminator(array).ok();

    let raw = match array.read_cell(region.end_cell) {
        Ok(raw) => raw,
        Err(fault) => {
            violations.push(InvariantViolation::fatal(kind, fault.to_string()));
            return violations;
        }
    };
    let Ok(recorded) = region.end_offset(array) else {
        violations.push(InvariantViolation::fatal(
            kind,
            format!("end pointer {raw} is outside the region or misaligned"),
        ));
        return violations;
    };

    if let Some(actual) = terminator
        && recorded != actual
    {
        let at_terminator = array
            .read_cell(region.start + recorded)
            .is_ok_and(|value| value == TERMINATOR);
        if at_terminator {
            violations.push(InvariantViolation::fatal(
                kind,
                format!("end pointer {recorded} is past the first terminator at {actual}"),
            ));
        } else {
            violations.push(InvariantViolation::transient(
                kind,
                format!("end pointer {recorded} is stale, terminator at {actual}"),
            ));
        }
    }

    violations
}

fn check_tombstone<A: SharedArray + ?Sized>(
    array: &A,
    region: &Region,
    offset: usize,
    violations: &mut Vec<InvariantViolation>,
) {
    let at = region.start + offset;
    let torn = (at + 1..at + RECORD_WIDTH)
        .any(|cell| array.read_cell(cell).is_ok_and(|value| value != TOMBSTONE));
    if torn {
        violations.push(InvariantViolation::transient(
            region.kind,
            format!("tombstone at {offset} does not fill its slot"),
        ));
    }
}

/// Check both regions and their placement.
#[must_use]
pub fn check_all<A: SharedArray + ?Sized>(array: &A, layout: &Layout) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    if let Err(err) = layout.validate() {
        violations.push(InvariantViolation::fatal(RegionKind::Hazard, err.to_string()));
        return violations;
    }
    if layout.len > array.len() {
        violations.push(InvariantViolation::fatal(
            RegionKind::Hazard,
            format!("layout needs {} cells, array has {}", layout.len, array.len()),
        ));
        return violations;
    }
    for kind in RegionKind::ALL {
        violations.extend(check_region(array, layout, kind));
    }
    violations
}

/// Assert no non-recoverable violation exists, panicking otherwise.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants<A: SharedArray + ?Sized>(array: &A, layout: &Layout) {
    let violations: Vec<_> = check_all(array, layout)
        .into_iter()
        .filter(|v| !v.recoverable)
        .collect();
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
        panic!("Log invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants<A: SharedArray + ?Sized>(_array: &A, _layout: &Layout) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Location, Record};
    use crate::shared::CellArray;

    fn create_valid_log() -> (CellArray, Layout) {
        let layout = Layout::compact(15);
        let mut cells = CellArray::new(layout.len);
        for kind in RegionKind::ALL {
            let region = layout.region(kind);
            region.init(&mut cells).unwrap();
            region
                .append(&mut cells, Record::new(1, Location::new(2, 3)))
                .unwrap();
            region
                .append(&mut cells, Record::new(2, Location::new(4, 5)))
                .unwrap();
        }
        (cells, layout)
    }

    #[test]
    fn test_valid_log_passes() {
        let (cells, layout) = create_valid_log();
        assert!(check_all(&cells, &layout).is_empty());
        assert_invariants(&cells, &layout);
    }

    #[test]
    fn test_tombstoned_log_passes() {
        let (mut cells, layout) = create_valid_log();
        layout
            .region(RegionKind::Hazard)
            .tombstone(&mut cells, 0)
            .unwrap();
        assert!(check_all(&cells, &layout).is_empty());
    }

    #[test]
    fn test_stale_end_pointer_is_recoverable() {
        let (mut cells, layout) = create_valid_log();
        let region = layout.region(RegionKind::Hazard);
        cells
            .write(region.end_cell, i32::try_from(region.start + 3).unwrap())
            .unwrap();

        let violations = check_region(&cells, &layout, RegionKind::Hazard);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].recoverable);
        assert!(violations[0].message.contains("stale"));

        region.heal_end_pointer(&mut cells).unwrap();
        assert!(check_region(&cells, &layout, RegionKind::Hazard).is_empty());
    }

    #[test]
    fn test_shadowed_terminator_is_fatal() {
        let (mut cells, layout) = create_valid_log();
        let region = layout.region(RegionKind::Cleared);
        cells.write(region.start + 3, TERMINATOR).unwrap();

        let violations = check_region(&cells, &layout, RegionKind::Cleared);
        assert_eq!(violations.len(), 1);
        assert!(!violations[0].recoverable);
        assert!(violations[0].message.contains("past the first terminator"));
    }

    #[test]
    fn test_corrupt_slot_detected() {
        let (mut cells, layout) = create_valid_log();
        let region = layout.region(RegionKind::Hazard);
        cells.write(region.start, -9).unwrap();

        let violations = check_region(&cells, &layout, RegionKind::Hazard);
        assert!(!violations.is_empty());
        assert!(!violations[0].recoverable);
        assert!(violations[0].message.contains("-9"));
    }

    #[test]
    fn test_torn_tombstone_is_recoverable() {
        let (mut cells, layout) = create_valid_log();
        let region = layout.region(RegionKind::Hazard);
        cells.write(region.start, TOMBSTONE).unwrap();

        let violations = check_region(&cells, &layout, RegionKind::Hazard);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].recoverable);
        assert_invariants(&cells, &layout);
    }

    #[test]
    fn test_corrupt_end_pointer_detected() {
        let (mut cells, layout) = create_valid_log();
        let region = layout.region(RegionKind::Hazard);
        cells.write(region.end_cell, 1).unwrap();

        let violations = check_region(&cells, &layout, RegionKind::Hazard);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("end pointer 1"));
    }

    #[test]
    fn test_short_array_detected() {
        let (_, layout) = create_valid_log();
        let cells = CellArray::new(layout.len - 1);
        let violations = check_all(&cells, &layout);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("cells"));
    }
}
