//! The host's shared integer array.
//!
//! Agents never talk to each other directly. The only channel they share is
//! a fixed-length array of `i32` cells with single-cell atomicity and nothing
//! more. [`SharedArray`] is that contract; [`CellArray`] is a plain owned
//! implementation and [`Board`] is the cloneable host handle injected into
//! every agent.

mod board;
mod cells;

pub use board::Board;
pub use cells::CellArray;

use std::ops::{Deref, DerefMut};
use std::sync::RwLockWriteGuard;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CellFault, CellResult};

/// A game tick. Non-negative; negative cell values are log sentinels.
pub type Tick = i32;

/// Single-cell access to the shared array.
pub trait SharedArray {
    /// Number of cells.
    fn len(&self) -> usize;

    /// Whether the array has no cells.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one cell.
    ///
    /// # Errors
    ///
    /// Returns a [`CellFault`] if the offset is out of bounds or the host
    /// refuses the access.
    fn read_cell(&self, offset: usize) -> CellResult<i32>;

    /// Write one cell.
    ///
    /// # Errors
    ///
    /// Returns a [`CellFault`] if the offset is out of bounds or the host
    /// refuses the access.
    fn write_cell(&mut self, offset: usize, value: i32) -> CellResult<()>;

    /// Enter a scope with exclusive access to the whole array.
    ///
    /// Multi-cell rewrites that must not interleave with other agents (the
    /// compaction pass) run inside this scope.
    ///
    /// # Errors
    ///
    /// Returns [`CellFault::Poisoned`] if exclusive access cannot be taken.
    fn exclusive(&mut self) -> CellResult<Exclusive<'_>>;
}

/// Source of the current tick, identical for every agent during one tick.
pub trait Clock {
    /// The current tick.
    fn current_tick(&self) -> Tick;
}

/// Sentinel for an unlimited budget.
const UNLIMITED: u64 = u64::MAX;

/// Per-turn operation budget shared by every handle to one host.
#[derive(Debug)]
pub(crate) struct Budget {
    remaining: AtomicU64,
    spent: AtomicU64,
}

impl Budget {
    pub(crate) fn unlimited() -> Self {
        Self {
            remaining: AtomicU64::new(UNLIMITED),
            spent: AtomicU64::new(0),
        }
    }

    /// Charge one cell operation.
    pub(crate) fn charge(&self) -> CellResult<()> {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| match left {
                UNLIMITED => Some(UNLIMITED),
                0 => None,
                n => Some(n - 1),
            })
            .map_err(|_| CellFault::BudgetExhausted)?;
        self.spent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn reset(&self, limit: Option<u64>) {
        self.remaining
            .store(limit.unwrap_or(UNLIMITED), Ordering::Relaxed);
        self.spent.store(0, Ordering::Relaxed);
    }

    pub(crate) fn spent(&self) -> u64 {
        self.spent.load(Ordering::Relaxed)
    }
}

/// Cells held for the duration of an exclusive scope.
#[derive(Debug)]
enum HeldCells<'a> {
    Locked(RwLockWriteGuard<'a, CellArray>),
    Borrowed(&'a mut CellArray),
}

impl Deref for HeldCells<'_> {
    type Target = CellArray;

    fn deref(&self) -> &CellArray {
        match self {
            HeldCells::Locked(guard) => &**guard,
            HeldCells::Borrowed(cells) => &**cells,
        }
    }
}

impl DerefMut for HeldCells<'_> {
    fn deref_mut(&mut self) -> &mut CellArray {
        match self {
            HeldCells::Locked(guard) => &mut **guard,
            HeldCells::Borrowed(cells) => &mut **cells,
        }
    }
}

/// Exclusive access to an array for the lifetime of the scope.
///
/// Still charges the host budget per cell, so a turn can be cut off in the
/// middle of an exclusive pass.
#[derive(Debug)]
pub struct Exclusive<'a> {
    cells: HeldCells<'a>,
    budget: Option<&'a Budget>,
}

impl<'a> Exclusive<'a> {
    fn locked(guard: RwLockWriteGuard<'a, CellArray>, budget: &'a Budget) -> Self {
        Self {
            cells: HeldCells::Locked(guard),
            budget: Some(budget),
        }
    }

    fn borrowed(cells: &'a mut CellArray) -> Self {
        Self {
            cells: HeldCells::Borrowed(cells),
            budget: None,
        }
    }

    fn charge(&self) -> CellResult<()> {
        match self.budget {
            Some(budget) => budget.charge(),
            None => Ok(()),
        }
    }
}

impl SharedArray for Exclusive<'_> {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn read_cell(&self, offset: usize) -> CellResult<i32> {
        self.charge()?;
        self.cells.read(offset)
    }

    fn write_cell(&mut self, offset: usize, value: i32) -> CellResult<()> {
        self.charge()?;
        self.cells.write(offset, value)
    }

    fn exclusive(&mut self) -> CellResult<Exclusive<'_>> {
        Ok(Exclusive {
            cells: HeldCells::Borrowed(&mut *self.cells),
            budget: self.budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_counts_down() {
        let budget = Budget::unlimited();
        budget.reset(Some(2));
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_ok());
        assert_eq!(budget.charge(), Err(CellFault::BudgetExhausted));
        assert_eq!(budget.spent(), 2);
    }

    #[test]
    fn test_unlimited_budget_never_runs_out() {
        let budget = Budget::unlimited();
        for _ in 0..1000 {
            assert!(budget.charge().is_ok());
        }
        assert_eq!(budget.spent(), 1000);
    }

    #[test]
    fn test_nested_exclusive_shares_cells() {
        let mut cells = CellArray::new(8);
        let mut outer = cells.exclusive().unwrap();
        {
            let mut inner = outer.exclusive().unwrap();
            inner.write_cell(3, 7).unwrap();
        }
        assert_eq!(outer.read_cell(3).unwrap(), 7);
    }
}
