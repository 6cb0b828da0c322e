//! Host handle shared by every agent.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{CellFault, CellResult};
use crate::shared::{Budget, CellArray, Clock, Exclusive, SharedArray, Tick};

/// Cloneable handle to one host's shared array, clock and turn budget.
///
/// Every clone sees the same cells. The host advances the tick and opens a
/// budgeted turn for each agent in sequence; agents only read and write
/// cells through this handle.
#[derive(Debug, Clone)]
pub struct Board {
    cells: Arc<RwLock<CellArray>>,
    tick: Arc<AtomicI32>,
    budget: Arc<Budget>,
}

impl Board {
    /// Create a board with `len` zeroed cells at tick 0.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self::from_cells(CellArray::new(len))
    }

    /// Wrap existing cells.
    #[must_use]
    pub fn from_cells(cells: CellArray) -> Self {
        Self {
            cells: Arc::new(RwLock::new(cells)),
            tick: Arc::new(AtomicI32::new(0)),
            budget: Arc::new(Budget::unlimited()),
        }
    }

    /// Set the current tick.
    pub fn set_tick(&self, tick: Tick) {
        self.tick.store(tick, Ordering::Relaxed);
    }

    /// Advance to the next tick and return it.
    pub fn advance_tick(&self) -> Tick {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Start a turn with the given operation budget (`None` = unlimited).
    pub fn begin_turn(&self, budget: Option<u64>) {
        self.budget.reset(budget);
    }

    /// End the current turn, lifting the budget. Returns operations spent.
    pub fn end_turn(&self) -> u64 {
        let spent = self.budget.spent();
        self.budget.reset(None);
        spent
    }

    /// Copy of the current cells, outside of any turn budget.
    ///
    /// # Errors
    ///
    /// Returns [`CellFault::Poisoned`] if the lock is poisoned.
    pub fn snapshot(&self) -> CellResult<CellArray> {
        let cells = self.cells.read().map_err(|_| CellFault::Poisoned)?;
        Ok(cells.clone())
    }
}

impl Clock for Board {
    fn current_tick(&self) -> Tick {
        self.tick.load(Ordering::Relaxed)
    }
}

impl SharedArray for Board {
    fn len(&self) -> usize {
        self.cells.read().map_or(0, |cells| cells.len())
    }

    fn read_cell(&self, offset: usize) -> CellResult<i32> {
        self.budget.charge()?;
        let cells = self.cells.read().map_err(|_| CellFault::Poisoned)?;
        cells.read(offset)
    }

    fn write_cell(&mut self, offset: usize, value: i32) -> CellResult<()> {
        self.budget.charge()?;
        let mut cells = self.cells.write().map_err(|_| CellFault::Poisoned)?;
        cells.write(offset, value)
    }

    fn exclusive(&mut self) -> CellResult<Exclusive<'_>> {
        let guard = self.cells.write().map_err(|_| CellFault::Poisoned)?;
        Ok(Exclusive::locked(guard, &self.budget))
    }
}
