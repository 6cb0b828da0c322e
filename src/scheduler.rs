//! Production scheduler over shared build counters.
//!
//! Every producer decides independently, from the counters in the shared
//! array, whether it should try to build a kind this turn. Two phases:
//!
//! 1. **Fixed order.** While the build-progress cell is below the length of
//!    [`ProductionPlan::build_order`], only `build_order[progress]` is built.
//! 2. **Gated.** Each kind is checked against its [`Gate`]: threshold kinds
//!    build until their current count reaches the target; ratio kinds build
//!    while their lifetime count is at or below every other ratio kind's
//!    weighted share.
//!
//! Two producers may both see "eligible" before either records; the extra
//! unit is absorbed by later decisions.

mod kind;

pub use kind::{Builder, UnitKind};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CellResult;
use crate::layout::Layout;
use crate::shared::SharedArray;

/// Eligibility rule for one kind once the fixed order is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    /// Build while the current count is below `target`.
    Threshold {
        /// Desired number alive.
        target: u32,
    },
    /// Build while `lifetime / weight` is minimal among ratio kinds.
    Ratio {
        /// Share of production. Zero disables the kind.
        weight: u32,
    },
}

/// Build order plus per-kind gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionPlan {
    /// Kinds built, in order, before gates apply.
    pub build_order: Vec<UnitKind>,
    /// Gate per kind. Kinds without a gate are not built after the fixed
    /// order.
    pub gates: BTreeMap<UnitKind, Gate>,
}

impl Default for ProductionPlan {
    fn default() -> Self {
        let gates = [
            (UnitKind::Farm, Gate::Threshold { target: 0 }),
            (UnitKind::Laboratory, Gate::Threshold { target: 2 }),
            (UnitKind::Barracks, Gate::Threshold { target: 2 }),
            (UnitKind::Hospital, Gate::Threshold { target: 0 }),
            (UnitKind::Market, Gate::Threshold { target: 0 }),
            (UnitKind::Infecter, Gate::Threshold { target: 2 }),
            (UnitKind::Worker, Gate::Ratio { weight: 2 }),
            (UnitKind::Soldier, Gate::Ratio { weight: 8 }),
            (UnitKind::Fumigator, Gate::Ratio { weight: 3 }),
        ];
        Self {
            build_order: vec![UnitKind::Worker, UnitKind::Worker, UnitKind::Barracks],
            gates: gates.into_iter().collect(),
        }
    }
}

/// Production attempt collaborator (placement, adjacency, resources).
pub trait Producer {
    /// Try to build one unit of `kind`. Must have no effect on failure.
    fn attempt_produce(&mut self, kind: UnitKind) -> bool;
}

impl<F: FnMut(UnitKind) -> bool> Producer for F {
    fn attempt_produce(&mut self, kind: UnitKind) -> bool {
        self(kind)
    }
}

/// Snapshot of the shared build counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Currently alive per kind, indexed by [`UnitKind::index`].
    pub current: [u32; UnitKind::COUNT],
    /// Ever built per kind.
    pub lifetime: [u32; UnitKind::COUNT],
    /// Fixed-order progress.
    pub progress: u32,
}

/// Negative cells (never written by the scheduler) read as zero.
fn read_count<A: SharedArray + ?Sized>(array: &A, cell: usize) -> CellResult<u32> {
    Ok(u32::try_from(array.read_cell(cell)?).unwrap_or(0))
}

fn bump<A: SharedArray + ?Sized>(array: &mut A, cell: usize, delta: i32) -> CellResult<i32> {
    let value = array.read_cell(cell)?.saturating_add(delta).max(0);
    array.write_cell(cell, value)?;
    Ok(value)
}

impl Counters {
    /// Read every counter.
    ///
    /// # Errors
    ///
    /// Returns the first cell fault.
    pub fn read<A: SharedArray + ?Sized>(array: &A, layout: &Layout) -> CellResult<Self> {
        let mut counters = Counters {
            progress: read_count(array, layout.build_progress)?,
            ..Counters::default()
        };
        for kind in UnitKind::ALL {
            counters.current[kind.index()] = read_count(array, layout.counter_cell(kind))?;
            counters.lifetime[kind.index()] = read_count(array, layout.lifetime_cell(kind))?;
        }
        Ok(counters)
    }

    /// Currently alive of `kind`.
    #[must_use]
    pub const fn current(&self, kind: UnitKind) -> u32 {
        self.current[kind.index()]
    }

    /// Ever built of `kind`.
    #[must_use]
    pub const fn lifetime(&self, kind: UnitKind) -> u32 {
        self.lifetime[kind.index()]
    }
}

impl ProductionPlan {
    /// Whether the fixed-order phase is over at `progress`.
    #[must_use]
    pub fn fixed_order_done(&self, progress: u32) -> bool {
        usize::try_from(progress).map_or(true, |p| p >= self.build_order.len())
    }

    /// Decide whether `kind` should be attempted this turn.
    ///
    /// Reads only the cells the decision needs.
    ///
    /// # Errors
    ///
    /// Returns the first cell fault.
    pub fn should_produce<A: SharedArray + ?Sized>(
        &self,
        array: &A,
        layout: &Layout,
        kind: UnitKind,
    ) -> CellResult<bool> {
        let progress = read_count(array, layout.build_progress)?;
        if !self.fixed_order_done(progress) {
            let next = usize::try_from(progress)
                .ok()
                .and_then(|p| self.build_order.get(p));
            return Ok(next == Some(&kind));
        }
        match self.gates.get(&kind) {
            None => Ok(false),
            Some(&Gate::Threshold { target }) => {
                Ok(read_count(array, layout.counter_cell(kind))? < target)
            }
            Some(&Gate::Ratio { weight }) => self.ratio_eligible(array, layout, kind, weight),
        }
    }

    fn ratio_eligible<A: SharedArray + ?Sized>(
        &self,
        array: &A,
        layout: &Layout,
        kind: UnitKind,
        weight: u32,
    ) -> CellResult<bool> {
        if weight == 0 {
            return Ok(false);
        }
        let built = u64::from(read_count(array, layout.lifetime_cell(kind))?);
        for (&other, gate) in &self.gates {
            let Gate::Ratio {
                weight: other_weight,
            } = *gate
            else {
                continue;
            };
            if other == kind || other_weight == 0 {
                continue;
            }
            let other_built = u64::from(read_count(array, layout.lifetime_cell(other))?);
            // built / weight <= other_built / other_weight
            if built * u64::from(other_weight) > other_built * u64::from(weight) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Record one successful production of `kind`.
    ///
    /// Increments the kind's current and lifetime counters, and the build
    /// progress while the fixed order is running.
    ///
    /// # Errors
    ///
    /// Returns the first cell fault. Counters written before the fault stay
    /// written.
    pub fn record_produced<A: SharedArray + ?Sized>(
        &self,
        array: &mut A,
        layout: &Layout,
        kind: UnitKind,
    ) -> CellResult<()> {
        bump(array, layout.counter_cell(kind), 1)?;
        bump(array, layout.lifetime_cell(kind), 1)?;
        let progress = read_count(array, layout.build_progress)?;
        if !self.fixed_order_done(progress) {
            bump(array, layout.build_progress, 1)?;
        }
        Ok(())
    }

    /// Record the loss of one unit of `kind`.
    ///
    /// Only the current count drops (never below zero) so threshold kinds
    /// rebuild; lifetime counts are untouched.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn record_lost<A: SharedArray + ?Sized>(
        &self,
        array: &mut A,
        layout: &Layout,
        kind: UnitKind,
    ) -> CellResult<()> {
        bump(array, layout.counter_cell(kind), -1).map(|_| ())
    }

    /// Ask, attempt, and record exactly once on success.
    ///
    /// # Errors
    ///
    /// Returns the first cell fault.
    pub fn try_produce<A: SharedArray + ?Sized, P: Producer + ?Sized>(
        &self,
        array: &mut A,
        layout: &Layout,
        kind: UnitKind,
        producer: &mut P,
    ) -> CellResult<bool> {
        if !self.should_produce(&*array, layout, kind)? {
            return Ok(false);
        }
        if !producer.attempt_produce(kind) {
            return Ok(false);
        }
        self.record_produced(array, layout, kind)?;
        Ok(true)
    }
}
