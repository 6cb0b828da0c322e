//! Deterministic, turn-sequential simulation host.
//!
//! One [`Board`](crate::shared::Board) per run. Every tick the host moves
//! the hazard sources, then gives each unit one budgeted turn in creation
//! order (the privileged base first or last, see [`MaintenanceOrder`]).
//! Units talk to each other only through their [`Agent`](crate::Agent).
//!
//! # Determinism
//!
//! Given the same seed and [`SimConfig`], [`run_sim`] always produces the
//! same [`SimResult`].

mod rng;
mod runner;
mod world;

pub use runner::{Simulation, UnitView};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CellFault, LogError};
use crate::layout::{Layout, LayoutError};
use crate::log::{DEFAULT_MAX_AGE, MaintenanceReport};
use crate::scheduler::{ProductionPlan, UnitKind};
use crate::shared::Tick;

/// When the privileged base takes its turn within a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceOrder {
    /// Before every other unit. A fact published late in tick `t` can be
    /// expired at the start of tick `t + max_age` before slow units see it.
    #[default]
    First,
    /// After every other unit.
    Last,
}

/// Simulation parameters. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks to run.
    pub ticks: u32,
    /// Grid width.
    pub width: i32,
    /// Grid height.
    pub height: i32,
    /// Cell operations per unit turn (`None` = unlimited).
    pub op_budget: Option<u64>,
    /// Base turn position.
    pub maintenance_order: MaintenanceOrder,
    /// Expiry age in ticks.
    pub max_age: Tick,
    /// Chance per tick that a new hazard source appears.
    pub source_spawn_chance: f64,
    /// Cap on simultaneous hazard sources.
    pub max_sources: usize,
    /// Chance a production attempt with a free adjacent cell succeeds.
    pub produce_chance: f64,
    /// How far units see hazard sources (euclidean).
    pub vision_radius: i32,
    /// A known hazard is cleared only with no source this close (Chebyshev).
    pub danger_radius: i32,
    /// Cap on units alive, base included.
    pub max_units: usize,
    /// Shared array map.
    pub layout: Layout,
    /// Production plan shared by every unit.
    pub plan: ProductionPlan,
    /// Count invariant violations after every tick.
    pub check_invariants: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 200,
            width: 32,
            height: 32,
            op_budget: Some(20_000),
            maintenance_order: MaintenanceOrder::First,
            max_age: DEFAULT_MAX_AGE,
            source_spawn_chance: 0.1,
            max_sources: 6,
            produce_chance: 0.5,
            vision_radius: 4,
            danger_radius: 1,
            max_units: 60,
            layout: Layout::compact(3_000),
            plan: ProductionPlan::default(),
            check_invariants: true,
        }
    }
}

impl SimConfig {
    /// Parse a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        serde_json::from_str(json).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.width < 3 || self.height < 3 {
            return Err(SimError::Config(format!(
                "grid {}x{} is smaller than 3x3",
                self.width, self.height
            )));
        }
        if self.max_age < 0 {
            return Err(SimError::Config(format!("negative max age {}", self.max_age)));
        }
        if self.max_units == 0 {
            return Err(SimError::Config("max_units must be at least 1".to_string()));
        }
        self.layout.validate().map_err(SimError::Layout)
    }
}

/// Outcome of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimResult {
    /// Seed used.
    pub seed: u64,
    /// Ticks played.
    pub ticks: u32,
    /// Units ever built per kind.
    pub produced: BTreeMap<UnitKind, u32>,
    /// Units alive at the end per kind (shared counters).
    pub alive: BTreeMap<UnitKind, u32>,
    /// Mobile units destroyed by hazard sources.
    pub losses: u64,
    /// Records appended.
    pub publishes: u64,
    /// Publishes dropped because a region was full.
    pub dropped_publishes: u64,
    /// Maintenance totals over the run.
    pub maintenance: MaintenanceReport,
    /// Highest hazard-region end offset seen, in records.
    pub peak_hazard_records: usize,
    /// Highest cleared-region end offset seen, in records.
    pub peak_cleared_records: usize,
    /// Turns ended early by the op budget.
    pub budget_cutoffs: u64,
    /// Turns that failed for any other reason.
    pub turn_errors: u64,
    /// Non-recoverable invariant violations observed.
    pub invariant_violations: u64,
    /// Cell operations spent by all units.
    pub total_ops: u64,
    /// Units alive at the end, base included.
    pub units: usize,
    /// Checksum of the final array.
    pub checksum: u64,
}

/// Errors that stop a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Bad parameters.
    Config(String),
    /// Bad layout.
    Layout(LayoutError),
    /// The board could not be initialised.
    Init(LogError),
    /// The host array failed.
    Host(CellFault),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(reason) => write!(f, "invalid config: {reason}"),
            SimError::Layout(err) => write!(f, "invalid layout: {err}"),
            SimError::Init(err) => write!(f, "board initialisation failed: {err}"),
            SimError::Host(fault) => write!(f, "host array failed: {fault}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<CellFault> for SimError {
    fn from(fault: CellFault) -> Self {
        SimError::Host(fault)
    }
}

/// Run a complete simulation.
///
/// This is the main entry point - a pure function from inputs to result.
///
/// # Errors
///
/// Returns an error if the config is invalid or the host array fails.
pub fn run_sim(seed: u64, config: &SimConfig) -> Result<SimResult, SimError> {
    let mut sim = Simulation::new(seed, config)?;
    while !sim.is_finished() {
        sim.step()?;
    }
    sim.result()
}
