// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Hivelog: a bounded broadcast log over one shared integer array.
//!
//! Independent, memory-isolated game agents share exactly one fixed-size
//! array of `i32` cells. This crate builds on that primitive:
//! - An append-only record log in two disjoint regions (hazard and cleared
//!   facts), with tombstones and in-place compaction
//! - Watermark sync that folds new facts into each agent's working set
//! - A production scheduler keeping the global unit mix on target
//! - A deterministic simulation host with per-turn operation budgets
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Simulation host (sim, CLI, TUI)   │
//! ├─────────────────────────────────────┤
//! │   Agent: publish / sync / produce   │
//! ├──────────────┬──────────────────────┤
//! │  Record log  │  Production scheduler│
//! ├──────────────┴──────────────────────┤
//! │   Shared array (Board, CellArray)   │
//! └─────────────────────────────────────┘
//! ```

pub mod agent;
pub mod error;
pub mod layout;
pub mod log;
pub mod scheduler;
pub mod shared;
pub mod sim;
pub mod sync;

pub use agent::{Agent, AgentError, AgentResult, AreaPublish, Publish, Role};
pub use error::{AccessType, CellFault, CellResult, LogError, LogResult};
pub use layout::{Layout, LayoutError};
pub use log::{Location, MaintenanceReport, Record, RecordLog, RegionKind};
pub use scheduler::{Builder, Counters, Gate, ProductionPlan, Producer, UnitKind};
pub use shared::{Board, CellArray, Clock, SharedArray, Tick};
pub use sim::{MaintenanceOrder, SimConfig, SimError, SimResult, Simulation, run_sim};
pub use sync::{SyncReport, Watermarks, WorkingSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports_cover_the_agent_contract() {
        let layout = Layout::compact(9);
        let board = Board::new(layout.len);
        let mut agent = Agent::new(
            board.clone(),
            layout,
            std::sync::Arc::new(ProductionPlan::default()),
            Role::Privileged,
        );
        agent.init_board().unwrap();
        board.set_tick(1);
        let publish = agent.publish_hazard(Location::new(1, 2)).unwrap();
        assert_eq!(publish, Publish::Appended(0));
        assert!(agent.is_known_hazard(Location::new(1, 2)));
    }
}
