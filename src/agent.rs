//! The per-agent contract over the shared log and scheduler.
//!
//! Each game unit owns one [`Agent`], built around an injected host handle.
//! Agents never see each other; everything they share goes through the
//! array.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CellFault, LogError};
use crate::layout::Layout;
use crate::log::{DEFAULT_MAX_AGE, Location, MaintenanceReport, Record, RecordLog, RegionKind};
use crate::scheduler::{Counters, ProductionPlan, Producer, UnitKind};
use crate::shared::{Clock, SharedArray, Tick};
use crate::sync::{self, SyncReport, Watermarks, WorkingSet};

/// What an agent is allowed to do to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May tombstone and compact. Exactly one per host.
    Privileged,
    /// May append and scan.
    Member,
}

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The record was appended at this offset.
    Appended(usize),
    /// The region was full; the fact was dropped for now.
    Dropped,
}

/// Outcome of [`Agent::publish_hazard_area`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaPublish {
    /// Locations appended.
    pub appended: usize,
    /// Locations already known, not republished.
    pub skipped: usize,
    /// Locations dropped because the region was full.
    pub dropped: usize,
}

/// Errors surfaced to agent logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentError {
    /// A member tried a privileged operation.
    NotPrivileged,
    /// The log operation failed.
    Log(LogError),
}

impl AgentError {
    /// Whether the host ended the turn.
    #[must_use]
    pub const fn is_budget_exhausted(&self) -> bool {
        matches!(
            self,
            AgentError::Log(LogError::Fault(CellFault::BudgetExhausted))
        )
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::NotPrivileged => write!(f, "operation requires the privileged role"),
            AgentError::Log(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::NotPrivileged => None,
            AgentError::Log(err) => Some(err),
        }
    }
}

impl From<LogError> for AgentError {
    fn from(err: LogError) -> Self {
        AgentError::Log(err)
    }
}

impl From<CellFault> for AgentError {
    fn from(fault: CellFault) -> Self {
        AgentError::Log(LogError::Fault(fault))
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// One agent's view of the shared log and production counters.
#[derive(Debug)]
pub struct Agent<A> {
    log: RecordLog<A>,
    plan: Arc<ProductionPlan>,
    role: Role,
    known: WorkingSet,
    marks: Watermarks,
    max_age: Tick,
}

impl<A: SharedArray + Clock> Agent<A> {
    /// Create an agent with an empty working set and zero watermarks.
    #[must_use]
    pub fn new(array: A, layout: Layout, plan: Arc<ProductionPlan>, role: Role) -> Self {
        Self {
            log: RecordLog::new(array, layout),
            plan,
            role,
            known: WorkingSet::new(),
            marks: Watermarks::default(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Set the expiry age used by [`Agent::run_maintenance`].
    #[must_use]
    pub fn with_max_age(mut self, max_age: Tick) -> Self {
        self.max_age = max_age;
        self
    }

    /// The agent's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The agent's working set.
    #[must_use]
    pub fn known(&self) -> &WorkingSet {
        &self.known
    }

    /// The agent's watermarks.
    #[must_use]
    pub fn watermarks(&self) -> Watermarks {
        self.marks
    }

    /// The underlying log.
    #[must_use]
    pub fn log(&self) -> &RecordLog<A> {
        &self.log
    }

    /// The production plan.
    #[must_use]
    pub fn plan(&self) -> &ProductionPlan {
        &self.plan
    }

    fn require_privileged(&self) -> AgentResult<()> {
        match self.role {
            Role::Privileged => Ok(()),
            Role::Member => Err(AgentError::NotPrivileged),
        }
    }

    /// Write empty logs. Done once, by the privileged agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotPrivileged`] for members.
    pub fn init_board(&mut self) -> AgentResult<()> {
        self.require_privileged()?;
        self.log.init()?;
        Ok(())
    }

    fn publish(&mut self, kind: RegionKind, location: Location) -> AgentResult<Publish> {
        let now = self.log.array().current_tick();
        // Only a fact that reached the log enters the working set, so a
        // dropped or cut-off publish is retried on a later turn.
        match self.log.append(kind, Record::new(now, location)) {
            Ok(offset) => {
                self.known.apply(kind, location);
                Ok(Publish::Appended(offset))
            }
            Err(LogError::RegionExhausted { end, capacity, .. }) => {
                tracing::warn!(region = %kind, x = location.x, y = location.y, end, capacity, "dropping publish, region full");
                Ok(Publish::Dropped)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Publish "this location became dangerous".
    ///
    /// # Errors
    ///
    /// A full region is not an error: it yields [`Publish::Dropped`].
    pub fn publish_hazard(&mut self, location: Location) -> AgentResult<Publish> {
        self.publish(RegionKind::Hazard, location)
    }

    /// Publish "this location was cleaned".
    ///
    /// # Errors
    ///
    /// A full region is not an error: it yields [`Publish::Dropped`].
    pub fn publish_cleared(&mut self, location: Location) -> AgentResult<Publish> {
        self.publish(RegionKind::Cleared, location)
    }

    /// Publish `center` and its eight neighbours, skipping known hazards.
    ///
    /// # Errors
    ///
    /// Stops at the first non-capacity error.
    pub fn publish_hazard_area(&mut self, center: Location) -> AgentResult<AreaPublish> {
        let mut outcome = AreaPublish::default();
        for location in center.with_neighbours() {
            if self.known.contains(location) {
                outcome.skipped += 1;
                continue;
            }
            match self.publish_hazard(location)? {
                Publish::Appended(_) => outcome.appended += 1,
                Publish::Dropped => outcome.dropped += 1,
            }
        }
        Ok(outcome)
    }

    /// Whether `location` is in the working set.
    #[must_use]
    pub fn is_known_hazard(&self, location: Location) -> bool {
        self.known.contains(location)
    }

    /// Fold new facts from both regions. Call once per turn.
    ///
    /// # Errors
    ///
    /// Returns the first scan error; the affected watermark is kept.
    pub fn sync_working_set(&mut self) -> AgentResult<SyncReport> {
        let now = self.log.array().current_tick();
        let report = sync::sync_all(
            self.log.array(),
            self.log.layout(),
            &mut self.known,
            &mut self.marks,
            now,
        )?;
        Ok(report)
    }

    /// Expire and compact both regions. Call once per tick.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotPrivileged`] for members.
    pub fn run_maintenance(&mut self) -> AgentResult<MaintenanceReport> {
        self.require_privileged()?;
        let now = self.log.array().current_tick();
        Ok(self.log.maintain(now, self.max_age)?)
    }

    /// Whether this agent should attempt `kind` this turn.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn should_produce(&self, kind: UnitKind) -> AgentResult<bool> {
        Ok(self
            .plan
            .should_produce(self.log.array(), self.log.layout(), kind)?)
    }

    /// Record a successful production.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn record_produced(&mut self, kind: UnitKind) -> AgentResult<()> {
        let layout = *self.log.layout();
        self.plan
            .record_produced(self.log.array_mut(), &layout, kind)?;
        Ok(())
    }

    /// Record the loss of a unit.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn record_lost(&mut self, kind: UnitKind) -> AgentResult<()> {
        let layout = *self.log.layout();
        self.plan.record_lost(self.log.array_mut(), &layout, kind)?;
        Ok(())
    }

    /// Decide, attempt through `producer`, and record on success.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn try_produce<P: Producer + ?Sized>(
        &mut self,
        kind: UnitKind,
        producer: &mut P,
    ) -> AgentResult<bool> {
        let layout = *self.log.layout();
        Ok(self
            .plan
            .try_produce(self.log.array_mut(), &layout, kind, producer)?)
    }

    /// Read the shared counters.
    ///
    /// # Errors
    ///
    /// Returns the cell fault.
    pub fn counters(&self) -> AgentResult<Counters> {
        Ok(Counters::read(self.log.array(), self.log.layout())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Board;

    fn host(capacity: usize) -> (Board, Layout, Arc<ProductionPlan>) {
        let layout = Layout::compact(capacity);
        (
            Board::new(layout.len),
            layout,
            Arc::new(ProductionPlan::default()),
        )
    }

    fn pair(capacity: usize) -> (Board, Agent<Board>, Agent<Board>) {
        let (board, layout, plan) = host(capacity);
        let mut base = Agent::new(board.clone(), layout, Arc::clone(&plan), Role::Privileged);
        base.init_board().unwrap();
        let member = Agent::new(board.clone(), layout, plan, Role::Member);
        (board, base, member)
    }

    #[test]
    fn test_members_cannot_maintain() {
        let (_, _, mut member) = pair(30);
        assert_eq!(member.run_maintenance(), Err(AgentError::NotPrivileged));
        assert_eq!(member.init_board(), Err(AgentError::NotPrivileged));
    }

    #[test]
    fn test_publish_reaches_other_agents() {
        let (board, mut base, mut member) = pair(30);
        board.set_tick(1);
        let spot = Location::new(4, 4);
        assert_eq!(member.publish_hazard(spot).unwrap(), Publish::Appended(0));
        assert!(member.is_known_hazard(spot));
        assert!(!base.is_known_hazard(spot));

        base.sync_working_set().unwrap();
        assert!(base.is_known_hazard(spot));

        board.set_tick(2);
        base.publish_cleared(spot).unwrap();
        assert!(!base.is_known_hazard(spot));
        member.sync_working_set().unwrap();
        assert!(!member.is_known_hazard(spot));
    }

    #[test]
    fn test_full_region_drops_publish() {
        let (board, _base, mut member) = pair(6);
        board.set_tick(1);
        member.publish_hazard(Location::new(0, 0)).unwrap();
        member.publish_hazard(Location::new(1, 0)).unwrap();
        assert_eq!(
            member.publish_hazard(Location::new(2, 0)).unwrap(),
            Publish::Dropped
        );
        assert_eq!(member.log().end_offset(RegionKind::Hazard).unwrap(), 6);
        assert!(!member.is_known_hazard(Location::new(2, 0)));
    }

    #[test]
    fn test_dropped_fact_is_republished_after_maintenance() {
        let (board, mut base, mut member) = pair(3);
        board.set_tick(1);
        let first = Location::new(0, 0);
        let second = Location::new(9, 9);
        assert_eq!(member.publish_hazard(first).unwrap(), Publish::Appended(0));
        assert_eq!(member.publish_hazard(second).unwrap(), Publish::Dropped);
        assert!(!member.is_known_hazard(second));

        board.set_tick(5);
        let report = base.run_maintenance().unwrap();
        assert_eq!(report.hazard.live, 0);

        let area = member.publish_hazard_area(second).unwrap();
        assert_eq!(area.appended, 1);
        assert!(member.is_known_hazard(second));

        let mut fresh = Agent::new(
            board.clone(),
            *base.log().layout(),
            Arc::new(ProductionPlan::default()),
            Role::Member,
        );
        fresh.sync_working_set().unwrap();
        assert!(fresh.is_known_hazard(second));
    }

    #[test]
    fn test_cut_off_publish_is_not_remembered() {
        let (board, _base, mut member) = pair(30);
        board.set_tick(1);
        let spot = Location::new(3, 3);
        // Too few operations to finish the append
        board.begin_turn(Some(3));
        assert!(member.publish_hazard(spot).unwrap_err().is_budget_exhausted());
        board.end_turn();
        assert!(!member.is_known_hazard(spot));

        assert_eq!(member.publish_hazard(spot).unwrap(), Publish::Appended(0));
        assert!(member.is_known_hazard(spot));
    }

    #[test]
    fn test_area_publish_skips_known() {
        let (board, mut base, mut member) = pair(90);
        board.set_tick(1);
        let first = member.publish_hazard_area(Location::new(5, 5)).unwrap();
        assert_eq!(
            first,
            AreaPublish {
                appended: 9,
                skipped: 0,
                dropped: 0
            }
        );
        let again = member.publish_hazard_area(Location::new(6, 5)).unwrap();
        assert_eq!(again.appended, 3);
        assert_eq!(again.skipped, 6);

        base.sync_working_set().unwrap();
        assert_eq!(base.known().len(), 12);
    }

    #[test]
    fn test_area_publish_at_coordinate_limit() {
        let (board, _base, mut member) = pair(30);
        board.set_tick(1);
        let area = member
            .publish_hazard_area(Location::new(i32::MAX, i32::MAX))
            .unwrap();
        assert_eq!(area.appended, 4);
        assert_eq!(area.dropped, 0);
    }

    #[test]
    fn test_maintenance_expires_old_facts() {
        let (board, mut base, mut member) = pair(30);
        board.set_tick(1);
        member.publish_hazard(Location::new(1, 1)).unwrap();
        board.set_tick(3);
        member.publish_hazard(Location::new(2, 2)).unwrap();

        let report = base.run_maintenance().unwrap();
        assert_eq!(report.hazard.expired, 1);
        assert_eq!(report.hazard.live, 1);

        let mut late = Agent::new(
            board.clone(),
            *base.log().layout(),
            Arc::new(ProductionPlan::default()),
            Role::Member,
        );
        late.sync_working_set().unwrap();
        assert!(late.is_known_hazard(Location::new(2, 2)));
        assert!(!late.is_known_hazard(Location::new(1, 1)));
    }

    #[test]
    fn test_production_through_agents() {
        let (_, mut base, mut member) = pair(30);
        assert!(base.should_produce(UnitKind::Worker).unwrap());
        let mut always = |_: UnitKind| true;
        assert!(base.try_produce(UnitKind::Worker, &mut always).unwrap());
        assert_eq!(member.counters().unwrap().current(UnitKind::Worker), 1);
        member.record_lost(UnitKind::Worker).unwrap();
        assert_eq!(base.counters().unwrap().current(UnitKind::Worker), 0);
        member.record_produced(UnitKind::Worker).unwrap();
        assert_eq!(base.counters().unwrap().progress, 2);
    }

    #[test]
    fn test_budget_error_is_reported() {
        let (board, _base, mut member) = pair(30);
        board.begin_turn(Some(0));
        let err = member.publish_hazard(Location::new(0, 0)).unwrap_err();
        board.end_turn();
        assert!(err.is_budget_exhausted());
    }
}
