//! The simulation loop: one budgeted turn per unit per tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agent::{Agent, AgentError, AgentResult, Publish, Role};
use crate::log::{Location, MaintenanceReport, RECORD_WIDTH, RegionKind, check_all};
use crate::scheduler::{Builder, Counters, ProductionPlan, Producer, UnitKind};
use crate::shared::{Board, Tick};
use crate::sim::world::{World, chebyshev};
use crate::sim::{MaintenanceOrder, SimConfig, SimError, SimResult};
use crate::sync::WorkingSet;

/// A unit on the grid and its agent.
#[derive(Debug)]
struct Unit {
    id: usize,
    builder: Builder,
    location: Location,
    agent: Agent<Board>,
    alive: bool,
}

impl Unit {
    fn is_mobile(&self) -> bool {
        matches!(self.builder, Builder::Unit(kind) if !kind.is_structure())
    }
}

/// Read-only view of a unit for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitView {
    /// Creation index; also the turn order.
    pub id: usize,
    /// Base or unit kind.
    pub builder: Builder,
    /// Position.
    pub location: Location,
    /// Size of the unit's working set.
    pub known_hazards: usize,
}

/// Running totals.
#[derive(Debug, Default)]
struct Stats {
    losses: u64,
    publishes: u64,
    dropped: u64,
    maintenance: MaintenanceReport,
    peak_hazard: usize,
    peak_cleared: usize,
    cutoffs: u64,
    turn_errors: u64,
    violations: u64,
    ops: u64,
}

/// Everything a unit turn may touch besides its own unit.
struct TurnContext<'a> {
    world: &'a mut World,
    config: &'a SimConfig,
    stats: &'a mut Stats,
    spawned: &'a mut Vec<(UnitKind, Location)>,
    alive: usize,
}

/// Production collaborator: succeeds by chance if a free adjacent cell
/// exists and the unit cap is not reached.
struct Spawner<'a> {
    world: &'a mut World,
    spawned: &'a mut Vec<(UnitKind, Location)>,
    origin: Location,
    chance: f64,
    alive: usize,
    max_units: usize,
}

impl Producer for Spawner<'_> {
    fn attempt_produce(&mut self, kind: UnitKind) -> bool {
        if self.alive + self.spawned.len() >= self.max_units {
            return false;
        }
        let free = self.world.free_neighbours(self.origin);
        if free.is_empty() || !self.world.rng.chance(self.chance) {
            return false;
        }
        let at = free[self.world.rng.below(free.len())];
        self.world.occupy(at);
        self.spawned.push((kind, at));
        true
    }
}

/// A simulation in progress. Drive it with [`Simulation::step`].
#[derive(Debug)]
pub struct Simulation {
    seed: u64,
    config: SimConfig,
    board: Board,
    plan: Arc<ProductionPlan>,
    world: World,
    units: Vec<Unit>,
    next_id: usize,
    ticks_played: u32,
    stats: Stats,
}

impl Simulation {
    /// Set up the board, world and base.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the board cannot be
    /// initialised.
    pub fn new(seed: u64, config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let board = Board::new(config.layout.len);
        let plan = Arc::new(config.plan.clone());
        let mut world = World::new(config.width, config.height, seed);
        let home = world.center();
        world.occupy(home);

        let mut base = Agent::new(board.clone(), config.layout, Arc::clone(&plan), Role::Privileged)
            .with_max_age(config.max_age);
        base.init_board().map_err(|err| match err {
            AgentError::Log(log) => SimError::Init(log),
            AgentError::NotPrivileged => SimError::Config(err.to_string()),
        })?;

        Ok(Self {
            seed,
            config: config.clone(),
            board,
            plan,
            world,
            units: vec![Unit {
                id: 0,
                builder: Builder::Base,
                location: home,
                agent: base,
                alive: true,
            }],
            next_id: 1,
            ticks_played: 0,
            stats: Stats::default(),
        })
    }

    /// Whether every configured tick has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ticks_played >= self.config.ticks
    }

    /// Ticks played so far.
    #[must_use]
    pub fn ticks_played(&self) -> u32 {
        self.ticks_played
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Live units, in turn order.
    pub fn units(&self) -> impl Iterator<Item = UnitView> + '_ {
        self.units.iter().map(|unit| UnitView {
            id: unit.id,
            builder: unit.builder,
            location: unit.location,
            known_hazards: unit.agent.known().len(),
        })
    }

    /// Current hazard sources.
    #[must_use]
    pub fn sources(&self) -> &[Location] {
        &self.world.sources
    }

    /// Hazards the base currently believes in.
    #[must_use]
    pub fn base_knowledge(&self) -> Option<&WorkingSet> {
        self.units
            .first()
            .filter(|unit| unit.builder == Builder::Base)
            .map(|unit| unit.agent.known())
    }

    /// Records in use and capacity, in records, for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host array fails.
    pub fn region_fill(&self, kind: RegionKind) -> Result<(usize, usize), SimError> {
        let snapshot = self.board.snapshot()?;
        let region = self.config.layout.region(kind);
        let end = region.end_offset(&snapshot).unwrap_or(0);
        Ok((end / RECORD_WIDTH, region.max_records()))
    }

    /// Shared build counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the host array fails.
    pub fn counters(&self) -> Result<Counters, SimError> {
        let snapshot = self.board.snapshot()?;
        Ok(Counters::read(&snapshot, &self.config.layout)?)
    }

    fn turn_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.units.len()).collect();
        if self.config.maintenance_order == MaintenanceOrder::Last {
            order.rotate_left(1);
        }
        order
    }

    /// Play one tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the host array fails. Agent errors are counted,
    /// not returned.
    pub fn step(&mut self) -> Result<(), SimError> {
        if self.is_finished() {
            return Ok(());
        }
        let now = self.board.advance_tick();
        let home = self.units[0].location;
        self.world.evolve_sources(
            self.config.source_spawn_chance,
            self.config.max_sources,
            home,
        );

        let members = self.units.len() - 1;
        let mut members_acted = 0;
        let mut spawned = Vec::new();
        for idx in self.turn_order() {
            let unit = &mut self.units[idx];
            if unit.agent.role() == Role::Privileged {
                debug_assert!(
                    match self.config.maintenance_order {
                        MaintenanceOrder::First => members_acted == 0,
                        MaintenanceOrder::Last => members_acted == members,
                    },
                    "maintenance pass out of turn order at tick {now}"
                );
            } else {
                members_acted += 1;
            }

            self.board.begin_turn(self.config.op_budget);
            let mut ctx = TurnContext {
                world: &mut self.world,
                config: &self.config,
                stats: &mut self.stats,
                spawned: &mut spawned,
                alive: members + 1,
            };
            let outcome = unit_turn(unit, &mut ctx);
            self.stats.ops += self.board.end_turn();

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_budget_exhausted() => {
                    self.stats.cutoffs += 1;
                    tracing::debug!(tick = now, unit = unit.id, "turn cut off by budget");
                }
                Err(err) => {
                    self.stats.turn_errors += 1;
                    tracing::warn!(tick = now, unit = unit.id, error = %err, "turn failed");
                }
            }
        }

        for (kind, location) in spawned {
            self.spawn(kind, location);
        }
        self.resolve_losses(now);
        self.observe(now)?;
        self.ticks_played += 1;
        Ok(())
    }

    fn spawn(&mut self, kind: UnitKind, location: Location) {
        let agent = Agent::new(
            self.board.clone(),
            self.config.layout,
            Arc::clone(&self.plan),
            Role::Member,
        )
        .with_max_age(self.config.max_age);
        self.units.push(Unit {
            id: self.next_id,
            builder: Builder::Unit(kind),
            location,
            agent,
            alive: true,
        });
        self.next_id += 1;
    }

    /// Destroy mobile units standing on a hazard source.
    fn resolve_losses(&mut self, now: Tick) {
        for unit in &mut self.units {
            if !unit.is_mobile() || !self.world.has_source(unit.location) {
                continue;
            }
            unit.alive = false;
            self.world.vacate(unit.location);
            self.stats.losses += 1;
            if let Builder::Unit(kind) = unit.builder {
                tracing::debug!(tick = now, unit = unit.id, %kind, "unit destroyed");
                if let Err(err) = unit.agent.record_lost(kind) {
                    self.stats.turn_errors += 1;
                    tracing::warn!(tick = now, unit = unit.id, error = %err, "recording loss failed");
                }
            }
        }
        self.units.retain(|unit| unit.alive);
    }

    fn observe(&mut self, now: Tick) -> Result<(), SimError> {
        let snapshot = self.board.snapshot()?;
        let layout = &self.config.layout;
        for kind in RegionKind::ALL {
            let Ok(end) = layout.region(kind).end_offset(&snapshot) else {
                continue;
            };
            let records = end / RECORD_WIDTH;
            let peak = match kind {
                RegionKind::Hazard => &mut self.stats.peak_hazard,
                RegionKind::Cleared => &mut self.stats.peak_cleared,
            };
            *peak = (*peak).max(records);
        }
        if self.config.check_invariants {
            let fatal: Vec<_> = check_all(&snapshot, layout)
                .into_iter()
                .filter(|v| !v.recoverable)
                .collect();
            for violation in &fatal {
                tracing::warn!(tick = now, %violation, "invariant violated");
            }
            self.stats.violations += fatal.len() as u64;
        }
        tracing::trace!(tick = now, units = self.units.len(), sources = self.world.sources.len(), "tick done");
        Ok(())
    }

    /// Summarise the run so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the host array fails.
    pub fn result(&self) -> Result<SimResult, SimError> {
        let snapshot = self.board.snapshot()?;
        let counters = Counters::read(&snapshot, &self.config.layout)?;
        let per_kind = |f: fn(&Counters, UnitKind) -> u32| -> BTreeMap<UnitKind, u32> {
            UnitKind::ALL
                .into_iter()
                .map(|kind| (kind, f(&counters, kind)))
                .collect()
        };
        Ok(SimResult {
            seed: self.seed,
            ticks: self.ticks_played,
            produced: per_kind(Counters::lifetime),
            alive: per_kind(Counters::current),
            losses: self.stats.losses,
            publishes: self.stats.publishes,
            dropped_publishes: self.stats.dropped,
            maintenance: self.stats.maintenance,
            peak_hazard_records: self.stats.peak_hazard,
            peak_cleared_records: self.stats.peak_cleared,
            budget_cutoffs: self.stats.cutoffs,
            turn_errors: self.stats.turn_errors,
            invariant_violations: self.stats.violations,
            total_ops: self.stats.ops,
            units: self.units.len(),
            checksum: snapshot.checksum(),
        })
    }
}

/// One unit's turn: sync, maintain, sense, act, produce.
fn unit_turn(unit: &mut Unit, ctx: &mut TurnContext<'_>) -> AgentResult<()> {
    unit.agent.sync_working_set()?;

    if unit.agent.role() == Role::Privileged {
        let report = unit.agent.run_maintenance()?;
        ctx.stats.maintenance.merge(&report);
    }

    for source in ctx.world.visible_sources(unit.location, ctx.config.vision_radius) {
        if unit.agent.is_known_hazard(source) {
            continue;
        }
        let outcome = unit.agent.publish_hazard_area(source)?;
        ctx.stats.publishes += outcome.appended as u64;
        ctx.stats.dropped += outcome.dropped as u64;
    }

    if unit.builder == Builder::Unit(UnitKind::Fumigator) {
        fumigate(unit, ctx)?;
    }
    if unit.is_mobile() {
        step_unit(unit, ctx);
    }

    for &kind in unit.builder.builds() {
        let mut spawner = Spawner {
            world: &mut *ctx.world,
            spawned: &mut *ctx.spawned,
            origin: unit.location,
            chance: ctx.config.produce_chance,
            alive: ctx.alive,
            max_units: ctx.config.max_units,
        };
        unit.agent.try_produce(kind, &mut spawner)?;
    }
    Ok(())
}

/// Clean adjacent sources, then publish cleared facts for adjacent known
/// hazards that no longer have a source nearby.
fn fumigate(unit: &mut Unit, ctx: &mut TurnContext<'_>) -> AgentResult<()> {
    ctx.world.clean_around(unit.location);
    for location in unit.location.with_neighbours() {
        if unit.agent.is_known_hazard(location)
            && !ctx.world.source_within(location, ctx.config.danger_radius)
        {
            match unit.agent.publish_cleared(location)? {
                Publish::Appended(_) => ctx.stats.publishes += 1,
                Publish::Dropped => ctx.stats.dropped += 1,
            }
        }
    }
    Ok(())
}

/// Move one cell. Fumigators head for the nearest known hazard; everyone
/// else wanders and avoids known hazards. Nobody steps onto a source.
fn step_unit(unit: &mut Unit, ctx: &mut TurnContext<'_>) {
    let fumigator = unit.builder == Builder::Unit(UnitKind::Fumigator);
    let candidates: Vec<Location> = ctx
        .world
        .free_neighbours(unit.location)
        .into_iter()
        .filter(|&c| !ctx.world.has_source(c))
        .filter(|&c| fumigator || !unit.agent.is_known_hazard(c))
        .collect();
    if candidates.is_empty() {
        return;
    }

    let target = if fumigator {
        unit.agent.known().nearest(unit.location)
    } else {
        None
    };
    let next = match target {
        Some(goal) => candidates
            .iter()
            .copied()
            .min_by_key(|&c| (c.distance_squared(goal), c))
            .filter(|&c| chebyshev(c, goal) < chebyshev(unit.location, goal)),
        None => {
            // One extra slot means "stay".
            let pick = ctx.world.rng.below(candidates.len() + 1);
            candidates.get(pick).copied()
        }
    };
    if let Some(next) = next {
        ctx.world.vacate(unit.location);
        ctx.world.occupy(next);
        unit.location = next;
    }
}
