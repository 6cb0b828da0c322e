//! Output formatting utilities for CLI.

#![allow(clippy::cast_precision_loss)]

use hivelog::{Layout, RegionKind, SimResult, UnitKind};
use serde::Serialize;
use std::fmt::Write;

/// Format a simulation result as human-readable text.
pub(super) fn format_text(result: &SimResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Simulation Result (seed: {})", result.seed);
    let _ = writeln!(output, "  Ticks: {}", result.ticks);
    let _ = writeln!(output, "  Units alive: {}\n", result.units);

    output.push_str("  Kind         built  alive\n");
    for kind in UnitKind::ALL {
        let built = result.produced.get(&kind).copied().unwrap_or(0);
        let alive = result.alive.get(&kind).copied().unwrap_or(0);
        if built == 0 && alive == 0 {
            continue;
        }
        let _ = writeln!(output, "  {:<12} {built:>5}  {alive:>5}", kind.name());
    }

    let _ = writeln!(output, "\n  Losses: {}", result.losses);
    let _ = writeln!(
        output,
        "  Publishes: {} ({} dropped)",
        result.publishes, result.dropped_publishes
    );
    for kind in RegionKind::ALL {
        let report = result.maintenance.region(kind);
        let peak = match kind {
            RegionKind::Hazard => result.peak_hazard_records,
            RegionKind::Cleared => result.peak_cleared_records,
        };
        let _ = writeln!(
            output,
            "  {:<8} peak {peak} records, {} expired, {} reclaimed, {} live",
            kind.name(),
            report.expired,
            report.reclaimed,
            report.live
        );
    }
    let _ = writeln!(
        output,
        "  Budget cut-offs: {}  Turn errors: {}  Invariant violations: {}",
        result.budget_cutoffs, result.turn_errors, result.invariant_violations
    );
    let _ = writeln!(output, "  Cell ops: {}  Checksum: {:016x}", result.total_ops, result.checksum);

    output
}

/// Format a layout as a human-readable table.
pub(super) fn format_layout(layout: &Layout) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Shared array: {} cells", layout.len);
    let _ = writeln!(output, "  Build progress:   cell {}", layout.build_progress);
    output.push_str("  Counters (current / lifetime):\n");
    for kind in UnitKind::ALL {
        let _ = writeln!(
            output,
            "    {:<12} {:>7} {:>7}",
            kind.name(),
            layout.counter_cell(kind),
            layout.lifetime_cell(kind)
        );
    }
    for kind in RegionKind::ALL {
        let region = layout.region(kind);
        let _ = writeln!(
            output,
            "  {:<8} cells {}..{} ({} records), end pointer at cell {}",
            kind.name(),
            region.start,
            region.end(),
            region.max_records(),
            region.end_cell
        );
    }

    output
}

/// Sweep statistics for aggregated results.
#[derive(Debug, Default)]
pub(super) struct SweepStats {
    /// Simulations completed.
    pub(super) runs: u64,
    /// Simulations that returned an error.
    pub(super) failed: u64,
    /// Units built per kind, summed.
    produced: [u64; UnitKind::COUNT],
    /// Mobile units lost, summed.
    losses: u64,
    /// Loss sum of squares for std dev calculation.
    loss_sq_sum: f64,
    publishes: u64,
    dropped: u64,
    expired: u64,
    reclaimed: u64,
    /// Highest hazard-region fill over every run.
    peak_hazard: usize,
    /// Highest cleared-region fill over every run.
    peak_cleared: usize,
    cutoffs: u64,
    turn_errors: u64,
    /// Runs with at least one invariant violation.
    runs_with_violations: u64,
    ops: u64,
}

impl SweepStats {
    /// Add a simulation result to the stats.
    pub(super) fn add_result(&mut self, result: &SimResult) {
        self.runs += 1;
        for (kind, built) in &result.produced {
            self.produced[kind.index()] += u64::from(*built);
        }
        self.losses += result.losses;
        self.loss_sq_sum += (result.losses as f64) * (result.losses as f64);
        self.publishes += result.publishes;
        self.dropped += result.dropped_publishes;
        for kind in RegionKind::ALL {
            let report = result.maintenance.region(kind);
            self.expired += report.expired as u64;
            self.reclaimed += report.reclaimed as u64;
        }
        self.peak_hazard = self.peak_hazard.max(result.peak_hazard_records);
        self.peak_cleared = self.peak_cleared.max(result.peak_cleared_records);
        self.cutoffs += result.budget_cutoffs;
        self.turn_errors += result.turn_errors;
        if result.invariant_violations > 0 {
            self.runs_with_violations += 1;
        }
        self.ops += result.total_ops;
    }

    /// Count a simulation that failed.
    pub(super) fn add_failure(&mut self) {
        self.failed += 1;
    }

    /// Merge another accumulator into this one.
    pub(super) fn merge(&mut self, other: &Self) {
        self.runs += other.runs;
        self.failed += other.failed;
        for (total, add) in self.produced.iter_mut().zip(other.produced) {
            *total += add;
        }
        self.losses += other.losses;
        self.loss_sq_sum += other.loss_sq_sum;
        self.publishes += other.publishes;
        self.dropped += other.dropped;
        self.expired += other.expired;
        self.reclaimed += other.reclaimed;
        self.peak_hazard = self.peak_hazard.max(other.peak_hazard);
        self.peak_cleared = self.peak_cleared.max(other.peak_cleared);
        self.cutoffs += other.cutoffs;
        self.turn_errors += other.turn_errors;
        self.runs_with_violations += other.runs_with_violations;
        self.ops += other.ops;
    }

    fn per_run(&self, total: u64) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        total as f64 / self.runs as f64
    }

    /// Average units built per run for `kind`.
    pub(super) fn avg_produced(&self, kind: UnitKind) -> f64 {
        self.per_run(self.produced[kind.index()])
    }

    /// Share of `kind` among all units built, 0.0-1.0.
    pub(super) fn mix(&self, kind: UnitKind) -> f64 {
        let total: u64 = self.produced.iter().sum();
        if total == 0 {
            return 0.0;
        }
        self.produced[kind.index()] as f64 / total as f64
    }

    /// Loss standard deviation per run.
    pub(super) fn loss_std_dev(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        let n = self.runs as f64;
        let mean = self.per_run(self.losses);
        let variance = (self.loss_sq_sum / n) - (mean * mean);
        if variance < 0.0 { 0.0 } else { variance.sqrt() }
    }

    /// Fraction of publishes that were dropped, 0.0-1.0.
    pub(super) fn drop_rate(&self) -> f64 {
        let attempted = self.publishes + self.dropped;
        if attempted == 0 {
            return 0.0;
        }
        self.dropped as f64 / attempted as f64
    }
}

/// JSON-serializable sweep result.
#[derive(Debug, Serialize)]
pub(super) struct JsonSweepResult {
    runs: u64,
    failed: u64,
    units: Vec<JsonSweepUnit>,
    avg_losses: f64,
    loss_std_dev: f64,
    avg_publishes: f64,
    drop_rate: f64,
    avg_expired: f64,
    avg_reclaimed: f64,
    peak_hazard_records: usize,
    peak_cleared_records: usize,
    avg_budget_cutoffs: f64,
    turn_errors: u64,
    runs_with_violations: u64,
    avg_ops: f64,
}

/// JSON-serializable per-kind sweep stats.
#[derive(Debug, Serialize)]
pub(super) struct JsonSweepUnit {
    kind: UnitKind,
    avg_built: f64,
    mix: f64,
}

impl JsonSweepResult {
    /// Create from stats.
    pub(super) fn from_stats(stats: &SweepStats) -> Self {
        Self {
            runs: stats.runs,
            failed: stats.failed,
            units: UnitKind::ALL
                .into_iter()
                .map(|kind| JsonSweepUnit {
                    kind,
                    avg_built: stats.avg_produced(kind),
                    mix: stats.mix(kind),
                })
                .collect(),
            avg_losses: stats.per_run(stats.losses),
            loss_std_dev: stats.loss_std_dev(),
            avg_publishes: stats.per_run(stats.publishes),
            drop_rate: stats.drop_rate(),
            avg_expired: stats.per_run(stats.expired),
            avg_reclaimed: stats.per_run(stats.reclaimed),
            peak_hazard_records: stats.peak_hazard,
            peak_cleared_records: stats.peak_cleared,
            avg_budget_cutoffs: stats.per_run(stats.cutoffs),
            turn_errors: stats.turn_errors,
            runs_with_violations: stats.runs_with_violations,
            avg_ops: stats.per_run(stats.ops),
        }
    }
}

/// Format sweep stats as human-readable text.
pub(super) fn format_sweep_text(stats: &SweepStats) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Sweep Results ({} runs, {} failed)", stats.runs, stats.failed);
    output.push_str("========================================\n\n");

    output.push_str("Production (avg built per run, share of total):\n");
    for kind in UnitKind::ALL {
        if stats.produced[kind.index()] == 0 {
            continue;
        }
        let _ = writeln!(
            output,
            "  {:<12} {:>7.1}  {:>5.1}%",
            kind.name(),
            stats.avg_produced(kind),
            stats.mix(kind) * 100.0
        );
    }

    let _ = writeln!(
        output,
        "\nLosses: {:.1} (+/- {:.1}) per run",
        stats.per_run(stats.losses),
        stats.loss_std_dev()
    );
    let _ = writeln!(
        output,
        "Publishes: {:.1} per run, {:.2}% dropped",
        stats.per_run(stats.publishes),
        stats.drop_rate() * 100.0
    );
    let _ = writeln!(
        output,
        "Maintenance: {:.1} expired, {:.1} reclaimed per run",
        stats.per_run(stats.expired),
        stats.per_run(stats.reclaimed)
    );
    let _ = writeln!(
        output,
        "Peak fill: {} hazard records, {} cleared records",
        stats.peak_hazard, stats.peak_cleared
    );
    let _ = writeln!(
        output,
        "Budget cut-offs: {:.1} per run  Turn errors: {}",
        stats.per_run(stats.cutoffs),
        stats.turn_errors
    );
    let _ = writeln!(output, "Runs with invariant violations: {}", stats.runs_with_violations);

    output
}

/// Format sweep stats as CSV, one row per unit kind.
pub(super) fn format_sweep_csv(stats: &SweepStats) -> String {
    let mut output = String::new();

    output.push_str("kind,avg_built,mix\n");
    for kind in UnitKind::ALL {
        let _ = writeln!(
            output,
            "{},{:.2},{:.4}",
            kind.name(),
            stats.avg_produced(kind),
            stats.mix(kind)
        );
    }

    output
}
