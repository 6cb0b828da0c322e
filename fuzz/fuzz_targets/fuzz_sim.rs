#![no_main]

use arbitrary::Arbitrary;
use hivelog::{Layout, MaintenanceOrder, SimConfig, run_sim};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct SimInput {
    seed: u64,
    ticks: u8,
    size: u8,
    budget: Option<u16>,
    maintenance_last: bool,
    records: u8,
    spawn_percent: u8,
}

fuzz_target!(|input: SimInput| {
    let size = i32::from(input.size % 24) + 3;
    let config = SimConfig {
        ticks: u32::from(input.ticks % 64),
        width: size,
        height: size,
        op_budget: input.budget.map(u64::from),
        maintenance_order: if input.maintenance_last {
            MaintenanceOrder::Last
        } else {
            MaintenanceOrder::First
        },
        layout: Layout::compact(usize::from(input.records) * 3),
        source_spawn_chance: f64::from(input.spawn_percent % 101) / 100.0,
        ..SimConfig::default()
    };

    let Ok(result) = run_sim(input.seed, &config) else {
        return;
    };
    assert_eq!(result.invariant_violations, 0);
    assert_eq!(result.turn_errors, 0);
});
