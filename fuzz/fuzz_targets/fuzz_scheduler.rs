#![no_main]

use arbitrary::Arbitrary;
use hivelog::{CellArray, Counters, Gate, Layout, ProductionPlan, UnitKind};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct SchedulerInput {
    /// Fixed build order, as kind indices.
    build_order: Vec<u8>,
    /// Per-kind gate: (is_ratio, value).
    gates: Vec<(bool, u8)>,
    /// Production outcomes, one per attempt.
    attempts: Vec<(u8, bool)>,
    /// Kinds lost along the way.
    losses: Vec<u8>,
}

fn kind_of(index: u8) -> UnitKind {
    UnitKind::ALL[usize::from(index) % UnitKind::COUNT]
}

fuzz_target!(|input: SchedulerInput| {
    let plan = ProductionPlan {
        build_order: input.build_order.iter().take(16).copied().map(kind_of).collect(),
        gates: UnitKind::ALL
            .into_iter()
            .zip(input.gates.iter())
            .map(|(kind, &(ratio, value))| {
                let gate = if ratio {
                    Gate::Ratio { weight: u32::from(value) }
                } else {
                    Gate::Threshold { target: u32::from(value) }
                };
                (kind, gate)
            })
            .collect(),
    };
    let layout = Layout::compact(3);
    let mut cells = CellArray::new(layout.len);

    let mut successes = 0u32;
    for (i, &(kind, succeed)) in input.attempts.iter().take(512).enumerate() {
        let kind = kind_of(kind);
        let Ok(built) = plan.try_produce(&mut cells, &layout, kind, &mut |_: UnitKind| succeed) else {
            return;
        };
        if built {
            successes += 1;
        }
        if let Some(&lost) = input.losses.get(i)
            && lost % 4 == 0
        {
            let _ = plan.record_lost(&mut cells, &layout, kind_of(lost / 4));
        }

        let Ok(counters) = Counters::read(&cells, &layout) else {
            return;
        };
        let lifetime: u32 = counters.lifetime.iter().sum();
        assert_eq!(lifetime, successes);
        assert!(counters.progress as usize <= plan.build_order.len());
        for kind in UnitKind::ALL {
            assert!(counters.current(kind) <= counters.lifetime(kind));
        }
    }
});
