use chrono::{Duration, TimeZone, Utc};
use confctl_core::models::{Executable, ExecutableId, ExecutableKind, TimeSlot};
use confctl_core::orchestration::{ExecutionAction, ExecutionPlan};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Compartment tree where every node groups the `fan_out` nodes after it
fn compartments(count: u64, fan_out: u64) -> Vec<Executable> {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let slot = TimeSlot::new(start, start + Duration::hours(1));
    (1..=count)
        .map(|id| {
            let children = (id * fan_out + 1..=id * fan_out + fan_out)
                .filter(|child| *child <= count)
                .map(ExecutableId);
            Executable::new(ExecutableId(id), ExecutableKind::Compartment, slot)
                .with_children(children)
        })
        .collect()
}

fn drain(mut plan: ExecutionPlan) -> usize {
    let mut batches = 0;
    while !plan.is_empty() {
        let Ok(batch) = plan.pop_execution_actions() else {
            break;
        };
        for id in batch {
            let _ = plan.remove_execution_action(id);
        }
        batches += 1;
    }
    batches
}

fn benchmark_plan_build_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_build_and_drain");
    for count in [10u64, 100, 1000] {
        let executables = compartments(count, 3);
        group.bench_with_input(BenchmarkId::from_parameter(count), &executables, |b, executables| {
            b.iter(|| {
                let mut plan = ExecutionPlan::new();
                for executable in executables {
                    let _ = plan.add_execution_action(ExecutionAction::start(executable.clone()));
                }
                let _ = plan.build();
                black_box(drain(plan))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_plan_build_and_drain);
criterion_main!(benches);
