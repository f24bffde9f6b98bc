mod common;

use common::strategies::*;
use common::{compartment, current_slot};
use confctl_core::orchestration::{ActionId, ExecutionAction, ExecutionPlan, ExecutionPriority};
use proptest::prelude::*;
use std::collections::HashMap;

fn plan_for(dependencies: &[Vec<usize>], stop: bool) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new();
    for (index, children) in dependencies.iter().enumerate() {
        let children: Vec<u64> = children.iter().map(|child| *child as u64 + 1).collect();
        let executable = compartment(index as u64 + 1, &children, current_slot());
        let action = if stop {
            ExecutionAction::stop(executable)
        } else {
            ExecutionAction::start(executable)
        };
        plan.add_execution_action(action).unwrap();
    }
    plan.build().unwrap();
    plan
}

/// Drain a built plan, returning the batch index of every action
fn batch_positions(plan: &mut ExecutionPlan) -> HashMap<ActionId, usize> {
    let mut positions = HashMap::new();
    let mut batch_index = 0;
    while !plan.is_empty() {
        let batch = plan.pop_execution_actions().unwrap();
        assert!(!batch.is_empty(), "acyclic plan must never stall");
        for id in &batch {
            assert!(positions.insert(*id, batch_index).is_none(), "{id} popped twice");
        }
        for id in batch {
            plan.remove_execution_action(id).unwrap();
        }
        batch_index += 1;
    }
    positions
}

proptest! {
    /// Property: a start never runs before the starts it depends on
    #[test]
    fn starts_follow_their_dependencies(dependencies in acyclic_dependencies_strategy()) {
        let mut plan = plan_for(&dependencies, false);
        let positions = batch_positions(&mut plan);

        prop_assert_eq!(positions.len(), dependencies.len());
        for (index, children) in dependencies.iter().enumerate() {
            for child in children {
                prop_assert!(positions[&ActionId(*child)] < positions[&ActionId(index)]);
            }
        }
    }

    /// Property: stops unwind composition, parents before children
    #[test]
    fn stops_precede_their_dependencies(dependencies in acyclic_dependencies_strategy()) {
        let mut plan = plan_for(&dependencies, true);
        let positions = batch_positions(&mut plan);

        prop_assert_eq!(positions.len(), dependencies.len());
        for (index, children) in dependencies.iter().enumerate() {
            for child in children {
                prop_assert!(positions[&ActionId(index)] < positions[&ActionId(*child)]);
            }
        }
    }

    /// Property: among ready actions only the highest tier is dispatched
    #[test]
    fn ready_stops_are_dispatched_before_starts(flags in stop_flags_strategy()) {
        let mut plan = ExecutionPlan::new();
        for (index, stop) in flags.iter().enumerate() {
            let executable = compartment(index as u64 + 1, &[], current_slot());
            let action = if *stop {
                ExecutionAction::stop(executable)
            } else {
                ExecutionAction::start(executable)
            };
            plan.add_execution_action(action).unwrap();
        }
        plan.build().unwrap();

        let stops = flags.iter().filter(|stop| **stop).count();
        let mut expected_batches = Vec::new();
        if stops > 0 {
            expected_batches.push((ExecutionPriority::Stop, stops));
        }
        if stops < flags.len() {
            expected_batches.push((ExecutionPriority::Start, flags.len() - stops));
        }

        for (priority, size) in expected_batches {
            let batch = plan.pop_execution_actions().unwrap();
            prop_assert_eq!(batch.len(), size);
            for id in &batch {
                prop_assert_eq!(plan.action(*id).unwrap().priority(), priority);
                plan.remove_execution_action(*id).unwrap();
            }
        }
        prop_assert!(plan.is_empty());
    }
}
