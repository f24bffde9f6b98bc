//! # Execution Plan
//!
//! Dependency graph over the actions of one tick. Actions are stored in an
//! arena and referenced by [`ActionId`]; edges are id sets on both ends.
//!
//! Lifecycle: actions are added, [`ExecutionPlan::build`] wires the edges and
//! rejects unsatisfiable graphs, then the executor alternates
//! [`ExecutionPlan::pop_execution_actions`] and
//! [`ExecutionPlan::remove_execution_action`] until the plan is empty and
//! finally calls [`ExecutionPlan::finish`].

use super::action::{ActionContext, ActionTask, ExecutionAction};
use super::errors::{PlanError, PlanResult};
use super::result::ExecutionResult;
use super::types::{ActionId, ActionKind, PerformOutcome};
use crate::models::{ExecutableId, Migration, ServiceId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ExecutionPlan {
    actions: Vec<ExecutionAction>,
    /// Start, Update or Stop action per executable
    executable_actions: HashMap<ExecutableId, ActionId>,
    service_actions: HashMap<ServiceId, ActionId>,
    /// Migrate action per migration target
    migration_actions: HashMap<ExecutableId, ActionId>,
    /// Actions not yet removed as completed
    remaining: BTreeSet<ActionId>,
    /// Remaining actions whose dependencies are all completed, not yet popped
    satisfied: BTreeSet<ActionId>,
    /// Dispatch order
    popped: Vec<ActionId>,
    built: bool,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to a plan that is not built yet
    pub fn add_execution_action(&mut self, action: ExecutionAction) -> PlanResult<ActionId> {
        if self.built {
            return Err(PlanError::AlreadyBuilt);
        }

        let id = ActionId(self.actions.len());
        let planned = match action.kind() {
            ActionKind::Start { executable }
            | ActionKind::Update { executable }
            | ActionKind::Stop { executable } => {
                *self.executable_actions.entry(executable).or_insert(id)
            }
            ActionKind::ActivateService { service, .. }
            | ActionKind::DeactivateService { service, .. } => {
                *self.service_actions.entry(service).or_insert(id)
            }
            ActionKind::Migrate { migration } => {
                *self.migration_actions.entry(migration.target).or_insert(id)
            }
        };
        if planned != id {
            return Err(PlanError::DuplicateAction {
                description: action.description().to_string(),
            });
        }

        self.actions.push(action);
        Ok(id)
    }

    /// Whether a Start, Update or Stop action is planned for the executable
    pub fn has_executable_action(&self, executable: ExecutableId) -> bool {
        self.executable_actions.contains_key(&executable)
    }

    /// The Start, Update or Stop action planned for the executable
    pub fn executable_action(&self, executable: ExecutableId) -> Option<&ExecutionAction> {
        self.executable_actions
            .get(&executable)
            .and_then(|id| self.actions.get(id.0))
    }

    pub fn action(&self, id: ActionId) -> PlanResult<&ExecutionAction> {
        self.actions.get(id.0).ok_or(PlanError::UnknownAction(id))
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionId, &ExecutionAction)> {
        self.actions
            .iter()
            .enumerate()
            .map(|(index, action)| (ActionId(index), action))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether every action completed (trivially true before anything was added)
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Wire dependency edges and verify the graph can be executed.
    ///
    /// Fails on a migration whose bracketing actions are missing, on
    /// non-adjacent migration slots and on dependency cycles. A failed build
    /// leaves the plan unbuilt.
    pub fn build(&mut self) -> PlanResult<()> {
        if self.built {
            return Err(PlanError::AlreadyBuilt);
        }

        let mut edges: Vec<(ActionId, ActionId)> = Vec::new();
        let mut skipped: Vec<ActionId> = Vec::new();

        for (this, action) in self.actions() {
            match action.kind() {
                ActionKind::Start { .. } | ActionKind::Update { .. } | ActionKind::Stop { .. } => {
                    let Some(executable) = action.executable() else {
                        continue;
                    };
                    for dependency in executable.execution_dependencies() {
                        let Some(&child) = self.executable_actions.get(&dependency) else {
                            continue;
                        };
                        // Teardown unwinds composition: the child stops after its users
                        if action.kind().is_stop() && self.actions[child.0].kind().is_stop() {
                            edges.push((child, this));
                        } else {
                            edges.push((this, child));
                        }
                    }
                }
                ActionKind::ActivateService { executable, .. } => {
                    if let Some(&start) = self.executable_actions.get(&executable) {
                        if self.actions[start.0].kind().is_start() {
                            edges.push((this, start));
                        }
                    }
                }
                ActionKind::DeactivateService { executable, .. } => {
                    if let Some(&stop) = self.executable_actions.get(&executable) {
                        if self.actions[stop.0].kind().is_stop() {
                            edges.push((stop, this));
                        }
                    }
                }
                ActionKind::Migrate { migration } => {
                    let (source, target) = self.migration_endpoints(&migration)?;
                    let (Some(source_executable), Some(target_executable)) = (
                        self.actions[source.0].executable(),
                        self.actions[target.0].executable(),
                    ) else {
                        continue;
                    };
                    migration.validate(source_executable, target_executable)?;

                    if Migration::is_replacement(source_executable, target_executable) {
                        skipped.push(source);
                        skipped.push(target);
                    } else {
                        edges.push((this, source));
                        edges.push((target, this));
                    }
                }
            }
        }

        self.check_acyclic(&edges)?;

        for (dependent, dependency) in edges {
            if dependent == dependency {
                continue;
            }
            if self.actions[dependent.0].add_dependency(dependency) {
                self.actions[dependency.0].add_parent(dependent);
            }
        }
        for id in skipped {
            self.actions[id.0].set_skip_perform();
        }

        self.remaining = (0..self.actions.len()).map(ActionId).collect();
        self.satisfied = self
            .actions()
            .filter(|(_, action)| action.dependencies().is_empty())
            .map(|(id, _)| id)
            .collect();
        self.built = true;

        debug!(
            actions = self.actions.len(),
            ready = self.satisfied.len(),
            "Execution plan built"
        );
        Ok(())
    }

    fn migration_endpoints(&self, migration: &Migration) -> PlanResult<(ActionId, ActionId)> {
        let source = self
            .executable_actions
            .get(&migration.source)
            .copied()
            .filter(|id| self.actions[id.0].kind().is_stop())
            .ok_or(PlanError::MissingMigrationSource {
                from: migration.source,
                to: migration.target,
            })?;
        let target = self
            .executable_actions
            .get(&migration.target)
            .copied()
            .filter(|id| self.actions[id.0].kind().is_start())
            .ok_or(PlanError::MissingMigrationTarget {
                from: migration.source,
                to: migration.target,
            })?;
        Ok((source, target))
    }

    /// Full topological check over the edge list (dependent, dependency)
    fn check_acyclic(&self, edges: &[(ActionId, ActionId)]) -> PlanResult<()> {
        let count = self.actions.len();
        let mut pending: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for &(dependent, dependency) in edges {
            if dependent != dependency && pending[dependent.0].insert(dependency.0) {
                dependents[dependency.0].push(dependent.0);
            }
        }

        let mut ready: VecDeque<usize> = (0..count).filter(|i| pending[*i].is_empty()).collect();
        let mut resolved = 0;
        while let Some(index) = ready.pop_front() {
            resolved += 1;
            for &dependent in &dependents[index] {
                pending[dependent].remove(&index);
                if pending[dependent].is_empty() {
                    ready.push_back(dependent);
                }
            }
        }

        if resolved == count {
            return Ok(());
        }
        let actions = (0..count)
            .filter(|i| !pending[*i].is_empty())
            .map(|i| self.actions[i].description().to_string())
            .collect();
        Err(PlanError::DependencyCycle { actions })
    }

    /// Take the ready actions of the highest priority tier, in insertion order.
    ///
    /// Returns an empty batch once nothing is ready.
    pub fn pop_execution_actions(&mut self) -> PlanResult<Vec<ActionId>> {
        if !self.built {
            return Err(PlanError::NotBuilt);
        }

        let Some(priority) = self
            .satisfied
            .iter()
            .map(|id| self.actions[id.0].priority())
            .max()
        else {
            return Ok(Vec::new());
        };

        let batch: Vec<ActionId> = self
            .satisfied
            .iter()
            .copied()
            .filter(|id| self.actions[id.0].priority() == priority)
            .collect();
        for id in &batch {
            self.satisfied.remove(id);
        }
        self.popped.extend(batch.iter().copied());
        Ok(batch)
    }

    /// Spawnable task of a planned action
    pub fn task(&self, id: ActionId) -> PlanResult<ActionTask> {
        Ok(self.action(id)?.task())
    }

    pub fn record_outcome(&mut self, id: ActionId, outcome: PerformOutcome) -> PlanResult<()> {
        self.actions
            .get_mut(id.0)
            .ok_or(PlanError::UnknownAction(id))?
            .record_outcome(outcome);
        Ok(())
    }

    /// Mark an action completed, releasing the parents waiting only for it
    pub fn remove_execution_action(&mut self, id: ActionId) -> PlanResult<()> {
        if !self.remaining.remove(&id) {
            return Err(PlanError::UnknownAction(id));
        }
        self.satisfied.remove(&id);

        let parents: Vec<ActionId> = self.actions[id.0].parents().iter().copied().collect();
        for parent in parents {
            let action = &mut self.actions[parent.0];
            action.remove_dependency(id);
            if action.dependencies().is_empty()
                && self.remaining.contains(&parent)
                && !self.popped.contains(&parent)
            {
                self.satisfied.insert(parent);
            }
        }
        Ok(())
    }

    /// Actions in the order they were dispatched
    pub fn popped(&self) -> &[ActionId] {
        &self.popped
    }

    /// Settle every dispatched action in dispatch order
    pub async fn finish(&mut self, context: &ActionContext, now: DateTime<Utc>) -> ExecutionResult {
        let mut result = ExecutionResult::new();
        for id in self.popped.clone() {
            self.actions[id.0].finish(context, &mut result, now).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Executable, ExecutableKind, TimeSlot};
    use crate::orchestration::types::ExecutionPriority;
    use chrono::{Duration, TimeZone};

    fn slot(start_hour: u32) -> TimeSlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, start_hour, 0, 0).unwrap();
        TimeSlot::new(start, start + Duration::hours(1))
    }

    fn compartment(id: u64, children: &[u64]) -> Executable {
        Executable::new(ExecutableId(id), ExecutableKind::Compartment, slot(10))
            .with_children(children.iter().map(|id| ExecutableId(*id)))
    }

    fn drain(plan: &mut ExecutionPlan) -> Vec<Vec<ActionId>> {
        let mut batches = Vec::new();
        while !plan.is_empty() {
            let batch = plan.pop_execution_actions().unwrap();
            assert!(!batch.is_empty());
            for id in &batch {
                plan.remove_execution_action(*id).unwrap();
            }
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn test_start_waits_for_children() {
        let mut plan = ExecutionPlan::new();
        let parent = plan
            .add_execution_action(ExecutionAction::start(compartment(1, &[2])))
            .unwrap();
        let child = plan
            .add_execution_action(ExecutionAction::start(compartment(2, &[])))
            .unwrap();
        plan.build().unwrap();

        assert_eq!(drain(&mut plan), vec![vec![child], vec![parent]]);
    }

    #[test]
    fn test_stop_order_is_inverted() {
        let mut plan = ExecutionPlan::new();
        let parent = plan
            .add_execution_action(ExecutionAction::stop(compartment(1, &[2])))
            .unwrap();
        let child = plan
            .add_execution_action(ExecutionAction::stop(compartment(2, &[])))
            .unwrap();
        plan.build().unwrap();

        assert_eq!(drain(&mut plan), vec![vec![parent], vec![child]]);
    }

    #[test]
    fn test_higher_tier_runs_first() {
        let mut plan = ExecutionPlan::new();
        let start = plan
            .add_execution_action(ExecutionAction::start(compartment(1, &[])))
            .unwrap();
        let stop = plan
            .add_execution_action(ExecutionAction::stop(compartment(2, &[])))
            .unwrap();
        plan.build().unwrap();

        let batch = plan.pop_execution_actions().unwrap();
        assert_eq!(batch, vec![stop]);
        assert_eq!(plan.action(stop).unwrap().priority(), ExecutionPriority::Stop);
        plan.remove_execution_action(stop).unwrap();
        assert_eq!(plan.pop_execution_actions().unwrap(), vec![start]);
    }

    #[test]
    fn test_duplicate_actions_are_rejected() {
        let mut plan = ExecutionPlan::new();
        plan.add_execution_action(ExecutionAction::start(compartment(1, &[])))
            .unwrap();
        let result = plan.add_execution_action(ExecutionAction::stop(compartment(1, &[])));
        assert!(matches!(result, Err(PlanError::DuplicateAction { .. })));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut plan = ExecutionPlan::new();
        plan.add_execution_action(ExecutionAction::start(compartment(1, &[2])))
            .unwrap();
        plan.add_execution_action(ExecutionAction::start(compartment(2, &[1])))
            .unwrap();
        plan.add_execution_action(ExecutionAction::start(compartment(3, &[])))
            .unwrap();

        match plan.build() {
            Err(PlanError::DependencyCycle { actions }) => assert_eq!(actions.len(), 2),
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert!(!plan.is_built());
    }

    #[test]
    fn test_pop_requires_build() {
        let mut plan = ExecutionPlan::new();
        assert_eq!(plan.pop_execution_actions(), Err(PlanError::NotBuilt));
    }

    #[test]
    fn test_removing_unknown_action_fails() {
        let mut plan = ExecutionPlan::new();
        plan.build().unwrap();
        assert!(plan.is_empty());
        assert_eq!(
            plan.remove_execution_action(ActionId(3)),
            Err(PlanError::UnknownAction(ActionId(3)))
        );
    }
}
