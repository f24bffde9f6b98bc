//! # Execution Actions
//!
//! One unit of scheduled work against one executable, service or migration.
//! An action lives in an [`ExecutionPlan`](super::ExecutionPlan) arena; the
//! plan wires its dependency edges, hands out an [`ActionTask`] to run it on a
//! worker task and finally calls [`ExecutionAction::finish`] to settle the
//! retry bookkeeping and record successes.

use super::result::ExecutionResult;
use super::retry::{RetryPolicy, RetryState};
use super::types::{ActionId, ActionKind, ExecutionPriority, PerformOutcome};
use crate::device::DeviceCommandService;
use crate::logging::log_action_operation;
use crate::models::{Executable, ExecutableService, ExecutionReport, Migration};
use crate::persistence::ExecutableRepository;
use crate::reporting::Reporter;
use crate::state_machine::{
    ExecutableState, ExecutableStateMachine, ServiceState, ServiceStateMachine,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Collaborators shared by every action of a tick
#[derive(Clone)]
pub struct ActionContext {
    pub repository: Arc<dyn ExecutableRepository>,
    pub device: Arc<dyn DeviceCommandService>,
    pub reporter: Arc<dyn Reporter>,
    pub room_settle: Duration,
    pub retry: RetryPolicy,
}

impl ActionContext {
    pub fn executable_machine(&self) -> ExecutableStateMachine<'_> {
        ExecutableStateMachine::new(self.device.as_ref(), self.room_settle)
    }

    pub fn service_machine(&self) -> ServiceStateMachine<'_> {
        ServiceStateMachine::new(self.device.as_ref())
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("room_settle", &self.room_settle)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Snapshot of the entity an action was planned for
#[derive(Debug, Clone)]
pub enum ActionTarget {
    Executable(Executable),
    Service(ExecutableService),
    Migration(Migration),
}

#[derive(Debug, Clone)]
pub struct ExecutionAction {
    kind: ActionKind,
    target: ActionTarget,
    description: String,
    dependencies: BTreeSet<ActionId>,
    parents: BTreeSet<ActionId>,
    skip_perform: bool,
    outcome: Option<PerformOutcome>,
    finished: bool,
}

impl ExecutionAction {
    fn new(kind: ActionKind, target: ActionTarget, description: String) -> Self {
        Self {
            kind,
            target,
            description,
            dependencies: BTreeSet::new(),
            parents: BTreeSet::new(),
            skip_perform: false,
            outcome: None,
            finished: false,
        }
    }

    pub fn start(executable: Executable) -> Self {
        let kind = ActionKind::Start {
            executable: executable.id,
        };
        let description = format!("Start({executable})");
        Self::new(kind, ActionTarget::Executable(executable), description)
    }

    pub fn update(executable: Executable) -> Self {
        let kind = ActionKind::Update {
            executable: executable.id,
        };
        let description = format!("Update({executable})");
        Self::new(kind, ActionTarget::Executable(executable), description)
    }

    pub fn stop(executable: Executable) -> Self {
        let kind = ActionKind::Stop {
            executable: executable.id,
        };
        let description = format!("Stop({executable})");
        Self::new(kind, ActionTarget::Executable(executable), description)
    }

    pub fn activate_service(service: ExecutableService) -> Self {
        let kind = ActionKind::ActivateService {
            service: service.id,
            executable: service.executable,
        };
        let description = format!("ActivateService({service})");
        Self::new(kind, ActionTarget::Service(service), description)
    }

    pub fn deactivate_service(service: ExecutableService) -> Self {
        let kind = ActionKind::DeactivateService {
            service: service.id,
            executable: service.executable,
        };
        let description = format!("DeactivateService({service})");
        Self::new(kind, ActionTarget::Service(service), description)
    }

    pub fn migrate(migration: Migration) -> Self {
        let description = format!("Migrate({} -> {})", migration.source, migration.target);
        Self::new(
            ActionKind::Migrate { migration },
            ActionTarget::Migration(migration),
            description,
        )
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn priority(&self) -> ExecutionPriority {
        self.kind.priority()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn target(&self) -> &ActionTarget {
        &self.target
    }

    /// Planned snapshot of the executable of a Start, Update or Stop action
    pub fn executable(&self) -> Option<&Executable> {
        match &self.target {
            ActionTarget::Executable(executable) => Some(executable),
            _ => None,
        }
    }

    /// Actions that must complete before this one may run
    pub fn dependencies(&self) -> &BTreeSet<ActionId> {
        &self.dependencies
    }

    /// Actions waiting for this one
    pub fn parents(&self) -> &BTreeSet<ActionId> {
        &self.parents
    }

    pub fn skip_perform(&self) -> bool {
        self.skip_perform
    }

    pub fn outcome(&self) -> Option<PerformOutcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn add_dependency(&mut self, dependency: ActionId) -> bool {
        self.dependencies.insert(dependency)
    }

    pub(crate) fn remove_dependency(&mut self, dependency: ActionId) -> bool {
        self.dependencies.remove(&dependency)
    }

    pub(crate) fn add_parent(&mut self, parent: ActionId) {
        self.parents.insert(parent);
    }

    pub(crate) fn set_skip_perform(&mut self) {
        self.skip_perform = true;
    }

    pub(crate) fn record_outcome(&mut self, outcome: PerformOutcome) {
        self.outcome = Some(outcome);
    }

    /// Owned, spawnable part of the action
    pub fn task(&self) -> ActionTask {
        ActionTask {
            kind: self.kind,
            description: self.description.clone(),
            skip: self.skip_perform,
        }
    }

    /// Settle the action after its batch completed.
    ///
    /// Re-reads the persisted entity, records a success in `result` or applies
    /// the retry policy to a failure. Only the first call has an effect, and
    /// actions superseded by a migration are left to the migration.
    pub async fn finish(
        &mut self,
        context: &ActionContext,
        result: &mut ExecutionResult,
        now: DateTime<Utc>,
    ) {
        if self.finished {
            return;
        }
        self.finished = true;

        if self.skip_perform {
            debug!(action = %self.description, "Skipped action settled by its migration");
            return;
        }

        if let Err(error) = self.settle(context, result, now).await {
            context.reporter.internal_error(&self.description, &error);
        }
    }

    async fn settle(
        &self,
        context: &ActionContext,
        result: &mut ExecutionResult,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let internal_error = self.outcome == Some(PerformOutcome::InternalError);
        let mut session = context.repository.begin().await?;

        match self.kind {
            ActionKind::Start { executable: id } => {
                let mut executable = session.executable(id).await?;
                let state = executable.state();
                let success =
                    !internal_error && (state.is_started() || state == ExecutableState::Skipped);
                if success && state.is_started() {
                    result.add_started(id);
                }
                self.account_executable(&mut executable, success, internal_error, context, now);
                session.save_executable(&executable).await?;
            }
            ActionKind::Update { executable: id } => {
                let mut executable = session.executable(id).await?;
                let success = !internal_error && !executable.is_modified();
                if success {
                    result.add_updated(id);
                }
                self.account_executable(&mut executable, success, internal_error, context, now);
                session.save_executable(&executable).await?;
            }
            ActionKind::Stop { executable: id } => {
                let mut executable = session.executable(id).await?;
                let success = !internal_error && executable.state() == ExecutableState::Stopped;
                if success {
                    result.add_stopped(id);
                }
                self.account_executable(&mut executable, success, internal_error, context, now);
                session.save_executable(&executable).await?;
            }
            ActionKind::ActivateService { service: id, .. } => {
                let mut service = session.service(id).await?;
                let success = !internal_error && service.state() == ServiceState::Active;
                if success {
                    result.add_activated(id);
                }
                self.account_service(&mut service, success, internal_error, context, now);
                session.save_service(&service).await?;
            }
            ActionKind::DeactivateService { service: id, .. } => {
                let mut service = session.service(id).await?;
                let success = !internal_error && service.state() == ServiceState::NotActive;
                if success {
                    result.add_deactivated(id);
                }
                self.account_service(&mut service, success, internal_error, context, now);
                session.save_service(&service).await?;
            }
            ActionKind::Migrate { migration } => {
                let source = session.executable(migration.source).await?;
                let mut target = session.executable(migration.target).await?;

                if !Migration::is_replacement(&source, &target) {
                    // The target's own start settles the target
                    if !internal_error && target.migrated_from == Some(source.id) {
                        result.add_migrated(target.id);
                    } else {
                        warn!(action = %self.description, "Migration hand-off was not recorded");
                    }
                    return Ok(());
                }

                let success = !internal_error
                    && target.state().is_started()
                    && source.state() == ExecutableState::Stopped;
                if success {
                    result.add_started(target.id);
                    result.add_stopped(source.id);
                    result.add_migrated(target.id);
                }
                self.account_executable(&mut target, success, internal_error, context, now);
                session.save_executable(&target).await?;
            }
        }

        session
            .commit()
            .await
            .with_context(|| format!("committing outcome of {}", self.description))?;
        Ok(())
    }

    fn account_executable(
        &self,
        executable: &mut Executable,
        success: bool,
        internal_error: bool,
        context: &ActionContext,
        now: DateTime<Utc>,
    ) {
        let state = self.account(
            executable.attempt_count,
            executable.latest_report(),
            success,
            internal_error,
            &context.retry,
            now,
        );
        executable.attempt_count = state.attempt_count;
        executable.next_attempt = state.next_attempt;
    }

    fn account_service(
        &self,
        service: &mut ExecutableService,
        success: bool,
        internal_error: bool,
        context: &ActionContext,
        now: DateTime<Utc>,
    ) {
        let state = self.account(
            service.attempt_count,
            service.latest_report(),
            success,
            internal_error,
            &context.retry,
            now,
        );
        service.attempt_count = state.attempt_count;
        service.next_attempt = state.next_attempt;
    }

    fn account(
        &self,
        attempt_count: u32,
        latest_report: Option<&ExecutionReport>,
        success: bool,
        internal_error: bool,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> RetryState {
        if success {
            log_action_operation("finish", &self.description, "succeeded", Some(0), None);
            return policy.on_success();
        }

        // Without a report nothing declared the failure permanent
        let retryable =
            internal_error || latest_report.map_or(true, ExecutionReport::is_retryable);
        let state = policy.on_failure(attempt_count, retryable, now);
        log_action_operation(
            "finish",
            &self.description,
            "failed",
            Some(state.attempt_count),
            Some(if state.next_attempt.is_some() {
                "retry scheduled"
            } else {
                "no further attempts"
            }),
        );
        state
    }
}

/// Owned, `Send` part of an action that runs on a worker task
#[derive(Debug, Clone)]
pub struct ActionTask {
    kind: ActionKind,
    description: String,
    skip: bool,
}

impl ActionTask {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the action in its own unit of work.
    ///
    /// Errors never propagate: they are handed to the reporter and the
    /// outcome tells the executor the action's machinery failed.
    #[instrument(skip(self, context), fields(action = %self.description))]
    pub async fn perform(self, context: ActionContext) -> PerformOutcome {
        if self.skip {
            debug!("Action superseded by a migration, skipping");
            return PerformOutcome::Skipped;
        }

        match self.run(&context).await {
            Ok(()) => PerformOutcome::Performed,
            Err(error) => {
                context.reporter.internal_error(&self.description, &error);
                PerformOutcome::InternalError
            }
        }
    }

    async fn run(&self, context: &ActionContext) -> anyhow::Result<()> {
        let mut session = context
            .repository
            .begin()
            .await
            .context("opening unit of work")?;

        match self.kind {
            ActionKind::Start { executable: id } => {
                let mut executable = session.executable(id).await?;
                context
                    .executable_machine()
                    .start(&mut executable, session.as_mut())
                    .await?;
            }
            ActionKind::Update { executable: id } => {
                let mut executable = session.executable(id).await?;
                context
                    .executable_machine()
                    .update(&mut executable, session.as_mut())
                    .await?;
            }
            ActionKind::Stop { executable: id } => {
                let mut executable = session.executable(id).await?;
                context
                    .executable_machine()
                    .stop(&mut executable, session.as_mut())
                    .await?;
            }
            ActionKind::ActivateService { service: id, .. } => {
                let mut service = session.service(id).await?;
                context
                    .service_machine()
                    .activate(&mut service, session.as_mut())
                    .await?;
            }
            ActionKind::DeactivateService { service: id, .. } => {
                let mut service = session.service(id).await?;
                context
                    .service_machine()
                    .deactivate(&mut service, session.as_mut())
                    .await?;
            }
            ActionKind::Migrate { migration } => {
                let mut source = session.executable(migration.source).await?;
                let mut target = session.executable(migration.target).await?;
                if Migration::is_replacement(&source, &target) {
                    context
                        .executable_machine()
                        .replace_room(&mut source, &mut target, session.as_mut())
                        .await?;
                } else {
                    target.migrated_from = Some(source.id);
                    session.save_executable(&target).await?;
                }
            }
        }

        session
            .commit()
            .await
            .with_context(|| format!("committing {}", self.description))?;
        Ok(())
    }
}
