//! # Executor
//!
//! Periodic driver of the engine. Every tick loads the work that became due,
//! builds an [`ExecutionPlan`], runs it to completion in concurrent batches
//! and settles the outcome of every dispatched action.
//!
//! ## Tick sequence
//!
//! 1. Derive the [`ExecutionWindow`] from the tick time and the configured
//!    offsets.
//! 2. Plan stops, starts (with their migrations), updates, service activations
//!    and service deactivations.
//! 3. Build the plan; structural defects abort the tick here.
//! 4. Pop the highest ready tier, run each action on its own task, join the
//!    batch and release the dependents. Repeat until the plan is empty.
//! 5. Finish every dispatched action and log a summary.

use super::action::{ActionContext, ExecutionAction};
use super::errors::PlanError;
use super::plan::ExecutionPlan;
use super::result::ExecutionResult;
use super::retry::RetryPolicy;
use super::types::PerformOutcome;
use crate::config::{ConfigManager, ExecutorConfig};
use crate::device::DeviceCommandService;
use crate::error::{ControllerError, Result};
use crate::models::Migration;
use crate::persistence::{ExecutableRepository, ExecutionWindow};
use crate::reporting::Reporter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct Executor {
    executor_id: Uuid,
    config: ExecutorConfig,
    context: ActionContext,
    /// Held for the duration of a tick
    tick_lock: Mutex<()>,
}

impl Executor {
    /// Create an executor; the configuration is validated first
    pub fn new(
        config: ExecutorConfig,
        repository: Arc<dyn ExecutableRepository>,
        device: Arc<dyn DeviceCommandService>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        config.validate()?;
        let context = ActionContext {
            repository,
            device,
            reporter,
            room_settle: config.room_settle(),
            retry: RetryPolicy::from_config(&config),
        };
        let executor_id = Uuid::new_v4();

        info!(
            executor_id = %executor_id,
            enabled = config.enabled,
            period_ms = config.period_ms,
            max_attempt_count = config.max_attempt_count,
            "Creating Executor"
        );

        Ok(Self {
            executor_id,
            config,
            context,
            tick_lock: Mutex::new(()),
        })
    }

    /// Create an executor from the executor section of a loaded configuration
    pub fn from_config_manager(
        config_manager: &ConfigManager,
        repository: Arc<dyn ExecutableRepository>,
        device: Arc<dyn DeviceCommandService>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        Self::new(
            config_manager.config().executor.clone(),
            repository,
            device,
            reporter,
        )
    }

    pub fn executor_id(&self) -> Uuid {
        self.executor_id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Time bounds of a tick at `now`
    pub fn window(&self, now: DateTime<Utc>) -> ExecutionWindow {
        ExecutionWindow {
            now,
            start_before: now - self.config.start_offset(),
            stop_before: now - self.config.end_offset(),
            max_attempt_count: self.config.max_attempt_count,
        }
    }

    /// Run one tick with `now` as its reference time.
    ///
    /// Concurrent calls are serialized. A disabled executor returns an empty
    /// result without touching the repository.
    #[instrument(skip(self), fields(executor_id = %self.executor_id, tick_id = %Uuid::new_v4()))]
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<ExecutionResult> {
        if !self.config.enabled {
            debug!("Executor disabled, skipping tick");
            return Ok(ExecutionResult::new());
        }

        let _tick = self.tick_lock.lock().await;
        let started_at = Instant::now();
        let window = self.window(now);

        let mut plan = self.plan(&window).await?;
        if plan.is_empty() {
            debug!("Nothing due in this tick");
            return Ok(ExecutionResult::new());
        }

        let batches = self.run(&mut plan).await?;
        let result = plan.finish(&self.context, now).await;

        info!(
            actions = plan.len(),
            batches = batches,
            started = result.started().len(),
            updated = result.updated().len(),
            stopped = result.stopped().len(),
            migrated = result.migrated().len(),
            activated = result.activated().len(),
            deactivated = result.deactivated().len(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Executor tick completed"
        );
        Ok(result)
    }

    /// Load the due work and build the plan of a tick
    pub async fn plan(&self, window: &ExecutionWindow) -> Result<ExecutionPlan> {
        let repository = &self.context.repository;
        let mut plan = ExecutionPlan::new();

        for executable in repository.find_executables_to_stop(window).await? {
            plan.add_execution_action(ExecutionAction::stop(executable))?;
        }

        let mut migrations: Vec<Migration> = Vec::new();
        for executable in repository.find_executables_to_start(window).await? {
            if let Some(migration) = executable.migration.filter(|m| m.target == executable.id) {
                migrations.push(migration);
            }
            plan.add_execution_action(ExecutionAction::start(executable))?;
        }
        for migration in migrations {
            if !self.plan_migration_source(&mut plan, &migration).await? {
                continue;
            }
            plan.add_execution_action(ExecutionAction::migrate(migration))?;
        }

        for executable in repository.find_executables_to_update(window).await? {
            if plan.has_executable_action(executable.id) {
                debug!(executable_id = %executable.id, "Executable already planned, update deferred");
                continue;
            }
            plan.add_execution_action(ExecutionAction::update(executable))?;
        }

        for service in repository.find_services_to_activate(window).await? {
            plan.add_execution_action(ExecutionAction::activate_service(service))?;
        }
        for service in repository.find_services_to_deactivate(window).await? {
            plan.add_execution_action(ExecutionAction::deactivate_service(service))?;
        }

        plan.build()?;
        Ok(plan)
    }

    /// Make sure a running migration source is stopped in the same plan as the
    /// target starts. Returns whether the migration should be planned.
    async fn plan_migration_source(
        &self,
        plan: &mut ExecutionPlan,
        migration: &Migration,
    ) -> Result<bool> {
        if let Some(planned) = plan.executable_action(migration.source) {
            if planned.kind().is_stop() {
                return Ok(true);
            }
            warn!(
                source = %migration.source,
                target = %migration.target,
                source_action = %planned.description(),
                "Migration source is not stopping in this tick, target starts on its own"
            );
            return Ok(false);
        }

        match self.context.repository.find_executable(migration.source).await? {
            Some(source) if source.state().is_started() => {
                debug!(
                    source = %migration.source,
                    target = %migration.target,
                    "Stopping migration source ahead of its slot end"
                );
                plan.add_execution_action(ExecutionAction::stop(source))?;
                Ok(true)
            }
            Some(source) => {
                warn!(
                    source = %migration.source,
                    target = %migration.target,
                    source_state = %source.state(),
                    "Migration source is not running, target starts on its own"
                );
                Ok(false)
            }
            None => {
                warn!(
                    source = %migration.source,
                    target = %migration.target,
                    "Migration source does not exist, target starts on its own"
                );
                Ok(false)
            }
        }
    }

    /// Dispatch ready tiers until the plan is empty; returns the batch count
    async fn run(&self, plan: &mut ExecutionPlan) -> Result<usize> {
        let mut batches = 0;
        while !plan.is_empty() {
            let batch = plan.pop_execution_actions()?;
            if batch.is_empty() {
                let remaining = plan.len() - plan.popped().len();
                return Err(PlanError::Stalled { remaining }.into());
            }
            batches += 1;
            debug!(batch = batches, size = batch.len(), "Dispatching action batch");

            let mut handles: Vec<JoinHandle<PerformOutcome>> = Vec::with_capacity(batch.len());
            for id in &batch {
                let task = plan.task(*id)?;
                let context = self.context.clone();
                handles.push(tokio::spawn(task.perform(context)));
            }

            let outcomes = futures::future::join_all(handles).await;
            for (id, joined) in batch.into_iter().zip(outcomes) {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(join_error) => {
                        error!(action = %id, error = %join_error, "Action task panicked");
                        let description = plan.action(id)?.description().to_string();
                        self.context
                            .reporter
                            .internal_error(&description, &anyhow::Error::new(join_error));
                        PerformOutcome::InternalError
                    }
                };
                plan.record_outcome(id, outcome)?;
                plan.remove_execution_action(id)?;
            }
        }
        Ok(batches)
    }

    /// Run `execute(Utc::now())` every configured period on a background task
    pub fn spawn(self: Arc<Self>) -> ExecutorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.config.period();
        let executor_id = self.executor_id;

        info!(
            executor_id = %executor_id,
            period_ms = self.config.period_ms,
            "Starting executor loop"
        );

        let join = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                match self.execute(Utc::now()).await {
                    Ok(result) if !result.is_empty() => {
                        debug!(executor_id = %executor_id, completions = result.len(), "Tick produced results");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(executor_id = %executor_id, error = %e, "Executor tick failed");
                    }
                }
            }

            info!(executor_id = %executor_id, "Executor loop stopped");
        });

        ExecutorHandle {
            executor_id,
            shutdown: shutdown_tx,
            join,
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("executor_id", &self.executor_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle of a spawned executor loop
#[derive(Debug)]
pub struct ExecutorHandle {
    executor_id: Uuid,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExecutorHandle {
    pub fn executor_id(&self) -> Uuid {
        self.executor_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop after the tick in flight and wait for it to exit
    pub async fn shutdown(self) -> Result<()> {
        info!(executor_id = %self.executor_id, "Stopping executor loop");
        if self.shutdown.send(true).is_err() {
            debug!(executor_id = %self.executor_id, "Executor loop already exited");
        }
        self.join
            .await
            .map_err(|e| ControllerError::Shutdown(e.to_string()))
    }
}
