//! # Persistence Boundary
//!
//! The engine never talks to storage directly. It queries an
//! [`ExecutableRepository`] for due work and performs every action inside its
//! own [`UnitOfWork`], so a failure in one action cannot corrupt the persisted
//! state written by another.
//!
//! Eligibility rules for the due-work queries are defined once on
//! [`ExecutionWindow`] so that every repository implementation selects the same
//! executables and services.

pub mod memory;

pub use memory::InMemoryRepository;

use crate::models::{Executable, ExecutableId, ExecutableService, ServiceId};
use crate::state_machine::states::ExecutableState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Persistence unavailable: {0}")]
    Unavailable(String),

    #[error("Conflicting update of {entity} {id}: {reason}")]
    Conflict {
        entity: &'static str,
        id: u64,
        reason: String,
    },
}

impl PersistenceError {
    pub fn executable_not_found(id: ExecutableId) -> Self {
        Self::NotFound {
            entity: "executable",
            id: id.0,
        }
    }

    pub fn service_not_found(id: ServiceId) -> Self {
        Self::NotFound {
            entity: "service",
            id: id.0,
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Time bounds and attempt budget of one executor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionWindow {
    /// Reference time of the tick
    pub now: DateTime<Utc>,
    /// Slots starting at or before this instant are due to start
    pub start_before: DateTime<Utc>,
    /// Slots ending at or before this instant are due to stop
    pub stop_before: DateTime<Utc>,
    /// Entities that used up this many attempts are left to an operator
    pub max_attempt_count: u32,
}

impl ExecutionWindow {
    /// Attempt budget not exhausted and, after a failure, the scheduled retry
    /// time has been reached
    pub fn is_retry_eligible(&self, attempt_count: u32, next_attempt: Option<DateTime<Utc>>) -> bool {
        if attempt_count >= self.max_attempt_count {
            return false;
        }
        if attempt_count == 0 {
            return next_attempt.map_or(true, |at| at <= self.now);
        }
        next_attempt.is_some_and(|at| at <= self.now)
    }

    /// Attempt budget not exhausted and no retry scheduled for later. A
    /// terminal failure of a start or update does not lock out the stop.
    pub fn is_stop_eligible(&self, attempt_count: u32, next_attempt: Option<DateTime<Utc>>) -> bool {
        attempt_count < self.max_attempt_count && next_attempt.map_or(true, |at| at <= self.now)
    }

    pub fn is_due_to_start(&self, executable: &Executable) -> bool {
        executable.state().can_start()
            && executable.slot.start <= self.start_before
            && executable.slot.end > self.stop_before
            && self.is_retry_eligible(executable.attempt_count, executable.next_attempt)
    }

    pub fn is_due_to_update(&self, executable: &Executable) -> bool {
        executable.state().can_update()
            && executable.is_modified()
            && executable.slot.end > self.stop_before
            && self.is_retry_eligible(executable.attempt_count, executable.next_attempt)
    }

    pub fn is_due_to_stop(&self, executable: &Executable) -> bool {
        executable.state().is_started()
            && executable.slot.end <= self.stop_before
            && self.is_stop_eligible(executable.attempt_count, executable.next_attempt)
    }

    pub fn is_due_to_activate(&self, service: &ExecutableService) -> bool {
        service.state().can_activate()
            && service.slot.start <= self.start_before
            && service.slot.end > self.stop_before
            && self.is_retry_eligible(service.attempt_count, service.next_attempt)
    }

    pub fn is_due_to_deactivate(&self, service: &ExecutableService) -> bool {
        service.state().can_deactivate()
            && service.slot.end <= self.stop_before
            && self.is_retry_eligible(service.attempt_count, service.next_attempt)
    }
}

/// Query side of the persistence collaborator
#[async_trait]
pub trait ExecutableRepository: Send + Sync {
    async fn find_executables_to_start(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>>;

    async fn find_executables_to_update(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>>;

    async fn find_executables_to_stop(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>>;

    async fn find_services_to_activate(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<ExecutableService>>;

    async fn find_services_to_deactivate(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<ExecutableService>>;

    async fn find_executable(&self, id: ExecutableId) -> PersistenceResult<Option<Executable>>;

    /// Open an isolated unit of work
    async fn begin(&self) -> PersistenceResult<Box<dyn UnitOfWork>>;
}

/// Scoped persistence session owned by a single action.
///
/// Writes become visible to other sessions only on [`UnitOfWork::commit`];
/// dropping a session without committing discards them.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn executable(&mut self, id: ExecutableId) -> PersistenceResult<Executable>;

    async fn save_executable(&mut self, executable: &Executable) -> PersistenceResult<()>;

    async fn service(&mut self, id: ServiceId) -> PersistenceResult<ExecutableService>;

    async fn save_service(&mut self, service: &ExecutableService) -> PersistenceResult<()>;

    async fn commit(&mut self) -> PersistenceResult<()>;
}

/// Whether an executable state counts as "unset" for the `NotStarted` cascade
pub(crate) fn is_unallocated(state: ExecutableState) -> bool {
    state == ExecutableState::NotAllocated
}
