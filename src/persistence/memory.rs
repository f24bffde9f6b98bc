//! In-memory repository.
//!
//! Reference implementation of the persistence boundary backed by concurrent
//! maps. Each [`UnitOfWork`] stages its writes and publishes them on commit.
//! Used by the test suites and by embedders that keep the executable graph in
//! memory.

use super::{
    ExecutableRepository, ExecutionWindow, PersistenceError, PersistenceResult, UnitOfWork,
};
use crate::models::{Executable, ExecutableId, ExecutableService, ServiceId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryStore {
    executables: DashMap<ExecutableId, Executable>,
    services: DashMap<ServiceId, ExecutableService>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    fn ensure_available(&self) -> PersistenceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn select_executables<F>(&self, predicate: F) -> Vec<Executable>
    where
        F: Fn(&Executable) -> bool,
    {
        let mut selected: Vec<Executable> = self
            .executables
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        selected.sort_by_key(|executable| executable.id);
        selected
    }

    fn select_services<F>(&self, predicate: F) -> Vec<ExecutableService>
    where
        F: Fn(&ExecutableService) -> bool,
    {
        let mut selected: Vec<ExecutableService> = self
            .services
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        selected.sort_by_key(|service| service.id);
        selected
    }
}

/// Repository keeping executables and services in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_executable(&self, executable: Executable) {
        self.store.executables.insert(executable.id, executable);
    }

    pub fn insert_service(&self, service: ExecutableService) {
        self.store.services.insert(service.id, service);
    }

    /// Snapshot of the committed state of an executable
    pub fn executable(&self, id: ExecutableId) -> Option<Executable> {
        self.store.executables.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of the committed state of a service
    pub fn service(&self, id: ServiceId) -> Option<ExecutableService> {
        self.store.services.get(&id).map(|entry| entry.value().clone())
    }

    /// Apply a change to a committed executable, as the booking process would
    pub fn modify_executable<F>(&self, id: ExecutableId, change: F) -> PersistenceResult<()>
    where
        F: FnOnce(&mut Executable),
    {
        let mut entry = self
            .store
            .executables
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::executable_not_found(id))?;
        change(entry.value_mut());
        Ok(())
    }

    /// Simulate an outage of the storage backend
    pub fn set_available(&self, available: bool) {
        self.store.unavailable.store(!available, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutableRepository for InMemoryRepository {
    async fn find_executables_to_start(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>> {
        self.store.ensure_available()?;
        Ok(self
            .store
            .select_executables(|executable| window.is_due_to_start(executable)))
    }

    async fn find_executables_to_update(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>> {
        self.store.ensure_available()?;
        Ok(self
            .store
            .select_executables(|executable| window.is_due_to_update(executable)))
    }

    async fn find_executables_to_stop(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<Executable>> {
        self.store.ensure_available()?;
        Ok(self
            .store
            .select_executables(|executable| window.is_due_to_stop(executable)))
    }

    async fn find_services_to_activate(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<ExecutableService>> {
        self.store.ensure_available()?;
        Ok(self
            .store
            .select_services(|service| window.is_due_to_activate(service)))
    }

    async fn find_services_to_deactivate(
        &self,
        window: &ExecutionWindow,
    ) -> PersistenceResult<Vec<ExecutableService>> {
        self.store.ensure_available()?;
        Ok(self
            .store
            .select_services(|service| window.is_due_to_deactivate(service)))
    }

    async fn find_executable(&self, id: ExecutableId) -> PersistenceResult<Option<Executable>> {
        self.store.ensure_available()?;
        Ok(self.executable(id))
    }

    async fn begin(&self) -> PersistenceResult<Box<dyn UnitOfWork>> {
        self.store.ensure_available()?;
        Ok(Box::new(MemoryUnitOfWork {
            store: Arc::clone(&self.store),
            staged_executables: HashMap::new(),
            staged_services: HashMap::new(),
        }))
    }
}

/// Session staging writes until commit; reads see the session's own writes
struct MemoryUnitOfWork {
    store: Arc<MemoryStore>,
    staged_executables: HashMap<ExecutableId, Executable>,
    staged_services: HashMap<ServiceId, ExecutableService>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn executable(&mut self, id: ExecutableId) -> PersistenceResult<Executable> {
        if let Some(staged) = self.staged_executables.get(&id) {
            return Ok(staged.clone());
        }
        self.store.ensure_available()?;
        self.store
            .executables
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PersistenceError::executable_not_found(id))
    }

    async fn save_executable(&mut self, executable: &Executable) -> PersistenceResult<()> {
        self.staged_executables
            .insert(executable.id, executable.clone());
        Ok(())
    }

    async fn service(&mut self, id: ServiceId) -> PersistenceResult<ExecutableService> {
        if let Some(staged) = self.staged_services.get(&id) {
            return Ok(staged.clone());
        }
        self.store.ensure_available()?;
        self.store
            .services
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PersistenceError::service_not_found(id))
    }

    async fn save_service(&mut self, service: &ExecutableService) -> PersistenceResult<()> {
        self.staged_services.insert(service.id, service.clone());
        Ok(())
    }

    async fn commit(&mut self) -> PersistenceResult<()> {
        self.store.ensure_available()?;
        let executables = self.staged_executables.len();
        let services = self.staged_services.len();
        for (id, executable) in self.staged_executables.drain() {
            self.store.executables.insert(id, executable);
        }
        for (id, service) in self.staged_services.drain() {
            self.store.services.insert(id, service);
        }
        debug!(executables, services, "Committed in-memory unit of work");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutableKind, TimeSlot};
    use chrono::{Duration, TimeZone, Utc};

    fn compartment(id: u64, children: &[u64]) -> Executable {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        Executable::new(
            ExecutableId(id),
            ExecutableKind::Compartment,
            TimeSlot::new(start, start + Duration::hours(1)),
        )
        .with_children(children.iter().map(|id| ExecutableId(*id)))
    }

    #[tokio::test]
    async fn test_uncommitted_work_is_discarded() {
        let repository = InMemoryRepository::new();
        repository.insert_executable(compartment(1, &[]));

        {
            let mut session = repository.begin().await.unwrap();
            let mut executable = session.executable(ExecutableId(1)).await.unwrap();
            executable.mark_modified();
            session.save_executable(&executable).await.unwrap();
        }

        assert!(!repository.executable(ExecutableId(1)).unwrap().is_modified());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let repository = InMemoryRepository::new();
        repository.insert_executable(compartment(1, &[]));

        let mut session = repository.begin().await.unwrap();
        let mut executable = session.executable(ExecutableId(1)).await.unwrap();
        executable.mark_modified();
        session.save_executable(&executable).await.unwrap();
        assert!(session.executable(ExecutableId(1)).await.unwrap().is_modified());
        session.commit().await.unwrap();

        assert!(repository.executable(ExecutableId(1)).unwrap().is_modified());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_queries() {
        let repository = InMemoryRepository::new();
        repository.set_available(false);

        let now = Utc::now();
        let window = ExecutionWindow {
            now,
            start_before: now,
            stop_before: now,
            max_attempt_count: 3,
        };
        assert!(matches!(
            repository.find_executables_to_start(&window).await,
            Err(PersistenceError::Unavailable(_))
        ));
        assert!(repository.begin().await.is_err());
    }
}
