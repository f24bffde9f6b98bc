use crate::models::{ExecutableId, ServiceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Successful completions of one executor tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    started: BTreeSet<ExecutableId>,
    updated: BTreeSet<ExecutableId>,
    stopped: BTreeSet<ExecutableId>,
    migrated: BTreeSet<ExecutableId>,
    activated: BTreeSet<ServiceId>,
    deactivated: BTreeSet<ServiceId>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_started(&mut self, executable: ExecutableId) {
        self.started.insert(executable);
    }

    pub fn add_updated(&mut self, executable: ExecutableId) {
        self.updated.insert(executable);
    }

    pub fn add_stopped(&mut self, executable: ExecutableId) {
        self.stopped.insert(executable);
    }

    /// Record the target of a completed migration
    pub fn add_migrated(&mut self, executable: ExecutableId) {
        self.migrated.insert(executable);
    }

    pub fn add_activated(&mut self, service: ServiceId) {
        self.activated.insert(service);
    }

    pub fn add_deactivated(&mut self, service: ServiceId) {
        self.deactivated.insert(service);
    }

    pub fn started(&self) -> &BTreeSet<ExecutableId> {
        &self.started
    }

    pub fn updated(&self) -> &BTreeSet<ExecutableId> {
        &self.updated
    }

    pub fn stopped(&self) -> &BTreeSet<ExecutableId> {
        &self.stopped
    }

    pub fn migrated(&self) -> &BTreeSet<ExecutableId> {
        &self.migrated
    }

    pub fn activated(&self) -> &BTreeSet<ServiceId> {
        &self.activated
    }

    pub fn deactivated(&self) -> &BTreeSet<ServiceId> {
        &self.deactivated
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of recorded completions
    pub fn len(&self) -> usize {
        self.started.len()
            + self.updated.len()
            + self.stopped.len()
            + self.migrated.len()
            + self.activated.len()
            + self.deactivated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_is_idempotent() {
        let mut result = ExecutionResult::new();
        assert!(result.is_empty());

        result.add_started(ExecutableId(1));
        result.add_started(ExecutableId(1));
        result.add_activated(ServiceId(1));

        assert_eq!(result.started().len(), 1);
        assert_eq!(result.len(), 2);
    }
}
