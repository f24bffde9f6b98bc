//! # Executable
//!
//! A schedulable resource instance (room, used room, endpoint, connection,
//! compartment) with a time slot and a lifecycle state.
//!
//! The lifecycle state is only changed through the state machine entry points
//! (`start`, `stop`, `update`, `mark_not_started`); callers read it through
//! [`Executable::state`]. Repository implementations rehydrate a persisted state
//! with [`Executable::with_persisted_state`].

use super::{ExecutableId, ExecutionReport, Migration, TimeSlot};
use crate::state_machine::states::ExecutableState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variant-specific configuration of an executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutableKind {
    /// Virtual room hosted on a conferencing device
    Room {
        resource_id: String,
        name: String,
        license_count: u32,
    },
    /// Additional capacity inside an already running room
    UsedRoom { room: ExecutableId, license_count: u32 },
    /// A passive device endpoint (no device command of its own)
    Endpoint { resource_id: String, alias: String },
    /// A call placed from an endpoint to another endpoint or a room
    Connection {
        from: ExecutableId,
        to: ExecutableId,
    },
    /// Composition of other executables without a device action of its own
    Compartment,
}

impl ExecutableKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Room { .. } => "room",
            Self::UsedRoom { .. } => "used_room",
            Self::Endpoint { .. } => "endpoint",
            Self::Connection { .. } => "connection",
            Self::Compartment => "compartment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    pub id: ExecutableId,
    pub kind: ExecutableKind,
    pub slot: TimeSlot,
    /// Executables this one is composed of or built on top of
    pub children: Vec<ExecutableId>,
    /// Hand-off link, stored on the target of the migration
    pub migration: Option<Migration>,
    /// Identifier assigned by the device (room id, call id)
    pub device_id: Option<String>,
    /// Source of a completed non-replacement migration
    pub migrated_from: Option<ExecutableId>,
    pub attempt_count: u32,
    pub next_attempt: Option<DateTime<Utc>>,
    pub reports: Vec<ExecutionReport>,
    modified: bool,
    state: ExecutableState,
}

impl Executable {
    /// Create a new executable in the `NotAllocated` state
    pub fn new(id: ExecutableId, kind: ExecutableKind, slot: TimeSlot) -> Self {
        Self {
            id,
            kind,
            slot,
            children: Vec::new(),
            migration: None,
            device_id: None,
            migrated_from: None,
            attempt_count: 0,
            next_attempt: None,
            reports: Vec::new(),
            modified: false,
            state: ExecutableState::NotAllocated,
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ExecutableId>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    pub fn with_migration(mut self, migration: Migration) -> Self {
        self.migration = Some(migration);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Rehydrate a state loaded from storage
    pub fn with_persisted_state(mut self, state: ExecutableState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> ExecutableState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ExecutableState) {
        self.state = state;
    }

    /// Whether the configuration changed since it was last applied to the device
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the configuration as changed so the next tick re-applies it
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Physical device resource this executable runs on, if any
    pub fn resource_id(&self) -> Option<&str> {
        match &self.kind {
            ExecutableKind::Room { resource_id, .. }
            | ExecutableKind::Endpoint { resource_id, .. } => Some(resource_id),
            _ => None,
        }
    }

    /// Executables that must be running before this one can start.
    ///
    /// Children first, followed by kind-specific references (the reused room of
    /// a used room, both ends of a connection), without duplicates.
    pub fn execution_dependencies(&self) -> Vec<ExecutableId> {
        let mut dependencies = self.children.clone();
        match &self.kind {
            ExecutableKind::UsedRoom { room, .. } => dependencies.push(*room),
            ExecutableKind::Connection { from, to } => {
                dependencies.push(*from);
                dependencies.push(*to);
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        dependencies.retain(|id| *id != self.id && seen.insert(*id));
        dependencies
    }

    pub fn latest_report(&self) -> Option<&ExecutionReport> {
        self.reports.last()
    }

    pub fn add_report(&mut self, report: ExecutionReport) {
        self.reports.push(report);
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExecutableKind::Room { name, .. } => write!(f, "room '{name}' ({})", self.id),
            kind => write!(f, "{} ({})", kind.type_name(), self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn slot() -> TimeSlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        TimeSlot::new(start, start + Duration::hours(1))
    }

    #[test]
    fn test_new_executable_is_not_allocated() {
        let executable = Executable::new(ExecutableId(1), ExecutableKind::Compartment, slot());
        assert_eq!(executable.state(), ExecutableState::NotAllocated);
        assert!(!executable.is_modified());
        assert_eq!(executable.attempt_count, 0);
    }

    #[test]
    fn test_connection_dependencies_include_both_ends() {
        let executable = Executable::new(
            ExecutableId(5),
            ExecutableKind::Connection {
                from: ExecutableId(2),
                to: ExecutableId(3),
            },
            slot(),
        )
        .with_children([ExecutableId(2)]);

        assert_eq!(
            executable.execution_dependencies(),
            vec![ExecutableId(2), ExecutableId(3)]
        );
    }

    #[test]
    fn test_used_room_depends_on_room() {
        let executable = Executable::new(
            ExecutableId(4),
            ExecutableKind::UsedRoom {
                room: ExecutableId(1),
                license_count: 5,
            },
            slot(),
        );
        assert_eq!(executable.execution_dependencies(), vec![ExecutableId(1)]);
    }

    #[test]
    fn test_display_names_rooms() {
        let executable = Executable::new(
            ExecutableId(9),
            ExecutableKind::Room {
                resource_id: "mcu-1".to_string(),
                name: "weekly".to_string(),
                license_count: 10,
            },
            slot(),
        );
        assert_eq!(executable.to_string(), "room 'weekly' (9)");
        assert_eq!(executable.resource_id(), Some("mcu-1"));
    }
}
