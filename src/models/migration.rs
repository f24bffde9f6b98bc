//! # Migration
//!
//! Hand-off of an executable's role to a successor occupying the immediately
//! following time slot. When both executables are rooms on the same device the
//! migration is a *replacement*: the running room is re-targeted in place
//! instead of being deleted and created again.

use super::{Executable, ExecutableId, ExecutableKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Migration {
    pub source: ExecutableId,
    pub target: ExecutableId,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    #[error("Migration {from} -> {to} requires adjacent slots, but source ends at {source_end} and target starts at {target_start}")]
    NonAdjacentSlots {
        from: ExecutableId,
        to: ExecutableId,
        source_end: DateTime<Utc>,
        target_start: DateTime<Utc>,
    },

    #[error("Migration {from} -> {to} was given executable {actual} as its {role}")]
    ExecutableMismatch {
        from: ExecutableId,
        to: ExecutableId,
        actual: ExecutableId,
        role: &'static str,
    },
}

impl Migration {
    pub fn new(source: ExecutableId, target: ExecutableId) -> Self {
        Self { source, target }
    }

    /// Check that the given executables are this migration's endpoints and that
    /// the source slot ends exactly where the target slot starts
    pub fn validate(&self, source: &Executable, target: &Executable) -> Result<(), MigrationError> {
        if source.id != self.source {
            return Err(self.mismatch(source.id, "source"));
        }
        if target.id != self.target {
            return Err(self.mismatch(target.id, "target"));
        }
        if !source.slot.is_followed_by(&target.slot) {
            return Err(MigrationError::NonAdjacentSlots {
                from: self.source,
                to: self.target,
                source_end: source.slot.end,
                target_start: target.slot.start,
            });
        }
        Ok(())
    }

    /// Whether source and target are rooms on the same physical device
    pub fn is_replacement(source: &Executable, target: &Executable) -> bool {
        match (&source.kind, &target.kind) {
            (
                ExecutableKind::Room {
                    resource_id: source_resource,
                    ..
                },
                ExecutableKind::Room {
                    resource_id: target_resource,
                    ..
                },
            ) => source_resource == target_resource,
            _ => false,
        }
    }

    fn mismatch(&self, actual: ExecutableId, role: &'static str) -> MigrationError {
        MigrationError::ExecutableMismatch {
            from: self.source,
            to: self.target,
            actual,
            role,
        }
    }
}
