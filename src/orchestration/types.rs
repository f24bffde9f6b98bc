//! Orchestration vocabulary shared by actions, the plan and the executor.

use crate::constants::priority;
use crate::models::{ExecutableId, Migration, ServiceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an action inside its plan, assigned in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dispatch tier of an action; among ready actions only the highest tier runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPriority {
    #[default]
    Default,
    Update,
    Start,
    Migrate,
    Stop,
}

impl ExecutionPriority {
    pub fn value(&self) -> u8 {
        match self {
            Self::Default => priority::DEFAULT,
            Self::Update => priority::UPDATE,
            Self::Start => priority::START,
            Self::Migrate => priority::MIGRATE,
            Self::Stop => priority::STOP,
        }
    }
}

/// What an action does and to which entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    Start {
        executable: ExecutableId,
    },
    Update {
        executable: ExecutableId,
    },
    Stop {
        executable: ExecutableId,
    },
    ActivateService {
        service: ServiceId,
        executable: ExecutableId,
    },
    DeactivateService {
        service: ServiceId,
        executable: ExecutableId,
    },
    Migrate {
        migration: Migration,
    },
}

impl ActionKind {
    pub fn priority(&self) -> ExecutionPriority {
        match self {
            Self::Start { .. } => ExecutionPriority::Start,
            Self::Update { .. } => ExecutionPriority::Update,
            Self::Stop { .. } => ExecutionPriority::Stop,
            Self::Migrate { .. } => ExecutionPriority::Migrate,
            Self::ActivateService { .. } | Self::DeactivateService { .. } => {
                ExecutionPriority::Default
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "Start",
            Self::Update { .. } => "Update",
            Self::Stop { .. } => "Stop",
            Self::ActivateService { .. } => "ActivateService",
            Self::DeactivateService { .. } => "DeactivateService",
            Self::Migrate { .. } => "Migrate",
        }
    }

    /// Executable a Start, Update or Stop action operates on
    pub fn executable(&self) -> Option<ExecutableId> {
        match self {
            Self::Start { executable }
            | Self::Update { executable }
            | Self::Stop { executable } => Some(*executable),
            _ => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start { .. })
    }
}

/// How a performed action ended, as seen by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformOutcome {
    /// The action ran; its effect is judged from persisted state on finish
    Performed,
    /// Superseded by a migration, nothing was run
    Skipped,
    /// The action's own machinery failed and the error was reported
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_tiers_are_ordered() {
        assert!(ExecutionPriority::Stop > ExecutionPriority::Migrate);
        assert!(ExecutionPriority::Migrate > ExecutionPriority::Start);
        assert!(ExecutionPriority::Start > ExecutionPriority::Update);
        assert!(ExecutionPriority::Update > ExecutionPriority::Default);
        assert_eq!(ExecutionPriority::Stop.value(), 4);
        assert_eq!(ExecutionPriority::default().value(), 0);
    }

    #[test]
    fn test_service_actions_use_default_tier() {
        let kind = ActionKind::ActivateService {
            service: ServiceId(1),
            executable: ExecutableId(2),
        };
        assert_eq!(kind.priority(), ExecutionPriority::Default);
        assert_eq!(kind.executable(), None);
    }
}
