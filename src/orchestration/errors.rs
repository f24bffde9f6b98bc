use super::types::ActionId;
use crate::models::{ExecutableId, MigrationError};
use thiserror::Error;

/// Structural defects of an execution plan. These abort the tick before any
/// action runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Action {description} is already planned")]
    DuplicateAction { description: String },

    #[error("Actions cannot be added to a plan that is already built")]
    AlreadyBuilt,

    #[error("Dependency cycle between actions: {}", .actions.join(", "))]
    DependencyCycle { actions: Vec<String> },

    #[error("Migration {from} -> {to} requires a planned stop of its source")]
    MissingMigrationSource { from: ExecutableId, to: ExecutableId },

    #[error("Migration {from} -> {to} requires a planned start of its target")]
    MissingMigrationTarget { from: ExecutableId, to: ExecutableId },

    #[error(transparent)]
    NonAdjacentMigration(#[from] MigrationError),

    #[error("Action {0} is not part of the plan")]
    UnknownAction(ActionId),

    #[error("Plan must be built before it is executed")]
    NotBuilt,

    #[error("No action is ready although {remaining} actions remain")]
    Stalled { remaining: usize },
}

pub type PlanResult<T> = Result<T, PlanError>;
