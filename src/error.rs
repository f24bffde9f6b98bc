//! Crate-level error type returned by the executor.

use crate::config::ConfigurationError;
use crate::orchestration::PlanError;
use crate::persistence::PersistenceError;
use crate::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Execution plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("State transition error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Executor loop terminated abnormally: {0}")]
    Shutdown(String),
}

impl ControllerError {
    /// Whether the failure lies outside the engine and the next tick may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Persistence(PersistenceError::Unavailable(_))
                | Self::StateMachine(StateMachineError::Persistence(
                    PersistenceError::Unavailable(_)
                ))
        )
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_store_is_transient() {
        let error: ControllerError = PersistenceError::Unavailable("store offline".into()).into();
        assert!(error.is_transient());
        assert!(error.to_string().contains("store offline"));

        let error: ControllerError = PlanError::NotBuilt.into();
        assert!(!error.is_transient());
    }
}
