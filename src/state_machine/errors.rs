use crate::models::{ExecutableId, ServiceId};
use crate::persistence::PersistenceError;
use thiserror::Error;

use super::states::{ExecutableState, ServiceState};

/// Errors raised by the executable and service lifecycle entry points
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Cannot {operation} executable {executable} in state {state}")]
    IllegalState {
        executable: ExecutableId,
        state: ExecutableState,
        operation: &'static str,
    },

    #[error("Cannot {operation} service {service} in state {state}")]
    IllegalServiceState {
        service: ServiceId,
        state: ServiceState,
        operation: &'static str,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StateMachineError {
    pub fn illegal_state(
        executable: ExecutableId,
        state: ExecutableState,
        operation: &'static str,
    ) -> Self {
        Self::IllegalState {
            executable,
            state,
            operation,
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
