// Lifecycle state machines for executables and executable services.
//
// Entry points validate the current state, run the device behavior of the
// entity's kind and stage the result in the caller's unit of work.

pub mod errors;
pub mod executable_state_machine;
pub mod service_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use executable_state_machine::{mark_not_started, ExecutableStateMachine};
pub use service_state_machine::ServiceStateMachine;
pub use states::{ExecutableState, ServiceState};
