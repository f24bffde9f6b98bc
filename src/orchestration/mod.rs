//! # Orchestration Engine
//!
//! Turns due bookings into device work. The [`Executor`] loads what is due
//! in a tick, an [`ExecutionPlan`] orders it as a dependency graph of
//! [`ExecutionAction`]s, and the outcome of every action is collected into an
//! [`ExecutionResult`].
//!
//! ## Core Components
//!
//! - **Executor**: periodic driver holding the per-tick lock
//! - **ExecutionPlan**: action arena with dependency edges and priority tiers
//! - **ExecutionAction**: one start, update, stop, service or migration step
//! - **RetryPolicy**: attempt accounting applied when an action finishes

pub mod action;
pub mod errors;
pub mod executor;
pub mod plan;
pub mod result;
pub mod retry;
pub mod types;

pub use action::{ActionContext, ActionTarget, ActionTask, ExecutionAction};
pub use errors::{PlanError, PlanResult};
pub use executor::{Executor, ExecutorHandle};
pub use plan::ExecutionPlan;
pub use result::ExecutionResult;
pub use retry::{RetryPolicy, RetryState};
pub use types::{ActionId, ActionKind, ExecutionPriority, PerformOutcome};
