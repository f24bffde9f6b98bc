#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Confctl Core
//!
//! Execution engine of a conferencing resource-booking controller.
//!
//! ## Overview
//!
//! Bookings become *executables*: virtual rooms, dial-out calls and
//! compartments grouping them, each with a time slot. Recordings and
//! streams attached to them are *executable services*. The engine
//! periodically starts whatever became due, applies modifications to running
//! executables, stops the ones whose slot ended and hands a running room over
//! to the booking that continues it.
//!
//! ## Module Organization
//!
//! - [`models`] - Executables, services, migrations and execution reports
//! - [`state_machine`] - Lifecycle transitions issuing device commands
//! - [`orchestration`] - Execution plan, actions and the periodic executor
//! - [`persistence`] - Repository and unit-of-work seams plus an in-memory store
//! - [`device`] - Device command boundary
//! - [`reporting`] - Sink for internal errors
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confctl_core::config::ConfigManager;
//! use confctl_core::device::DeviceCommandService;
//! use confctl_core::orchestration::Executor;
//! use confctl_core::persistence::InMemoryRepository;
//! use confctl_core::reporting::TracingReporter;
//! use std::sync::Arc;
//!
//! # async fn example(device: Arc<dyn DeviceCommandService>) -> Result<(), Box<dyn std::error::Error>> {
//! confctl_core::logging::init_structured_logging();
//! let config = ConfigManager::load()?;
//!
//! let executor = Arc::new(Executor::from_config_manager(
//!     &config,
//!     Arc::new(InMemoryRepository::new()),
//!     device,
//!     Arc::new(TracingReporter),
//! )?);
//! let handle = executor.spawn();
//! // ...
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod reporting;
pub mod state_machine;

pub use config::{ConfigManager, ControllerConfig, ExecutorConfig, LoggingConfig};
pub use device::{CommandFailure, CommandResult, CommandSuccess, DeviceCommand, DeviceCommandService};
pub use error::{ControllerError, Result};
pub use models::{
    Executable, ExecutableId, ExecutableKind, ExecutableService, ExecutionReport, Migration,
    ServiceId, ServiceKind, TimeSlot,
};
pub use orchestration::{
    ActionId, ActionKind, ExecutionAction, ExecutionPlan, ExecutionPriority, ExecutionResult,
    Executor, ExecutorHandle, PlanError,
};
pub use persistence::{ExecutableRepository, ExecutionWindow, InMemoryRepository, UnitOfWork};
pub use reporting::{Reporter, TracingReporter};
pub use state_machine::{ExecutableState, ServiceState};
