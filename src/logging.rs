//! # Structured Logging Module
//!
//! Environment-aware structured logging for the execution engine. Console
//! output is either human readable or JSON lines, filtered by `RUST_LOG` when
//! set and otherwise by a level derived from the environment.

use crate::config::{LogFormat, LoggingConfig};
use crate::constants::{DEFAULT_ENVIRONMENT, ENVIRONMENT_VARIABLE};
use crate::models::ExecutableId;
use crate::state_machine::ExecutableState;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging from the logging section of the configuration
pub fn init_structured_logging_with(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = match config.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed(),
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            format = ?config.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var(ENVIRONMENT_VARIABLE).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "test" => "debug",
        "development" => "debug",
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for executable lifecycle operations
pub fn log_executable_operation(
    operation: &str,
    executable_id: ExecutableId,
    kind: &str,
    state: ExecutableState,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        executable_id = %executable_id,
        kind = %kind,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🎛️ EXECUTABLE_OPERATION"
    );
}

/// Log structured data for execution actions
pub fn log_action_operation(
    operation: &str,
    action: &str,
    status: &str,
    attempt_count: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        action = %action,
        status = %status,
        attempt_count = attempt_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 ACTION_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
