//! # Internal Error Reporting
//!
//! Failures of an action's own machinery (persistence outages, illegal state
//! transitions, unexpected panics in a worker task) are not execution reports
//! of a device; they are handed to a [`Reporter`] with the description of the
//! action that hit them.

use crate::logging::log_error;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub trait Reporter: Send + Sync {
    fn internal_error(&self, description: &str, error: &anyhow::Error);
}

/// Reporter writing internal errors to the structured log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn internal_error(&self, description: &str, error: &anyhow::Error) {
        log_error("executor", description, &format!("{error:#}"), None);
    }
}

/// An internal error captured by [`MemoryReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub reported_at: DateTime<Utc>,
    pub description: String,
    pub message: String,
}

/// Reporter keeping internal errors for later inspection
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<ReportedError>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ReportedError> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn internal_error(&self, description: &str, error: &anyhow::Error) {
        self.entries.lock().push(ReportedError {
            reported_at: Utc::now(),
            description: description.to_string(),
            message: format!("{error:#}"),
        });
    }
}
