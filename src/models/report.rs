//! # Execution Reports
//!
//! Structured failure reports attached to executables and services by the
//! operation that failed. The resolution of the latest report drives the retry
//! decision made when an action finishes.

use super::ExecutableId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the controller should do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The failure is transient, the operation may be attempted again
    TryAgain,
    /// Retrying will not help, an operator has to intervene
    StopTrying,
}

/// Cause of a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReportKind {
    /// A device command returned a failure
    CommandFailed { command: String, reason: String },
    /// A used room could not be started because the reused room is not running
    UsedRoomNotStarted { room: ExecutableId },
    /// An executable this operation relies on is not running
    ExecutableNotStarted { executable: ExecutableId },
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandFailed { command, reason } => {
                write!(f, "command-failed: {command} ({reason})")
            }
            Self::UsedRoomNotStarted { room } => write!(f, "used-room-not-started: {room}"),
            Self::ExecutableNotStarted { executable } => {
                write!(f, "executable-not-started: {executable}")
            }
        }
    }
}

/// A failure report attached to an executable or service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub reported_at: DateTime<Utc>,
    pub kind: ReportKind,
    pub resolution: Resolution,
}

impl ExecutionReport {
    pub fn new(kind: ReportKind, resolution: Resolution) -> Self {
        Self {
            reported_at: Utc::now(),
            kind,
            resolution,
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        reason: impl Into<String>,
        resolution: Resolution,
    ) -> Self {
        Self::new(
            ReportKind::CommandFailed {
                command: command.into(),
                reason: reason.into(),
            },
            resolution,
        )
    }

    /// Whether the failure this report describes may be retried automatically
    pub fn is_retryable(&self) -> bool {
        self.resolution == Resolution::TryAgain
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:?}]", self.kind, self.resolution)
    }
}
