//! # Executable Service
//!
//! Auxiliary feature (recording, streaming) attached to a running executable,
//! with an activation lifecycle independent of the executable's own.

use super::{ExecutableId, ExecutionReport, ServiceId, TimeSlot};
use crate::state_machine::states::ServiceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceKind {
    Recording,
    Streaming { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableService {
    pub id: ServiceId,
    /// Executable the service is attached to
    pub executable: ExecutableId,
    pub kind: ServiceKind,
    pub slot: TimeSlot,
    /// Identifier assigned by the device (recording id, stream id)
    pub device_id: Option<String>,
    pub attempt_count: u32,
    pub next_attempt: Option<DateTime<Utc>>,
    pub reports: Vec<ExecutionReport>,
    state: ServiceState,
}

impl ExecutableService {
    pub fn new(id: ServiceId, executable: ExecutableId, kind: ServiceKind, slot: TimeSlot) -> Self {
        Self {
            id,
            executable,
            kind,
            slot,
            device_id: None,
            attempt_count: 0,
            next_attempt: None,
            reports: Vec::new(),
            state: ServiceState::NotActive,
        }
    }

    /// Rehydrate a state loaded from storage
    pub fn with_persisted_state(mut self, state: ServiceState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ServiceState) {
        self.state = state;
    }

    pub fn latest_report(&self) -> Option<&ExecutionReport> {
        self.reports.last()
    }

    pub fn add_report(&mut self, report: ExecutionReport) {
        self.reports.push(report);
    }
}

impl fmt::Display for ExecutableService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ServiceKind::Recording => "recording",
            ServiceKind::Streaming { .. } => "streaming",
        };
        write!(f, "{kind} service ({}) of executable {}", self.id, self.executable)
    }
}
