//! # Domain Models
//!
//! Entities handled by the execution engine. They are produced by the booking
//! process and persisted by a repository; the engine loads them, drives their
//! lifecycle and stores them back.

pub mod executable;
pub mod migration;
pub mod report;
pub mod service;

pub use executable::{Executable, ExecutableKind};
pub use migration::{Migration, MigrationError};
pub use report::{ExecutionReport, ReportKind, Resolution};
pub use service::{ExecutableService, ServiceKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a persisted executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableId(pub u64);

impl fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a persisted executable service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open interval `[start, end)` during which an executable is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether `next` starts exactly where this slot ends
    pub fn is_followed_by(&self, next: &TimeSlot) -> bool {
        self.end == next.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_slot_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let slot = TimeSlot::new(start, start + Duration::hours(1));
        assert!(slot.contains(start));
        assert!(!slot.contains(slot.end));
        assert!(slot.is_followed_by(&TimeSlot::new(slot.end, slot.end + Duration::hours(1))));
    }
}
