//! # Retry Policy
//!
//! Data-driven retries: a failed action does not loop, it schedules the next
//! attempt on the entity and the periodic query picks it up again once that
//! time has been reached.

use crate::config::ExecutorConfig;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between a failure and the next attempt
    pub retry_delay: Duration,
    /// Attempts after which automatic retries stop
    pub max_attempt_count: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Retry bookkeeping of an executable or service after a finished action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt_count: u32,
    pub next_attempt: Option<DateTime<Utc>>,
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            max_attempt_count: config.max_attempt_count,
        }
    }

    /// Bookkeeping after a successful action
    pub fn on_success(&self) -> RetryState {
        RetryState {
            attempt_count: 0,
            next_attempt: None,
        }
    }

    /// Bookkeeping after a failed action; a retry is only scheduled for
    /// retryable failures with attempts left
    pub fn on_failure(&self, attempt_count: u32, retryable: bool, now: DateTime<Utc>) -> RetryState {
        let attempt_count = attempt_count.saturating_add(1);
        let next_attempt = if retryable && attempt_count < self.max_attempt_count {
            Some(now + self.retry_delay)
        } else {
            None
        };
        RetryState {
            attempt_count,
            next_attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            retry_delay: Duration::seconds(60),
            max_attempt_count: 3,
        }
    }

    #[test]
    fn test_retryable_failure_schedules_next_attempt() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let state = policy().on_failure(0, true, now);
        assert_eq!(state.attempt_count, 1);
        assert_eq!(state.next_attempt, Some(now + Duration::seconds(60)));
    }

    #[test]
    fn test_exhausted_attempts_stop_retrying() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let state = policy().on_failure(2, true, now);
        assert_eq!(state.attempt_count, 3);
        assert_eq!(state.next_attempt, None);
    }

    #[test]
    fn test_terminal_failure_is_not_retried() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let state = policy().on_failure(0, false, now);
        assert_eq!(state.attempt_count, 1);
        assert_eq!(state.next_attempt, None);
    }

    #[test]
    fn test_success_resets_bookkeeping() {
        let state = policy().on_success();
        assert_eq!(state.attempt_count, 0);
        assert!(state.next_attempt.is_none());
    }
}
