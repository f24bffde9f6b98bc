//! # System Constants
//!
//! Defaults and names that define the operational boundaries of the execution
//! engine.

/// Environment variable selecting the deployment environment
pub const ENVIRONMENT_VARIABLE: &str = "CONFCTL_ENV";

pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Prefix of environment variables overriding configuration values
/// (e.g. `CONFCTL__EXECUTOR__PERIOD_MS`)
pub const CONFIG_ENV_PREFIX: &str = "CONFCTL";

pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Executor defaults
pub mod executor {
    /// Interval between two ticks
    pub const DEFAULT_PERIOD_MS: u64 = 10_000;

    /// Negative values look ahead: executables start this long before their slot
    pub const DEFAULT_START_OFFSET_SECONDS: i64 = -30;

    /// Positive values delay stopping past the end of the slot
    pub const DEFAULT_END_OFFSET_SECONDS: i64 = 30;

    /// Time a freshly created room needs before participants can dial in
    pub const DEFAULT_ROOM_SETTLE_MS: u64 = 2_000;

    pub const DEFAULT_RETRY_DELAY_SECONDS: i64 = 60;

    pub const DEFAULT_MAX_ATTEMPT_COUNT: u32 = 5;

    /// Bound of every offset and delay given in seconds
    pub const MAX_DURATION_SECONDS: i64 = 7 * 24 * 60 * 60;
}

/// Dispatch priorities of execution actions, higher runs first
pub mod priority {
    pub const STOP: u8 = 4;
    pub const MIGRATE: u8 = 3;
    pub const START: u8 = 2;
    pub const UPDATE: u8 = 1;
    pub const DEFAULT: u8 = 0;
}
