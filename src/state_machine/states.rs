use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutableState {
    /// Created by the booking process, resources not yet allocated (also "unset")
    NotAllocated,
    /// No longer referenced, waiting for garbage collection
    ToDelete,
    /// Allocated and waiting for its slot to start
    NotStarted,
    /// Nothing had to be started (e.g. an empty compartment)
    Skipped,
    /// Running on the device
    Started,
    /// Some of the children are running and some are not
    PartiallyStarted,
    /// Start was attempted and failed
    StartingFailed,
    /// Stopped after its slot ended
    Stopped,
    /// Stop was attempted and failed
    StoppingFailed,
}

impl ExecutableState {
    /// Check if the executable occupies device resources and may be stopped
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            Self::Started | Self::PartiallyStarted | Self::StoppingFailed
        )
    }

    /// Check if `start` may be invoked from this state
    pub fn can_start(&self) -> bool {
        matches!(self, Self::NotStarted | Self::StartingFailed)
    }

    /// Check if `update` may be invoked from this state
    pub fn can_update(&self) -> bool {
        matches!(self, Self::Started | Self::PartiallyStarted)
    }

    /// Check if this is a terminal state (no further automatic transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::StoppingFailed | Self::ToDelete)
    }

    /// Check if this is a failure state that may be retried
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::StartingFailed | Self::StoppingFailed)
    }

    /// Derive the aggregate state of an executable without a device action of its
    /// own from the states of its children.
    ///
    /// Starts from `Skipped`. The first child in `Started`, `StartingFailed`,
    /// `Stopped` or `StoppingFailed` sets the aggregate to that state; any later
    /// child disagreeing with the aggregate escalates it to `PartiallyStarted`,
    /// which is absorbing. Children in other states do not contribute, except
    /// `PartiallyStarted` children which escalate immediately.
    pub fn aggregate<I>(child_states: I) -> Self
    where
        I: IntoIterator<Item = ExecutableState>,
    {
        let mut state = Self::Skipped;
        for child_state in child_states {
            match child_state {
                Self::Started | Self::StartingFailed | Self::Stopped | Self::StoppingFailed => {
                    if state == Self::Skipped {
                        state = child_state;
                    } else if state != child_state {
                        state = Self::PartiallyStarted;
                    }
                }
                Self::PartiallyStarted => state = Self::PartiallyStarted,
                _ => {}
            }
        }
        state
    }
}

impl fmt::Display for ExecutableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllocated => write!(f, "not_allocated"),
            Self::ToDelete => write!(f, "to_delete"),
            Self::NotStarted => write!(f, "not_started"),
            Self::Skipped => write!(f, "skipped"),
            Self::Started => write!(f, "started"),
            Self::PartiallyStarted => write!(f, "partially_started"),
            Self::StartingFailed => write!(f, "starting_failed"),
            Self::Stopped => write!(f, "stopped"),
            Self::StoppingFailed => write!(f, "stopping_failed"),
        }
    }
}

impl std::str::FromStr for ExecutableState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_allocated" => Ok(Self::NotAllocated),
            "to_delete" => Ok(Self::ToDelete),
            "not_started" => Ok(Self::NotStarted),
            "skipped" => Ok(Self::Skipped),
            "started" => Ok(Self::Started),
            "partially_started" => Ok(Self::PartiallyStarted),
            "starting_failed" => Ok(Self::StartingFailed),
            "stopped" => Ok(Self::Stopped),
            "stopping_failed" => Ok(Self::StoppingFailed),
            _ => Err(format!("Invalid executable state: {s}")),
        }
    }
}

/// Activation states of an executable service (recording, streaming)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Not running
    NotActive,
    /// Running on the device
    Active,
    /// Activation was attempted and failed
    ActivationFailed,
    /// Deactivation was attempted and failed
    DeactivationFailed,
}

impl ServiceState {
    /// Check if `activate` may be invoked from this state
    pub fn can_activate(&self) -> bool {
        matches!(self, Self::NotActive | Self::ActivationFailed)
    }

    /// Check if `deactivate` may be invoked from this state
    pub fn can_deactivate(&self) -> bool {
        matches!(self, Self::Active | Self::DeactivationFailed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotActive => write!(f, "not_active"),
            Self::Active => write!(f, "active"),
            Self::ActivationFailed => write!(f, "activation_failed"),
            Self::DeactivationFailed => write!(f, "deactivation_failed"),
        }
    }
}

/// Default state for new executables
impl Default for ExecutableState {
    fn default() -> Self {
        Self::NotAllocated
    }
}

/// Default state for new services
impl Default for ServiceState {
    fn default() -> Self {
        Self::NotActive
    }
}
