//! # Device Commands
//!
//! Boundary to the conferencing devices. The engine issues one request per
//! operation and receives either a success carrying an optional device-assigned
//! identifier (room id, call id, recording id) or a failure with a resolution
//! telling whether the operation may be retried.
//!
//! The transport itself lives outside this crate; implementations map their
//! transport errors onto [`CommandFailure`] (typically with
//! [`Resolution::TryAgain`]).

use crate::models::Resolution;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request sent to a conferencing device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    CreateRoom {
        resource_id: String,
        name: String,
        license_count: u32,
    },
    ModifyRoom {
        resource_id: String,
        room_id: String,
        name: String,
        license_count: u32,
    },
    DeleteRoom {
        resource_id: String,
        room_id: String,
    },
    Dial {
        resource_id: String,
        alias: String,
    },
    HangUp {
        resource_id: String,
        call_id: String,
    },
    DisconnectParticipant {
        resource_id: String,
        room_id: String,
        participant_id: String,
    },
    StartRecording {
        resource_id: String,
        room_id: String,
    },
    StopRecording {
        resource_id: String,
        recording_id: String,
    },
    StartStreaming {
        resource_id: String,
        room_id: String,
        url: String,
    },
    StopStreaming {
        resource_id: String,
        stream_id: String,
    },
}

impl DeviceCommand {
    /// Short command name used in reports and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::ModifyRoom { .. } => "modify-room",
            Self::DeleteRoom { .. } => "delete-room",
            Self::Dial { .. } => "dial",
            Self::HangUp { .. } => "hang-up",
            Self::DisconnectParticipant { .. } => "disconnect-participant",
            Self::StartRecording { .. } => "start-recording",
            Self::StopRecording { .. } => "stop-recording",
            Self::StartStreaming { .. } => "start-streaming",
            Self::StopStreaming { .. } => "stop-streaming",
        }
    }

    /// Device the command is addressed to
    pub fn resource_id(&self) -> &str {
        match self {
            Self::CreateRoom { resource_id, .. }
            | Self::ModifyRoom { resource_id, .. }
            | Self::DeleteRoom { resource_id, .. }
            | Self::Dial { resource_id, .. }
            | Self::HangUp { resource_id, .. }
            | Self::DisconnectParticipant { resource_id, .. }
            | Self::StartRecording { resource_id, .. }
            | Self::StopRecording { resource_id, .. }
            | Self::StartStreaming { resource_id, .. }
            | Self::StopStreaming { resource_id, .. } => resource_id,
        }
    }
}

/// Successful command outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSuccess {
    /// Identifier assigned by the device, if the command created something
    pub device_id: Option<String>,
}

impl CommandSuccess {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_device_id(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
        }
    }
}

/// Failed command outcome
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct CommandFailure {
    pub reason: String,
    pub resolution: Resolution,
}

impl CommandFailure {
    pub fn try_again(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            resolution: Resolution::TryAgain,
        }
    }

    pub fn stop_trying(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            resolution: Resolution::StopTrying,
        }
    }
}

pub type CommandResult = Result<CommandSuccess, CommandFailure>;

/// Remote command service talking to conferencing devices
#[async_trait]
pub trait DeviceCommandService: Send + Sync {
    /// Send one command and wait for its outcome
    async fn send(&self, command: DeviceCommand) -> CommandResult;
}
