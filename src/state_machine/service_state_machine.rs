//! # Service State Machine
//!
//! Activation lifecycle of recordings and streams attached to a running
//! executable.

use super::errors::{StateMachineError, StateMachineResult};
use super::states::ServiceState;
use crate::device::{DeviceCommand, DeviceCommandService};
use crate::models::{
    ExecutableKind, ExecutableService, ExecutionReport, ReportKind, Resolution, ServiceKind,
};
use crate::persistence::UnitOfWork;
use tracing::{info, warn};

pub struct ServiceStateMachine<'a> {
    device: &'a dyn DeviceCommandService,
}

impl<'a> ServiceStateMachine<'a> {
    pub fn new(device: &'a dyn DeviceCommandService) -> Self {
        Self { device }
    }

    /// Activate a service on the room its executable runs in.
    ///
    /// Results in `Active` or `ActivationFailed`.
    pub async fn activate(
        &self,
        service: &mut ExecutableService,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ServiceState> {
        let current = service.state();
        if !current.can_activate() {
            return Err(StateMachineError::IllegalServiceState {
                service: service.id,
                state: current,
                operation: "activate",
            });
        }

        let executable = session.executable(service.executable).await?;
        let room = match (&executable.kind, &executable.device_id) {
            (ExecutableKind::Room { resource_id, .. }, Some(room_id))
                if executable.state().is_started() =>
            {
                Some((resource_id.clone(), room_id.clone()))
            }
            _ => None,
        };

        let state = match room {
            Some((resource_id, room_id)) => {
                let command = match &service.kind {
                    ServiceKind::Recording => DeviceCommand::StartRecording {
                        resource_id,
                        room_id,
                    },
                    ServiceKind::Streaming { url } => DeviceCommand::StartStreaming {
                        resource_id,
                        room_id,
                        url: url.clone(),
                    },
                };
                match self.send(service, command).await {
                    Some(device_id) => {
                        service.device_id = device_id;
                        ServiceState::Active
                    }
                    None => ServiceState::ActivationFailed,
                }
            }
            None => {
                service.add_report(ExecutionReport::new(
                    ReportKind::ExecutableNotStarted {
                        executable: service.executable,
                    },
                    Resolution::TryAgain,
                ));
                ServiceState::ActivationFailed
            }
        };

        service.set_state(state);
        session.save_service(service).await?;
        info!(service_id = %service.id, state = %state, "Service activation finished");
        Ok(state)
    }

    /// Deactivate a running service. Results in `NotActive` or
    /// `DeactivationFailed`.
    pub async fn deactivate(
        &self,
        service: &mut ExecutableService,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ServiceState> {
        let current = service.state();
        if !current.can_deactivate() {
            return Err(StateMachineError::IllegalServiceState {
                service: service.id,
                state: current,
                operation: "deactivate",
            });
        }

        let executable = session.executable(service.executable).await?;
        let state = match (executable.resource_id(), service.device_id.clone()) {
            (Some(resource_id), Some(device_id)) => {
                let resource_id = resource_id.to_string();
                let command = match service.kind {
                    ServiceKind::Recording => DeviceCommand::StopRecording {
                        resource_id,
                        recording_id: device_id,
                    },
                    ServiceKind::Streaming { .. } => DeviceCommand::StopStreaming {
                        resource_id,
                        stream_id: device_id,
                    },
                };
                match self.send(service, command).await {
                    Some(_) => {
                        service.device_id = None;
                        ServiceState::NotActive
                    }
                    None => ServiceState::DeactivationFailed,
                }
            }
            // Nothing left running on the device
            _ => {
                service.device_id = None;
                ServiceState::NotActive
            }
        };

        service.set_state(state);
        session.save_service(service).await?;
        info!(service_id = %service.id, state = %state, "Service deactivation finished");
        Ok(state)
    }

    /// Send a command, returning the device-assigned id on success
    async fn send(
        &self,
        service: &mut ExecutableService,
        command: DeviceCommand,
    ) -> Option<Option<String>> {
        let name = command.name();
        match self.device.send(command).await {
            Ok(success) => Some(success.device_id),
            Err(failure) => {
                warn!(
                    service_id = %service.id,
                    command = name,
                    reason = %failure.reason,
                    "Device command failed"
                );
                service.add_report(ExecutionReport::command_failed(
                    name,
                    failure.reason,
                    failure.resolution,
                ));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CommandFailure, CommandResult, CommandSuccess};
    use crate::models::{Executable, ExecutableId, ServiceId, TimeSlot};
    use crate::persistence::{ExecutableRepository, InMemoryRepository};
    use crate::state_machine::states::ExecutableState;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    struct StubDevice {
        fail: bool,
    }

    #[async_trait]
    impl DeviceCommandService for StubDevice {
        async fn send(&self, _command: DeviceCommand) -> CommandResult {
            if self.fail {
                Err(CommandFailure::try_again("recorder offline"))
            } else {
                Ok(CommandSuccess::with_device_id("rec-1"))
            }
        }
    }

    fn slot() -> TimeSlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        TimeSlot::new(start, start + Duration::hours(1))
    }

    fn repository(room_state: ExecutableState) -> InMemoryRepository {
        let repository = InMemoryRepository::new();
        repository.insert_executable(
            Executable::new(
                ExecutableId(1),
                ExecutableKind::Room {
                    resource_id: "mcu-1".to_string(),
                    name: "standup".to_string(),
                    license_count: 4,
                },
                slot(),
            )
            .with_device_id("r-1")
            .with_persisted_state(room_state),
        );
        repository
    }

    fn recording() -> ExecutableService {
        ExecutableService::new(ServiceId(7), ExecutableId(1), ServiceKind::Recording, slot())
    }

    #[tokio::test]
    async fn test_activation_stores_device_id() {
        let repository = repository(ExecutableState::Started);
        let device = StubDevice { fail: false };
        let machine = ServiceStateMachine::new(&device);
        let mut service = recording();

        let mut session = repository.begin().await.unwrap();
        let state = machine.activate(&mut service, session.as_mut()).await.unwrap();

        assert_eq!(state, ServiceState::Active);
        assert_eq!(service.device_id.as_deref(), Some("rec-1"));
    }

    #[tokio::test]
    async fn test_activation_waits_for_running_room() {
        let repository = repository(ExecutableState::NotStarted);
        let device = StubDevice { fail: false };
        let machine = ServiceStateMachine::new(&device);
        let mut service = recording();

        let mut session = repository.begin().await.unwrap();
        let state = machine.activate(&mut service, session.as_mut()).await.unwrap();

        assert_eq!(state, ServiceState::ActivationFailed);
        assert!(service.latest_report().unwrap().is_retryable());
    }

    #[tokio::test]
    async fn test_failed_deactivation() {
        let repository = repository(ExecutableState::Started);
        let device = StubDevice { fail: true };
        let machine = ServiceStateMachine::new(&device);
        let mut service = recording().with_persisted_state(ServiceState::Active);
        service.device_id = Some("rec-1".to_string());

        let mut session = repository.begin().await.unwrap();
        let state = machine
            .deactivate(&mut service, session.as_mut())
            .await
            .unwrap();

        assert_eq!(state, ServiceState::DeactivationFailed);
        assert_eq!(service.reports.len(), 1);
    }
}
