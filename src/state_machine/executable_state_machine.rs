//! # Executable State Machine
//!
//! Entry points driving an executable through its lifecycle. Each entry point
//! checks the current state, runs the kind-specific device behavior, applies the
//! resulting state and stages the executable in the caller's [`UnitOfWork`].
//! Committing is left to the caller so that a multi-entity operation (such as a
//! room replacement) is published atomically.

use super::errors::{StateMachineError, StateMachineResult};
use super::states::ExecutableState;
use crate::device::{CommandSuccess, DeviceCommand, DeviceCommandService};
use crate::logging::log_executable_operation;
use crate::models::{
    Executable, ExecutableId, ExecutableKind, ExecutionReport, ReportKind, Resolution,
};
use crate::persistence::{is_unallocated, UnitOfWork};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a kind-specific hook
enum HookOutcome {
    Succeeded,
    /// Failure already recorded as a report on the executable
    Failed,
}

/// Where a connection is placed to
struct Callee {
    alias: String,
    /// Running room hosting the call, if the callee is a room
    room: Option<RunningRoom>,
}

#[derive(Debug, Clone)]
struct RunningRoom {
    resource_id: String,
    room_id: String,
    name: String,
    license_count: u32,
}

impl RunningRoom {
    /// Resolve a running room executable with a device-assigned room id; a
    /// room whose delete failed is not a target anymore
    fn of(room: &Executable) -> Option<Self> {
        match (&room.kind, &room.device_id) {
            (
                ExecutableKind::Room {
                    resource_id,
                    name,
                    license_count,
                },
                Some(room_id),
            ) if room.state().can_update() => Some(Self {
                resource_id: resource_id.clone(),
                room_id: room_id.clone(),
                name: name.clone(),
                license_count: *license_count,
            }),
            _ => None,
        }
    }

    fn modify(&self, license_count: u32) -> DeviceCommand {
        DeviceCommand::ModifyRoom {
            resource_id: self.resource_id.clone(),
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            license_count,
        }
    }
}

/// Lifecycle driver for executables, bound to a device command service
pub struct ExecutableStateMachine<'a> {
    device: &'a dyn DeviceCommandService,
    room_settle: Duration,
}

impl<'a> ExecutableStateMachine<'a> {
    pub fn new(device: &'a dyn DeviceCommandService, room_settle: Duration) -> Self {
        Self {
            device,
            room_settle,
        }
    }

    /// Start an executable from `NotStarted` (or `StartingFailed` on retry).
    ///
    /// Results in `Started`, `StartingFailed`, `Skipped` or `PartiallyStarted`.
    pub async fn start(
        &self,
        executable: &mut Executable,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ExecutableState> {
        let current = executable.state();
        if !current.can_start() {
            return Err(StateMachineError::illegal_state(
                executable.id,
                current,
                "start",
            ));
        }

        let state = match executable.kind.clone() {
            ExecutableKind::Compartment => {
                let mut child_states = Vec::with_capacity(executable.children.len());
                for child in &executable.children {
                    child_states.push(session.executable(*child).await?.state());
                }
                ExecutableState::aggregate(child_states)
            }
            kind => match self.start_kind(executable, &kind, session).await? {
                HookOutcome::Succeeded => ExecutableState::Started,
                HookOutcome::Failed => ExecutableState::StartingFailed,
            },
        };

        executable.set_state(state);
        session.save_executable(executable).await?;
        log_executable_operation("start", executable.id, executable.kind.type_name(), state, None);
        Ok(state)
    }

    /// Stop a running executable. Results in `Stopped` or `StoppingFailed`.
    pub async fn stop(
        &self,
        executable: &mut Executable,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ExecutableState> {
        let current = executable.state();
        if !current.is_started() {
            return Err(StateMachineError::illegal_state(
                executable.id,
                current,
                "stop",
            ));
        }

        let kind = executable.kind.clone();
        let state = match self.stop_kind(executable, &kind, session).await? {
            HookOutcome::Succeeded => ExecutableState::Stopped,
            HookOutcome::Failed => ExecutableState::StoppingFailed,
        };

        executable.set_state(state);
        session.save_executable(executable).await?;
        log_executable_operation("stop", executable.id, kind.type_name(), state, None);
        Ok(state)
    }

    /// Re-apply a modified configuration to a running executable.
    ///
    /// Returns whether the executable is up to date afterwards. The state never
    /// changes; a failure keeps the `modified` flag and attaches a report.
    pub async fn update(
        &self,
        executable: &mut Executable,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<bool> {
        let current = executable.state();
        if !current.can_update() {
            return Err(StateMachineError::illegal_state(
                executable.id,
                current,
                "update",
            ));
        }
        if !executable.is_modified() {
            debug!(executable_id = %executable.id, "Executable not modified, nothing to update");
            return Ok(true);
        }

        let kind = executable.kind.clone();
        let updated = match self.update_kind(executable, &kind, session).await? {
            HookOutcome::Succeeded => {
                executable.clear_modified();
                true
            }
            HookOutcome::Failed => false,
        };

        session.save_executable(executable).await?;
        log_executable_operation(
            "update",
            executable.id,
            kind.type_name(),
            current,
            Some(if updated { "applied" } else { "failed" }),
        );
        Ok(updated)
    }

    /// Hand a running room over to its successor on the same device.
    ///
    /// The device room is re-targeted with the successor's configuration
    /// instead of being deleted and created again. On success the target is
    /// `Started` and the source `Stopped`; on failure the target is
    /// `StartingFailed` and the source keeps running.
    pub async fn replace_room(
        &self,
        source: &mut Executable,
        target: &mut Executable,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ExecutableState> {
        if !target.state().can_start() {
            return Err(StateMachineError::illegal_state(
                target.id,
                target.state(),
                "start",
            ));
        }
        if !source.state().is_started() {
            return Err(StateMachineError::illegal_state(
                source.id,
                source.state(),
                "stop",
            ));
        }

        let command = match (&target.kind, &source.device_id) {
            (
                ExecutableKind::Room {
                    resource_id,
                    name,
                    license_count,
                },
                Some(room_id),
            ) => Some(DeviceCommand::ModifyRoom {
                resource_id: resource_id.clone(),
                room_id: room_id.clone(),
                name: name.clone(),
                license_count: *license_count,
            }),
            _ => None,
        };
        let Some(command) = command else {
            target.add_report(ExecutionReport::new(
                ReportKind::ExecutableNotStarted {
                    executable: source.id,
                },
                Resolution::TryAgain,
            ));
            return self.fail_replacement(target, session).await;
        };

        match self.send(target, command).await {
            Some(_) => {
                target.device_id = source.device_id.take();
                target.set_state(ExecutableState::Started);
                source.set_state(ExecutableState::Stopped);
                session.save_executable(source).await?;
                session.save_executable(target).await?;
                log_executable_operation(
                    "replace",
                    target.id,
                    target.kind.type_name(),
                    ExecutableState::Started,
                    Some("took over running room"),
                );
                Ok(ExecutableState::Started)
            }
            None => self.fail_replacement(target, session).await,
        }
    }

    async fn fail_replacement(
        &self,
        target: &mut Executable,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<ExecutableState> {
        target.set_state(ExecutableState::StartingFailed);
        session.save_executable(target).await?;
        log_executable_operation(
            "replace",
            target.id,
            target.kind.type_name(),
            ExecutableState::StartingFailed,
            None,
        );
        Ok(ExecutableState::StartingFailed)
    }

    async fn start_kind(
        &self,
        executable: &mut Executable,
        kind: &ExecutableKind,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<HookOutcome> {
        let outcome: HookOutcome = match kind {
            ExecutableKind::Room {
                resource_id,
                name,
                license_count,
            } => {
                let command = DeviceCommand::CreateRoom {
                    resource_id: resource_id.clone(),
                    name: name.clone(),
                    license_count: *license_count,
                };
                match self.send(executable, command).await {
                    Some(success) => {
                        executable.device_id = success.device_id;
                        if !self.room_settle.is_zero() {
                            tokio::time::sleep(self.room_settle).await;
                        }
                        HookOutcome::Succeeded
                    }
                    None => HookOutcome::Failed,
                }
            }
            ExecutableKind::UsedRoom {
                room,
                license_count,
            } => match self.running_room(*room, session).await? {
                Some(running) => {
                    let command = running.modify(running.license_count + license_count);
                    self.send(executable, command).await.into()
                }
                None => {
                    executable.add_report(ExecutionReport::new(
                        ReportKind::UsedRoomNotStarted { room: *room },
                        Resolution::TryAgain,
                    ));
                    HookOutcome::Failed
                }
            },
            ExecutableKind::Endpoint { .. } => HookOutcome::Succeeded,
            ExecutableKind::Connection { from, to } => {
                self.dial(executable, *from, *to, session).await?
            }
            ExecutableKind::Compartment => HookOutcome::Succeeded,
        };
        Ok(outcome)
    }

    async fn stop_kind(
        &self,
        executable: &mut Executable,
        kind: &ExecutableKind,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<HookOutcome> {
        let outcome: HookOutcome = match kind {
            ExecutableKind::Room { resource_id, .. } => match executable.device_id.clone() {
                Some(room_id) => {
                    let command = DeviceCommand::DeleteRoom {
                        resource_id: resource_id.clone(),
                        room_id,
                    };
                    let outcome = HookOutcome::from(self.send(executable, command).await);
                    if matches!(outcome, HookOutcome::Succeeded) {
                        executable.device_id = None;
                    }
                    outcome
                }
                None => HookOutcome::Succeeded,
            },
            ExecutableKind::UsedRoom { room, .. } => {
                match self.running_room(*room, session).await? {
                    Some(running) => {
                        let command = running.modify(running.license_count);
                        self.send(executable, command).await.into()
                    }
                    None => HookOutcome::Succeeded,
                }
            }
            ExecutableKind::Endpoint { .. } | ExecutableKind::Compartment => {
                HookOutcome::Succeeded
            }
            ExecutableKind::Connection { from, to } => {
                self.hang_up(executable, *from, *to, session).await?
            }
        };
        Ok(outcome)
    }

    async fn update_kind(
        &self,
        executable: &mut Executable,
        kind: &ExecutableKind,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<HookOutcome> {
        let outcome: HookOutcome = match kind {
            ExecutableKind::Room {
                resource_id,
                name,
                license_count,
            } => match executable.device_id.clone() {
                Some(room_id) => {
                    let command = DeviceCommand::ModifyRoom {
                        resource_id: resource_id.clone(),
                        room_id,
                        name: name.clone(),
                        license_count: *license_count,
                    };
                    self.send(executable, command).await.into()
                }
                None => {
                    executable.add_report(ExecutionReport::new(
                        ReportKind::ExecutableNotStarted {
                            executable: executable.id,
                        },
                        Resolution::TryAgain,
                    ));
                    HookOutcome::Failed
                }
            },
            ExecutableKind::UsedRoom {
                room,
                license_count,
            } => match self.running_room(*room, session).await? {
                Some(running) => {
                    let command = running.modify(running.license_count + license_count);
                    self.send(executable, command).await.into()
                }
                None => {
                    executable.add_report(ExecutionReport::new(
                        ReportKind::UsedRoomNotStarted { room: *room },
                        Resolution::TryAgain,
                    ));
                    HookOutcome::Failed
                }
            },
            ExecutableKind::Endpoint { .. }
            | ExecutableKind::Connection { .. }
            | ExecutableKind::Compartment => HookOutcome::Succeeded,
        };
        Ok(outcome)
    }

    async fn dial(
        &self,
        executable: &mut Executable,
        from: ExecutableId,
        to: ExecutableId,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<HookOutcome> {
        let caller = session.executable(from).await?;
        let resource_id = match &caller.kind {
            ExecutableKind::Endpoint { resource_id, .. } => resource_id.clone(),
            _ => {
                executable.add_report(ExecutionReport::new(
                    ReportKind::ExecutableNotStarted { executable: from },
                    Resolution::StopTrying,
                ));
                return Ok(HookOutcome::Failed);
            }
        };

        let callee = match self.callee(to, session).await? {
            Some(callee) => callee,
            None => {
                executable.add_report(ExecutionReport::new(
                    ReportKind::ExecutableNotStarted { executable: to },
                    Resolution::TryAgain,
                ));
                return Ok(HookOutcome::Failed);
            }
        };

        let command = DeviceCommand::Dial {
            resource_id,
            alias: callee.alias,
        };
        match self.send(executable, command).await {
            Some(success) => {
                executable.device_id = success.device_id;
                Ok(HookOutcome::Succeeded)
            }
            None => Ok(HookOutcome::Failed),
        }
    }

    async fn hang_up(
        &self,
        executable: &mut Executable,
        from: ExecutableId,
        to: ExecutableId,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<HookOutcome> {
        let Some(call_id) = executable.device_id.clone() else {
            return Ok(HookOutcome::Succeeded);
        };

        let callee_is_room = matches!(
            session.executable(to).await?.kind,
            ExecutableKind::Room { .. } | ExecutableKind::UsedRoom { .. }
        );
        let command = if callee_is_room {
            match self.callee(to, session).await?.and_then(|callee| callee.room) {
                Some(room) => DeviceCommand::DisconnectParticipant {
                    resource_id: room.resource_id,
                    room_id: room.room_id,
                    participant_id: call_id,
                },
                None => {
                    debug!(executable_id = %executable.id, "Callee room no longer running, call already ended");
                    executable.device_id = None;
                    return Ok(HookOutcome::Succeeded);
                }
            }
        } else {
            let caller = session.executable(from).await?;
            match caller.kind {
                ExecutableKind::Endpoint { resource_id, .. } => DeviceCommand::HangUp {
                    resource_id,
                    call_id,
                },
                _ => {
                    executable.device_id = None;
                    return Ok(HookOutcome::Succeeded);
                }
            }
        };

        let outcome = HookOutcome::from(self.send(executable, command).await);
        if matches!(outcome, HookOutcome::Succeeded) {
            executable.device_id = None;
        }
        Ok(outcome)
    }

    /// Resolve the alias to dial for a connection target, `None` if the
    /// target room is not running
    async fn callee(
        &self,
        to: ExecutableId,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<Option<Callee>> {
        let target = session.executable(to).await?;
        let room = match &target.kind {
            ExecutableKind::Endpoint { alias, .. } => {
                return Ok(Some(Callee {
                    alias: alias.clone(),
                    room: None,
                }))
            }
            ExecutableKind::Room { .. } => RunningRoom::of(&target),
            ExecutableKind::UsedRoom { room, .. } => self.running_room(*room, session).await?,
            ExecutableKind::Connection { .. } | ExecutableKind::Compartment => None,
        };
        Ok(room.map(|room| Callee {
            alias: room.room_id.clone(),
            room: Some(room),
        }))
    }

    async fn running_room(
        &self,
        room: ExecutableId,
        session: &mut dyn UnitOfWork,
    ) -> StateMachineResult<Option<RunningRoom>> {
        Ok(RunningRoom::of(&session.executable(room).await?))
    }

    /// Send a command; a failure is attached to the executable as a report
    async fn send(
        &self,
        executable: &mut Executable,
        command: DeviceCommand,
    ) -> Option<CommandSuccess> {
        let name = command.name();
        debug!(
            executable_id = %executable.id,
            command = name,
            resource_id = command.resource_id(),
            "Sending device command"
        );
        match self.device.send(command).await {
            Ok(success) => Some(success),
            Err(failure) => {
                warn!(
                    executable_id = %executable.id,
                    command = name,
                    reason = %failure.reason,
                    resolution = ?failure.resolution,
                    "Device command failed"
                );
                executable.add_report(ExecutionReport::command_failed(
                    name,
                    failure.reason,
                    failure.resolution,
                ));
                None
            }
        }
    }
}

impl From<Option<CommandSuccess>> for HookOutcome {
    fn from(result: Option<CommandSuccess>) -> Self {
        match result {
            Some(_) => Self::Succeeded,
            None => Self::Failed,
        }
    }
}

/// Set an executable to `NotStarted` and cascade the state to every child
/// (recursively) that is still unallocated.
///
/// This is the hand-over point from the booking process: once allocated, an
/// executable becomes eligible for execution when its slot approaches.
pub async fn mark_not_started(
    session: &mut dyn UnitOfWork,
    id: ExecutableId,
) -> StateMachineResult<()> {
    let mut pending = vec![(id, true)];
    let mut visited = HashSet::new();

    while let Some((current, is_root)) = pending.pop() {
        if !visited.insert(current) {
            continue;
        }
        let mut executable = session.executable(current).await?;
        if !is_root && !is_unallocated(executable.state()) {
            continue;
        }
        executable.set_state(ExecutableState::NotStarted);
        pending.extend(executable.children.iter().map(|child| (*child, false)));
        session.save_executable(&executable).await?;
    }
    Ok(())
}
