use async_trait::async_trait;
use confctl_core::device::{
    CommandFailure, CommandResult, CommandSuccess, DeviceCommand, DeviceCommandService,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Device double recording every command it receives.
///
/// Succeeds by default with a fresh device id per command; failures can be
/// scripted per command name and are consumed in order.
#[derive(Debug, Default)]
pub struct MockDeviceService {
    commands: Mutex<Vec<DeviceCommand>>,
    failures: Mutex<HashMap<&'static str, VecDeque<CommandFailure>>>,
    next_id: AtomicU64,
}

impl MockDeviceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next command with this name
    pub fn fail_next(&self, command: &'static str, failure: CommandFailure) {
        self.failures
            .lock()
            .entry(command)
            .or_default()
            .push_back(failure);
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.lock().iter().map(DeviceCommand::name).collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|sent| sent.name() == command)
            .count()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

#[async_trait]
impl DeviceCommandService for MockDeviceService {
    async fn send(&self, command: DeviceCommand) -> CommandResult {
        let name = command.name();
        self.commands.lock().push(command);

        if let Some(failure) = self
            .failures
            .lock()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
        {
            return Err(failure);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommandSuccess::with_device_id(format!("{name}-{id}")))
    }
}
