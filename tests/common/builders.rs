use super::MockDeviceService;
use chrono::{DateTime, Duration, TimeZone, Utc};
use confctl_core::config::ExecutorConfig;
use confctl_core::models::{
    Executable, ExecutableId, ExecutableKind, ExecutableService, ServiceId, ServiceKind, TimeSlot,
};
use confctl_core::orchestration::Executor;
use confctl_core::persistence::InMemoryRepository;
use confctl_core::reporting::MemoryReporter;
use confctl_core::state_machine::{ExecutableState, ServiceState};
use std::sync::Arc;

/// Reference tick time used by the integration suites
pub fn tick() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Slot of `minutes` starting `offset_minutes` after the reference tick
pub fn slot(offset_minutes: i64, minutes: i64) -> TimeSlot {
    let start = tick() + Duration::minutes(offset_minutes);
    TimeSlot::new(start, start + Duration::minutes(minutes))
}

/// Slot currently running at the reference tick
pub fn current_slot() -> TimeSlot {
    slot(0, 60)
}

pub fn room(id: u64, resource_id: &str, name: &str, slot: TimeSlot) -> Executable {
    Executable::new(
        ExecutableId(id),
        ExecutableKind::Room {
            resource_id: resource_id.to_string(),
            name: name.to_string(),
            license_count: 5,
        },
        slot,
    )
    .with_persisted_state(ExecutableState::NotStarted)
}

pub fn endpoint(id: u64, resource_id: &str, alias: &str, slot: TimeSlot) -> Executable {
    Executable::new(
        ExecutableId(id),
        ExecutableKind::Endpoint {
            resource_id: resource_id.to_string(),
            alias: alias.to_string(),
        },
        slot,
    )
    .with_persisted_state(ExecutableState::NotStarted)
}

pub fn connection(id: u64, from: u64, to: u64, slot: TimeSlot) -> Executable {
    Executable::new(
        ExecutableId(id),
        ExecutableKind::Connection {
            from: ExecutableId(from),
            to: ExecutableId(to),
        },
        slot,
    )
    .with_persisted_state(ExecutableState::NotStarted)
}

pub fn compartment(id: u64, children: &[u64], slot: TimeSlot) -> Executable {
    Executable::new(ExecutableId(id), ExecutableKind::Compartment, slot)
        .with_children(children.iter().map(|child| ExecutableId(*child)))
        .with_persisted_state(ExecutableState::NotStarted)
}

pub fn recording(id: u64, executable: u64, slot: TimeSlot) -> ExecutableService {
    ExecutableService::new(
        ServiceId(id),
        ExecutableId(executable),
        ServiceKind::Recording,
        slot,
    )
    .with_persisted_state(ServiceState::NotActive)
}

/// Executor configuration without settle delays
pub fn test_config() -> ExecutorConfig {
    ExecutorConfig {
        enabled: true,
        period_ms: 50,
        room_settle_ms: 0,
        retry_delay_seconds: 60,
        max_attempt_count: 3,
        ..ExecutorConfig::default()
    }
}

/// Executor wired to in-memory collaborators
pub struct Harness {
    pub repository: InMemoryRepository,
    pub device: Arc<MockDeviceService>,
    pub reporter: Arc<MemoryReporter>,
    pub executor: Arc<Executor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let repository = InMemoryRepository::new();
        let device = Arc::new(MockDeviceService::new());
        let reporter = Arc::new(MemoryReporter::new());
        let executor = Arc::new(Executor::new(
            config,
            Arc::new(repository.clone()),
            device.clone(),
            reporter.clone(),
        )
        .expect("test configuration is valid"));
        Self {
            repository,
            device,
            reporter,
            executor,
        }
    }

    pub fn insert(&self, executables: impl IntoIterator<Item = Executable>) {
        for executable in executables {
            self.repository.insert_executable(executable);
        }
    }

    pub fn executable(&self, id: u64) -> Executable {
        self.repository
            .executable(ExecutableId(id))
            .expect("executable should exist")
    }

    pub fn state(&self, id: u64) -> ExecutableState {
        self.executable(id).state()
    }

    pub fn service_state(&self, id: u64) -> ServiceState {
        self.repository
            .service(ServiceId(id))
            .expect("service should exist")
            .state()
    }
}
