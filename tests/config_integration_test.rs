//! The shipped configuration file loads and wires a working executor.

mod common;

use common::MockDeviceService;
use confctl_core::config::{ConfigManager, ExecutorConfig, LogFormat};
use confctl_core::error::ControllerError;
use confctl_core::orchestration::Executor;
use confctl_core::persistence::InMemoryRepository;
use confctl_core::reporting::TracingReporter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/controller.toml")
}

#[test]
fn test_shipped_config_matches_defaults() {
    let manager = ConfigManager::load_from_file(shipped_config()).unwrap();
    let executor = &manager.config().executor;

    assert!(executor.enabled);
    assert_eq!(executor.period_ms, 10_000);
    assert_eq!(executor.start_offset_seconds, -30);
    assert_eq!(executor.end_offset_seconds, 30);
    assert_eq!(executor.max_attempt_count, 5);
    assert_eq!(manager.config().logging.format, LogFormat::Pretty);
    assert_eq!(manager.config_path(), Some(shipped_config().as_path()));
}

#[test]
fn test_environment_overrides_shipped_file() {
    let variables = HashMap::from([
        ("CONFCTL__EXECUTOR__PERIOD_MS".to_string(), "250".to_string()),
        ("CONFCTL__EXECUTOR__ENABLED".to_string(), "false".to_string()),
    ]);
    let path = shipped_config();
    let manager = ConfigManager::load_with_overrides(Some(path.as_path()), variables).unwrap();

    assert_eq!(manager.config().executor.period_ms, 250);
    assert!(!manager.config().executor.enabled);
}

#[test]
fn test_executor_from_shipped_config() {
    let manager = ConfigManager::load_from_file(shipped_config()).unwrap();
    let executor = Executor::from_config_manager(
        &manager,
        Arc::new(InMemoryRepository::new()),
        Arc::new(MockDeviceService::new()),
        Arc::new(TracingReporter),
    )
    .unwrap();

    assert_eq!(executor.config(), &manager.config().executor);
    let result = tokio_test::block_on(executor.execute(chrono::Utc::now())).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_executor_rejects_invalid_config() {
    let config = ExecutorConfig {
        retry_delay_seconds: i64::MAX,
        ..ExecutorConfig::default()
    };
    let result = Executor::new(
        config,
        Arc::new(InMemoryRepository::new()),
        Arc::new(MockDeviceService::new()),
        Arc::new(TracingReporter),
    );

    assert!(matches!(result, Err(ControllerError::Configuration(_))));
}
