//! Environment-driven configuration feeding a real logging system

use nexlog_core::{ConfigError, Level, LoggingConfig, LoggingSystem, SinkKind};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use tests::logging::TestLogDir;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn test_env_configures_directory_and_rotation() {
    let dir = TestLogDir::new();
    let log_dir = dir.path().join("service-logs");
    let log_dir_str = log_dir.to_str().unwrap();
    let config = LoggingConfig::from_env_map(&env(&[
        ("LOG_DIR", log_dir_str),
        ("LOG_LEVEL", "warn"),
        ("LOG_MAX_FILE_SIZE_BYTES", "2048"),
        ("LOG_MAX_BACKUP_COUNT", "3"),
        ("LOG_ROTATION_INTERVAL_HOURS", "6"),
        ("LOG_BUFFERED", "false"),
        ("LOG_CONSOLE", "false"),
    ]))
    .unwrap();

    assert_eq!(config.level, Level::Warning);
    assert_eq!(config.rotation.size.max_bytes, 2048);
    assert_eq!(config.rotation.size.backup_count, 3);
    assert_eq!(config.rotation.time.interval_hours, 6);
    assert_eq!(config.app_log_path(), log_dir.join("app.log"));

    let system = LoggingSystem::builder(config).build().unwrap();
    let kinds: Vec<SinkKind> = system.sinks().iter().map(|s| s.kind()).collect();
    assert_eq!(
        kinds,
        vec![SinkKind::SizeRotating, SinkKind::TimeRotating, SinkKind::ErrorFile]
    );

    system.get_logger("app").info("below the configured level");
    system.get_logger("app").warning("written");
    system.shutdown();

    let records = tests::logging::read_records(&log_dir.join("app.log"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "written");
}

#[test]
fn test_invalid_values_name_the_variable() {
    let err = LoggingConfig::from_env_map(&env(&[("LOG_MAX_BACKUP_COUNT", "many")])).unwrap_err();
    let ConfigError::InvalidValue { var, value, .. } = &err;
    assert_eq!(*var, "LOG_MAX_BACKUP_COUNT");
    assert_eq!(value, "many");
    assert!(err.to_string().contains("LOG_MAX_BACKUP_COUNT"));

    assert!(LoggingConfig::from_env_map(&env(&[("LOG_ROTATION_INTERVAL_HOURS", "0")])).is_err());
    assert!(LoggingConfig::from_env_map(&env(&[("ENV", "staging")])).is_err());
}

#[test]
fn test_disabling_files_leaves_console_only() {
    let config = LoggingConfig::from_env_map(&env(&[("LOG_FILES", "false")])).unwrap();
    let system = LoggingSystem::builder(config)
        .console_writer(tests::CaptureWriter::new())
        .build()
        .unwrap();
    let kinds: Vec<SinkKind> = system.sinks().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec![SinkKind::Console]);
}
