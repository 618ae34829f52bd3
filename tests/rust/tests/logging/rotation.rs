//! File sinks: size rotation, time rotation and the ERROR-only file

use chrono::{Duration, TimeZone, Utc};
use nexlog_core::{Extras, LoggingConfig, LoggingSystem, APP_LOG_FILE, ERROR_LOG_FILE, TIMED_LOG_FILE};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tests::logging::TestLogDir;
use tests::ManualClock;

fn size_limited(dir: &TestLogDir, max_bytes: u64, backup_count: usize) -> LoggingConfig {
    let mut config = dir.config();
    config.rotation.size.max_bytes = max_bytes;
    config.rotation.size.backup_count = backup_count;
    config
}

fn seqs(records: &[Value]) -> Vec<u64> {
    records.iter().map(|r| r["seq"].as_u64().unwrap()).collect()
}

#[test]
fn test_one_kilobyte_limit_keeps_two_backups() {
    let dir = TestLogDir::new();
    let system = LoggingSystem::builder(size_limited(&dir, 1024, 2)).build().unwrap();
    let logger = system.get_logger("app.volume");

    for seq in 0..200u64 {
        logger.info_with("filling the log", Extras::new().with("seq", seq));
    }
    system.shutdown();

    assert!(dir.exists("app.log"));
    assert!(dir.exists("app.log.1"));
    assert!(dir.exists("app.log.2"));
    assert!(!dir.exists("app.log.3"));

    for name in ["app.log", "app.log.1", "app.log.2"] {
        let size = std::fs::metadata(dir.path().join(name)).unwrap().len();
        assert!(size <= 1024, "{name} is {size} bytes");
    }

    // Oldest to newest, the retained records are the tail of what was written
    let mut retained = Vec::new();
    for name in ["app.log.2", "app.log.1", "app.log"] {
        retained.extend(seqs(&dir.records(name)));
    }
    assert_eq!(retained.last(), Some(&199));
    let first = retained[0];
    assert_eq!(retained, (first..=199).collect::<Vec<_>>());
}

#[test]
fn test_backups_account_for_every_line_once() {
    let dir = TestLogDir::new();
    let system = LoggingSystem::builder(size_limited(&dir, 700, 100)).build().unwrap();
    let logger = system.get_logger("app.volume");

    for seq in 0..60u64 {
        logger.info_with("line", Extras::new().with("seq", seq));
    }
    system.shutdown();

    let mut backups = 0;
    while dir.exists(&format!("{APP_LOG_FILE}.{}", backups + 1)) {
        backups += 1;
    }
    assert!(backups > 1);

    let mut all = Vec::new();
    for n in (1..=backups).rev() {
        all.extend(seqs(&dir.records(&format!("{APP_LOG_FILE}.{n}"))));
    }
    all.extend(seqs(&dir.records(APP_LOG_FILE)));
    assert_eq!(all, (0..60).collect::<Vec<_>>());
}

#[test]
fn test_error_file_only_holds_errors() {
    let dir = TestLogDir::new();
    let system = LoggingSystem::builder(dir.config()).build().unwrap();
    let logger = system.get_logger("app.jobs");

    logger.debug("d");
    logger.info("i");
    logger.warning("w");
    logger.error("e");
    logger.critical("c");
    system.shutdown();

    let levels = |name: &str| -> Vec<String> {
        dir.records(name)
            .iter()
            .map(|r| r["level"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(levels(ERROR_LOG_FILE), vec!["ERROR", "CRITICAL"]);
    assert_eq!(levels(APP_LOG_FILE), vec!["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]);
    assert_eq!(levels(TIMED_LOG_FILE), levels(APP_LOG_FILE));
}

#[test]
fn test_timed_file_rotates_per_interval() {
    let dir = TestLogDir::new();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 10, 0).unwrap()));

    let mut config = dir.config();
    config.rotation.time.interval_hours = 1;
    config.rotation.time.backup_count = 2;
    let system = LoggingSystem::builder(config).clock(clock.clone()).build().unwrap();
    let logger = system.get_logger("app.timed");

    for hour in 0..4 {
        logger.info_with("tick", Extras::new().with("hour", hour));
        clock.advance(Duration::hours(1));
    }
    logger.info_with("tick", Extras::new().with("hour", 4));
    system.shutdown();

    // Two intervals retained, named by their UTC start
    assert!(!dir.exists("app_timed.log.2026-03-01_00-00-00"));
    assert!(!dir.exists("app_timed.log.2026-03-01_01-00-00"));
    assert_eq!(dir.records("app_timed.log.2026-03-01_02-00-00")[0]["hour"], 2);
    assert_eq!(dir.records("app_timed.log.2026-03-01_03-00-00")[0]["hour"], 3);

    let active = dir.records(TIMED_LOG_FILE);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["hour"], 4);

    // Size rotation is independent of the clock
    assert_eq!(dir.records(APP_LOG_FILE).len(), 5);
}

#[test]
fn test_unusable_log_dir_fails_at_build() {
    let dir = TestLogDir::new();
    let blocked = dir.path().join("not-a-dir");
    std::fs::write(&blocked, b"file in the way").unwrap();

    let result = LoggingSystem::builder(LoggingConfig::files_only(blocked.join("logs"))).build();
    assert!(matches!(result, Err(nexlog_core::InitError::Sink(_))));
}
