//! Integration tests for logging initialization and the host sink

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl CollectingSink {
    fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

// Global subscriber can only be installed once per process, so every
// assertion that needs it lives in this one test.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_receives_events_after_init() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).unwrap();

    tracing::warn!(
        target: "core_service",
        operation = "track",
        app_id = "app1",
        "Analytics backend not available"
    );
    tracing::debug!(target: "core_service", "filtered out below info");
    tracing::info!(target: "some_dependency", "filtered out by the default warn directive");

    let mut attempts = 0;
    while sink.messages().is_empty() && attempts < 50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        attempts += 1;
    }

    assert_eq!(sink.messages(), vec!["Analytics backend not available".to_string()]);
    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries[0].fields.get("app_id"), Some(&"app1".to_string()));
    drop(entries);

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_account_ids_never_logged_in_clear() {
    assert_eq!(redact_if_sensitive("account_id", "player-42"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("app_id", "app1"), "app1");
}
