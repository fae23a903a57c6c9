//! Event transports for desktop hosts

use bridge_traits::{
    error::{BridgeError, Result},
    transport::{EventBatch, EventTransport},
};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::identity::file_stem_for;

/// Appends every record as one JSON line to `<dir>/<app_id>.jsonl`.
///
/// Useful for offline builds, dedicated servers and for shipping the files
/// with an external uploader.
pub struct JsonLinesTransport {
    dir: PathBuf,
}

impl JsonLinesTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Transport writing under `<data dir>/events`.
    pub fn in_data_dir() -> Self {
        Self::new(crate::default_data_dir().join("events"))
    }

    pub fn path_for(&self, app_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", file_stem_for(app_id)))
    }
}

impl EventTransport for JsonLinesTransport {
    fn deliver(&self, batch: &EventBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&batch.app_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        for record in &batch.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!(path = ?path, records = batch.len(), "Appended event batch");
        Ok(())
    }
}

/// Keeps delivered batches in memory.
///
/// Intended for tests and tools that inspect what a backend would have sent.
#[derive(Default)]
pub struct MemoryTransport {
    batches: Mutex<Vec<EventBatch>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<EventBatch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All delivered records, in delivery order.
    pub fn records(&self) -> Vec<Value> {
        self.batches()
            .into_iter()
            .flat_map(|batch| batch.records)
            .collect()
    }

    pub fn clear(&self) {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventTransport for MemoryTransport {
    fn deliver(&self, batch: &EventBatch) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(
                "memory transport set to fail".to_string(),
            ));
        }

        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(())
    }
}
