//! Event Delivery Abstractions
//!
//! A transport receives finished batches of event records from a backend and
//! is responsible for moving them off the device (or onto disk). Records are
//! plain JSON values; the transport does not interpret them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Records queued by one instance, delivered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub app_id: String,
    pub server_url: String,
    pub records: Vec<Value>,
}

impl EventBatch {
    pub fn new(app_id: impl Into<String>, server_url: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            app_id: app_id.into(),
            server_url: server_url.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Delivery target for event batches.
///
/// Returning an error tells the backend to keep the records queued and retry
/// on the next flush.
pub trait EventTransport: Send + Sync {
    fn deliver(&self, batch: &EventBatch) -> Result<()>;
}
