//! # Desktop Bridge Implementations
//!
//! Default analytics backend for desktop platforms (Windows, macOS, Linux).
//!
//! ## Overview
//!
//! - [`DesktopBackend`] implements `AnalyticsBackend` in-process: instance
//!   table, identity, super properties, timed events, track status and a
//!   per-instance record queue
//! - [`JsonLinesTransport`] appends delivered batches to JSON-lines files
//! - [`MemoryTransport`] keeps delivered batches in memory for tests
//!
//! Identity (device id, distinct id, account id) is persisted as JSON under
//! the configured data directory.
//!
//! Auto-track, NTP calibration and third-party sharing are mobile
//! capabilities and report `NotAvailable` here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopBackend, JsonLinesTransport};
//! use std::sync::Arc;
//!
//! let backend = DesktopBackend::builder()
//!     .transport(Arc::new(JsonLinesTransport::new("/tmp/analytics")))
//!     .data_dir("/tmp/analytics/identity")
//!     .build()?;
//! ```

mod backend;
mod identity;
mod instance;
mod transport;

pub use backend::{DesktopBackend, DesktopBackendBuilder, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_LIMIT};
pub use transport::{JsonLinesTransport, MemoryTransport};

use std::path::PathBuf;

/// Per-user directory holding identity documents and event files.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("analytics-bridge")
}
