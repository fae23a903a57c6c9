//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the analytics façade and the
//! platform-specific backends. The façade never talks to a vendor SDK
//! directly: it serializes payloads to JSON text and hands them to an
//! [`AnalyticsBackend`](analytics::AnalyticsBackend) chosen at startup.
//!
//! ## Traits
//!
//! - [`AnalyticsBackend`](analytics::AnalyticsBackend) - Event tracking, user
//!   properties, identity and reporting control for one platform
//! - [`AutoTrackListener`](autotrack::AutoTrackListener) - Hook into
//!   automatically collected lifecycle events
//! - [`EventTransport`](transport::EventTransport) - Delivery of queued event
//!   batches
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | host-provided       | 📋 Injected by the host |
//! | Android  | host-provided       | 📋 Injected by the host |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Capabilities a
//! platform does not offer return [`BridgeError::NotAvailable`]; calls
//! addressed to an unknown instance return [`BridgeError::InstanceNotFound`].
//! The façade absorbs both and logs a warning.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single backend can be shared
//! by every engine thread that reports analytics.

pub mod analytics;
pub mod autotrack;
pub mod error;
pub mod logging;
pub mod time;
pub mod transport;

pub use error::BridgeError;

// Re-export commonly used types
pub use analytics::{
    AnalyticsBackend, AnalyticsMode, EncryptionConfig, EventKind, InstanceConfig, TrackRequest,
    TrackStatus, UserOperation,
};
pub use autotrack::{AutoTrackEventType, AutoTrackListener};
pub use logging::{LogEntry, LogLevel, LoggerSink, StderrLogger};
pub use time::{Clock, ManualClock, SystemClock};
pub use transport::{EventBatch, EventTransport};
