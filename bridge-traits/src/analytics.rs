//! Analytics Backend Abstractions
//!
//! The contract between the analytics façade and a platform backend. The
//! façade serializes every payload to JSON text before it crosses this
//! boundary; backends own delivery, batching, persistence and transport.
//!
//! Optional capabilities have default methods that report
//! [`BridgeError::NotAvailable`], so a backend only implements what its
//! platform supports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::autotrack::{AutoTrackEventType, AutoTrackListener};
use crate::error::{BridgeError, Result};

/// Reporting mode of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyticsMode {
    /// Batched delivery
    #[default]
    Normal,
    /// Every record delivered immediately and stored by the receiver
    Debug,
    /// Every record delivered immediately for validation only
    DebugOnly,
}

/// Transport encryption settings for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub public_key: String,
    pub version: i32,
    pub symmetric_algorithm: String,
    pub asymmetric_algorithm: String,
}

impl EncryptionConfig {
    pub fn new(public_key: impl Into<String>, version: i32) -> Self {
        Self {
            public_key: public_key.into(),
            version,
            symmetric_algorithm: "AES".to_string(),
            asymmetric_algorithm: "RSA".to_string(),
        }
    }

    pub fn with_algorithms(
        mut self,
        symmetric: impl Into<String>,
        asymmetric: impl Into<String>,
    ) -> Self {
        self.symmetric_algorithm = symmetric.into();
        self.asymmetric_algorithm = asymmetric.into();
        self
    }
}

/// Everything a backend needs to bring up one analytics instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub app_id: String,
    pub server_url: String,
    #[serde(default)]
    pub mode: AnalyticsMode,
    #[serde(default)]
    pub enable_log: bool,
    /// `UTC`, a fixed offset such as `+08:00`, or empty for local time
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub encryption: Option<EncryptionConfig>,
    /// Version of the SDK layer, stamped by the façade
    #[serde(default)]
    pub sdk_version: String,
}

impl InstanceConfig {
    pub fn new(app_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            server_url: server_url.into(),
            mode: AnalyticsMode::Normal,
            enable_log: false,
            time_zone: String::new(),
            encryption: None,
            sdk_version: String::new(),
        }
    }

    pub fn with_mode(mut self, mode: AnalyticsMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_log(mut self, enable: bool) -> Self {
        self.enable_log = enable;
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self
    }
}

/// Reporting state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    /// Stop collecting; queued data and identity are kept
    Pause,
    /// Stop collecting and discard queued data and identity
    Stop,
    /// Collect but never deliver
    SaveOnly,
    #[default]
    Normal,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pause => "PAUSE",
            TrackStatus::Stop => "STOP",
            TrackStatus::SaveOnly => "SAVE_ONLY",
            TrackStatus::Normal => "NORMAL",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PAUSE" => Ok(TrackStatus::Pause),
            "STOP" => Ok(TrackStatus::Stop),
            "SAVE_ONLY" => Ok(TrackStatus::SaveOnly),
            "NORMAL" => Ok(TrackStatus::Normal),
            other => Err(BridgeError::InvalidPayload(format!(
                "unknown track status '{}'",
                other
            ))),
        }
    }
}

/// Flavor of a tracked event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Plain event
    Track,
    /// Recorded at most once per check id (device id when `None`)
    First { check_id: Option<String> },
    /// Partially updates a previously sent event
    Update { event_id: String },
    /// Replaces a previously sent event
    Overwrite { event_id: String },
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Track => "track",
            EventKind::First { .. } => "track_first",
            EventKind::Update { .. } => "track_update",
            EventKind::Overwrite { .. } => "track_overwrite",
        }
    }
}

/// Event handed to a backend. Payloads are already-serialized JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    /// Instance id, normally already mapped by [`AnalyticsBackend::resolve_app_id`]
    pub app_id: String,
    pub event_name: String,
    pub kind: EventKind,
    pub properties: String,
    /// Output of the instance's dynamic property provider, empty if none
    pub dynamic_properties: String,
}

/// User-profile mutation. Payloads are JSON object text except for
/// [`UserOperation::Unset`], which carries a bare property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOperation {
    Set(String),
    SetOnce(String),
    Add(String),
    Unset(String),
    Append(String),
    UniqueAppend(String),
    Delete,
}

impl UserOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserOperation::Set(_) => "user_set",
            UserOperation::SetOnce(_) => "user_set_once",
            UserOperation::Add(_) => "user_add",
            UserOperation::Unset(_) => "user_unset",
            UserOperation::Append(_) => "user_append",
            UserOperation::UniqueAppend(_) => "user_uniq_append",
            UserOperation::Delete => "user_del",
        }
    }
}

fn not_available<T>(capability: &str) -> Result<T> {
    Err(BridgeError::NotAvailable(capability.to_string()))
}

/// Platform analytics backend.
///
/// One implementation exists per target environment and is injected into the
/// façade at startup. Every method is synchronous; a backend that needs I/O
/// must either finish it before returning or hand it to its own worker.
///
/// `app_id` arguments may be empty, meaning the backend's default instance.
/// Unknown ids must produce [`BridgeError::InstanceNotFound`].
pub trait AnalyticsBackend: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    fn initialize(&self, config: &InstanceConfig) -> Result<()>;

    /// Map a caller-supplied id (possibly empty) to the concrete app id.
    fn resolve_app_id(&self, app_id: &str) -> Result<String>;

    fn track(&self, request: TrackRequest) -> Result<()>;

    fn user_operation(&self, app_id: &str, operation: UserOperation) -> Result<()>;

    fn identify(&self, app_id: &str, distinct_id: &str) -> Result<()>;

    fn login(&self, app_id: &str, account_id: &str) -> Result<()>;

    fn logout(&self, app_id: &str) -> Result<()>;

    fn flush(&self, app_id: &str) -> Result<()>;

    fn distinct_id(&self, app_id: &str) -> Result<String>;

    fn device_id(&self, app_id: &str) -> Result<String>;

    fn set_super_properties(&self, app_id: &str, properties: &str) -> Result<()>;

    fn super_properties(&self, app_id: &str) -> Result<String>;

    fn preset_properties(&self, app_id: &str) -> Result<String>;

    fn set_track_status(&self, app_id: &str, status: TrackStatus) -> Result<()>;

    fn enable_tracking(&self, app_id: &str, enabled: bool) -> Result<()> {
        let status = if enabled {
            TrackStatus::Normal
        } else {
            TrackStatus::Pause
        };
        self.set_track_status(app_id, status)
    }

    fn time_event(&self, _app_id: &str, _event_name: &str) -> Result<()> {
        not_available("time_event")
    }

    fn opt_out_tracking(&self, _app_id: &str) -> Result<()> {
        not_available("opt_out_tracking")
    }

    fn opt_in_tracking(&self, _app_id: &str) -> Result<()> {
        not_available("opt_in_tracking")
    }

    fn calibrate_time(&self, _timestamp_millis: i64) -> Result<()> {
        not_available("calibrate_time")
    }

    fn calibrate_time_with_ntp(&self, _server: &str) -> Result<()> {
        not_available("calibrate_time_with_ntp")
    }

    /// Create a light instance sharing the parent's configuration and return
    /// its id.
    fn create_light_instance(&self, _app_id: &str) -> Result<String> {
        not_available("create_light_instance")
    }

    fn enable_auto_track(
        &self,
        _app_id: &str,
        _types: &[AutoTrackEventType],
        _properties: Option<&str>,
    ) -> Result<()> {
        not_available("enable_auto_track")
    }

    fn set_auto_track_listener(
        &self,
        _app_id: &str,
        _types: &[AutoTrackEventType],
        _listener: Arc<dyn AutoTrackListener>,
    ) -> Result<()> {
        not_available("set_auto_track_listener")
    }

    /// `partners` is an opaque bitmask, one bit per sharing partner.
    fn enable_third_party_sharing(
        &self,
        _app_id: &str,
        _partners: u32,
        _properties: Option<&str>,
    ) -> Result<()> {
        not_available("enable_third_party_sharing")
    }
}
