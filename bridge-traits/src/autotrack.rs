//! Automatically collected lifecycle events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Lifecycle event a backend can collect on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoTrackEventType {
    AppStart,
    AppEnd,
    AppInstall,
    AppCrash,
}

impl AutoTrackEventType {
    pub const ALL: [AutoTrackEventType; 4] = [
        AutoTrackEventType::AppStart,
        AutoTrackEventType::AppEnd,
        AutoTrackEventType::AppInstall,
        AutoTrackEventType::AppCrash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AutoTrackEventType::AppStart => "appStart",
            AutoTrackEventType::AppEnd => "appEnd",
            AutoTrackEventType::AppInstall => "appInstall",
            AutoTrackEventType::AppCrash => "appCrash",
        }
    }
}

impl fmt::Display for AutoTrackEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutoTrackEventType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        AutoTrackEventType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BridgeError::InvalidPayload(format!("unknown auto-track type '{}'", s)))
    }
}

/// Callback invoked by a backend right before an auto-tracked event is
/// recorded. Receives the event's properties as JSON text and returns JSON
/// object text to merge into them (empty for nothing).
pub trait AutoTrackListener: Send + Sync {
    fn on_event(&self, event_type: AutoTrackEventType, properties: &str) -> String;
}

impl<F> AutoTrackListener for F
where
    F: Fn(AutoTrackEventType, &str) -> String + Send + Sync,
{
    fn on_event(&self, event_type: AutoTrackEventType, properties: &str) -> String {
        self(event_type, properties)
    }
}
