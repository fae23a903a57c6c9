//! Per-instance state of the desktop backend

use bridge_traits::{
    analytics::{AnalyticsMode, EventKind, InstanceConfig, TrackRequest, TrackStatus, UserOperation},
    error::{BridgeError, Result},
    transport::{EventBatch, EventTransport},
};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::DEFAULT_QUEUE_LIMIT;
use crate::identity::{IdentityStore, StoredIdentity};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Time zone used to format record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventZone {
    Utc,
    Fixed(FixedOffset),
    Local,
}

impl EventZone {
    /// Parse `UTC`/`GMT`, `±HH:MM` or `±HHMM`. Empty selects local time;
    /// anything else falls back to local time with a warning.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return EventZone::Local;
        }
        if matches!(text, "UTC" | "GMT" | "Etc/UTC" | "Z") {
            return EventZone::Utc;
        }

        match parse_fixed_offset(text) {
            Some(offset) => EventZone::Fixed(offset),
            None => {
                warn!(time_zone = text, "Unrecognized time zone, using local time");
                EventZone::Local
            }
        }
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        match self {
            EventZone::Utc => at.format(TIME_FORMAT).to_string(),
            EventZone::Fixed(offset) => at.with_timezone(offset).format(TIME_FORMAT).to_string(),
            EventZone::Local => at.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        }
    }

    /// Offset from UTC in hours at the given instant.
    pub fn offset_hours(&self, at: DateTime<Utc>) -> f64 {
        let seconds = match self {
            EventZone::Utc => 0,
            EventZone::Fixed(offset) => offset.local_minus_utc(),
            EventZone::Local => at.with_timezone(&Local).offset().fix().local_minus_utc(),
        };
        f64::from(seconds) / 3600.0
    }
}

fn parse_fixed_offset(text: &str) -> Option<FixedOffset> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a JSON object payload; blank text is an empty object.
pub(crate) fn parse_object(text: &str, what: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BridgeError::InvalidPayload(format!(
            "{} must be a JSON object, got {}",
            what,
            json_kind(&other)
        ))),
        Err(e) => Err(BridgeError::InvalidPayload(format!("{}: {}", what, e))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_check_id: Option<&'a str>,
    time: String,
    distinct_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
    uuid: String,
    properties: Map<String, Value>,
}

pub(crate) struct DesktopInstance {
    /// Key under which the instance is registered (differs from
    /// `config.app_id` for light instances)
    key: String,
    config: InstanceConfig,
    zone: EventZone,
    device_id: String,
    identity: StoredIdentity,
    identity_store: Option<IdentityStore>,
    super_properties: Map<String, Value>,
    timed_events: HashMap<String, i64>,
    status: TrackStatus,
    opted_out: bool,
    queue: Vec<Value>,
    queue_limit: usize,
}

impl DesktopInstance {
    pub fn new(
        key: impl Into<String>,
        config: InstanceConfig,
        device_id: impl Into<String>,
        identity_store: Option<IdentityStore>,
    ) -> Result<Self> {
        let key = key.into();
        let identity = match identity_store.as_ref() {
            Some(store) => match store.load_identity(&key)? {
                Some(identity) => identity,
                None => {
                    let fresh = fresh_identity();
                    store.save_identity(&key, &fresh)?;
                    fresh
                }
            },
            None => fresh_identity(),
        };

        if config.encryption.is_some() {
            warn!(
                app_id = %config.app_id,
                "Encryption requested but desktop transports write records unencrypted"
            );
        }

        Ok(Self {
            key,
            zone: EventZone::parse(&config.time_zone),
            config,
            device_id: device_id.into(),
            identity,
            identity_store,
            super_properties: Map::new(),
            timed_events: HashMap::new(),
            status: TrackStatus::Normal,
            opted_out: false,
            queue: Vec::new(),
            queue_limit: DEFAULT_QUEUE_LIMIT,
        })
    }

    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit.max(1);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn distinct_id(&self) -> &str {
        &self.identity.distinct_id
    }

    pub fn account_id(&self) -> Option<&str> {
        self.identity.account_id.as_deref()
    }

    pub fn status(&self) -> TrackStatus {
        self.status
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn accepts_records(&self) -> bool {
        !self.opted_out && matches!(self.status, TrackStatus::Normal | TrackStatus::SaveOnly)
    }

    pub fn identify(&mut self, distinct_id: &str) -> Result<()> {
        if distinct_id.is_empty() {
            return Err(BridgeError::InvalidPayload(
                "distinct id must not be empty".to_string(),
            ));
        }
        self.identity.distinct_id = distinct_id.to_string();
        self.persist_identity()
    }

    pub fn login(&mut self, account_id: &str) -> Result<()> {
        if account_id.is_empty() {
            return Err(BridgeError::InvalidPayload(
                "account id must not be empty".to_string(),
            ));
        }
        self.identity.account_id = Some(account_id.to_string());
        self.persist_identity()
    }

    pub fn logout(&mut self) -> Result<()> {
        self.identity.account_id = None;
        self.persist_identity()
    }

    fn reset_identity(&mut self) -> Result<()> {
        self.identity = fresh_identity();
        self.persist_identity()
    }

    fn persist_identity(&self) -> Result<()> {
        match self.identity_store.as_ref() {
            Some(store) => store.save_identity(&self.key, &self.identity),
            None => Ok(()),
        }
    }

    pub fn set_super_properties(&mut self, properties: &str) -> Result<()> {
        let incoming = parse_object(properties, "super properties")?;
        self.super_properties.extend(incoming);
        Ok(())
    }

    pub fn super_properties_json(&self) -> String {
        Value::Object(self.super_properties.clone()).to_string()
    }

    pub fn preset_properties(&self, now: DateTime<Utc>) -> Map<String, Value> {
        let mut preset = Map::new();
        preset.insert("lib".into(), Value::from("rust"));
        preset.insert("lib_version".into(), Value::from(self.config.sdk_version.clone()));
        preset.insert("os".into(), Value::from(std::env::consts::OS));
        preset.insert("os_family".into(), Value::from(std::env::consts::FAMILY));
        preset.insert("arch".into(), Value::from(std::env::consts::ARCH));
        preset.insert("device_id".into(), Value::from(self.device_id.clone()));
        preset.insert("zone_offset".into(), Value::from(self.zone.offset_hours(now)));
        preset
    }

    pub fn time_event(&mut self, event_name: &str, now_millis: i64) {
        self.timed_events.insert(event_name.to_string(), now_millis);
    }

    pub fn set_status(&mut self, status: TrackStatus) -> Result<()> {
        if status == TrackStatus::Stop {
            self.queue.clear();
            self.super_properties.clear();
            self.timed_events.clear();
            self.reset_identity()?;
        }
        self.status = status;
        Ok(())
    }

    pub fn opt_out(&mut self) -> Result<()> {
        self.opted_out = true;
        self.queue.clear();
        self.timed_events.clear();
        self.reset_identity()
    }

    pub fn opt_in(&mut self) {
        self.opted_out = false;
    }

    /// Build and queue a tracked event.
    ///
    /// Properties merge in the order preset, super, dynamic, event; later
    /// sources win. A source that is not a JSON object is skipped.
    pub fn record_track(
        &mut self,
        request: &TrackRequest,
        now: DateTime<Utc>,
        transport: &dyn EventTransport,
        batch_size: usize,
    ) -> Result<()> {
        if !self.accepts_records() {
            debug!(app_id = %self.key, event = %request.event_name, status = %self.status, "Dropped event");
            return Ok(());
        }

        let mut properties = self.preset_properties(now);
        properties.extend(self.super_properties.clone());
        for (source, text) in [
            ("dynamic properties", request.dynamic_properties.as_str()),
            ("event properties", request.properties.as_str()),
        ] {
            match parse_object(text, source) {
                Ok(map) => properties.extend(map),
                Err(e) => warn!(app_id = %self.key, event = %request.event_name, error = %e, "Skipped properties"),
            }
        }

        if let Some(started) = self.timed_events.remove(&request.event_name) {
            let seconds = (now.timestamp_millis() - started).max(0) as f64 / 1000.0;
            properties.insert("duration".into(), Value::from(seconds));
        }

        let check_id = match &request.kind {
            EventKind::First { check_id } => Some(
                check_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .unwrap_or(self.device_id.as_str()),
            ),
            _ => None,
        };
        let event_id = match &request.kind {
            EventKind::Update { event_id } | EventKind::Overwrite { event_id } => {
                Some(event_id.as_str())
            }
            _ => None,
        };

        let record = EventRecord {
            kind: request.kind.as_str(),
            event_name: Some(&request.event_name),
            event_id,
            first_check_id: check_id,
            time: self.zone.format(now),
            distinct_id: &self.identity.distinct_id,
            account_id: self.account_id(),
            uuid: Uuid::new_v4().to_string(),
            properties,
        };
        let value = serde_json::to_value(record)?;
        self.enqueue(value, transport, batch_size)
    }

    /// Build and queue a user-profile record.
    pub fn record_user(
        &mut self,
        operation: &UserOperation,
        now: DateTime<Utc>,
        transport: &dyn EventTransport,
        batch_size: usize,
    ) -> Result<()> {
        if !self.accepts_records() {
            debug!(app_id = %self.key, operation = operation.as_str(), "Dropped user operation");
            return Ok(());
        }

        let properties = match operation {
            UserOperation::Set(text)
            | UserOperation::SetOnce(text)
            | UserOperation::Append(text)
            | UserOperation::UniqueAppend(text) => parse_object(text, operation.as_str())?,
            UserOperation::Add(text) => {
                let map = parse_object(text, operation.as_str())?;
                if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_number()) {
                    return Err(BridgeError::InvalidPayload(format!(
                        "user_add value for '{}' must be a number",
                        key
                    )));
                }
                map
            }
            UserOperation::Unset(property) => {
                if property.is_empty() {
                    return Err(BridgeError::InvalidPayload(
                        "user_unset needs a property name".to_string(),
                    ));
                }
                let mut map = Map::new();
                map.insert(property.clone(), Value::from(0));
                map
            }
            UserOperation::Delete => Map::new(),
        };

        let record = EventRecord {
            kind: operation.as_str(),
            event_name: None,
            event_id: None,
            first_check_id: None,
            time: self.zone.format(now),
            distinct_id: &self.identity.distinct_id,
            account_id: self.account_id(),
            uuid: Uuid::new_v4().to_string(),
            properties,
        };
        let value = serde_json::to_value(record)?;
        self.enqueue(value, transport, batch_size)
    }

    fn enqueue(
        &mut self,
        record: Value,
        transport: &dyn EventTransport,
        batch_size: usize,
    ) -> Result<()> {
        if self.config.enable_log {
            info!(app_id = %self.key, record = %record, "Queued record");
        } else {
            debug!(app_id = %self.key, "Queued record");
        }
        self.queue.push(record);
        self.trim_queue();

        let immediate = !matches!(self.config.mode, AnalyticsMode::Normal);
        if immediate || self.queue.len() >= batch_size {
            self.flush(transport)?;
        }
        Ok(())
    }

    /// Drop the oldest records beyond the queue limit.
    fn trim_queue(&mut self) {
        let excess = self.queue.len().saturating_sub(self.queue_limit);
        if excess > 0 {
            self.queue.drain(..excess);
            warn!(
                app_id = %self.key,
                dropped = excess,
                limit = self.queue_limit,
                "Event queue full; dropped oldest records"
            );
        }
    }

    /// Deliver queued records. On failure the records stay queued.
    pub fn flush(&mut self, transport: &dyn EventTransport) -> Result<()> {
        if self.status == TrackStatus::SaveOnly || self.queue.is_empty() {
            return Ok(());
        }

        let batch = EventBatch::new(
            self.config.app_id.clone(),
            self.config.server_url.clone(),
            std::mem::take(&mut self.queue),
        );

        match transport.deliver(&batch) {
            Ok(()) => {
                debug!(app_id = %self.key, records = batch.len(), "Delivered batch");
                Ok(())
            }
            Err(e) => {
                let mut records = batch.records;
                records.append(&mut self.queue);
                self.queue = records;
                Err(e)
            }
        }
    }

    /// Copy of this instance under a new key with its own identity.
    pub fn light_copy(&self, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            config: self.config.clone(),
            zone: self.zone,
            device_id: self.device_id.clone(),
            identity: fresh_identity(),
            identity_store: None,
            super_properties: Map::new(),
            timed_events: HashMap::new(),
            status: TrackStatus::Normal,
            opted_out: false,
            queue: Vec::new(),
            queue_limit: self.queue_limit,
        }
    }
}

fn fresh_identity() -> StoredIdentity {
    StoredIdentity {
        distinct_id: Uuid::new_v4().to_string(),
        account_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use chrono::TimeZone;
    use serde_json::json;

    fn instance(mode: AnalyticsMode) -> DesktopInstance {
        let config = InstanceConfig::new("app1", "https://collector.example.com")
            .with_mode(mode)
            .with_time_zone("UTC")
            .with_sdk_version("1.2.3");
        DesktopInstance::new("app1", config, "device-1", None).unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap()
    }

    fn request(name: &str, props: &str, dynamic: &str) -> TrackRequest {
        TrackRequest {
            app_id: "app1".to_string(),
            event_name: name.to_string(),
            kind: EventKind::Track,
            properties: props.to_string(),
            dynamic_properties: dynamic.to_string(),
        }
    }

    #[test]
    fn test_zone_parsing() {
        assert_eq!(EventZone::parse("UTC"), EventZone::Utc);
        assert_eq!(EventZone::parse(""), EventZone::Local);
        assert_eq!(
            EventZone::parse("+08:00"),
            EventZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
        );
        assert_eq!(
            EventZone::parse("-0530"),
            EventZone::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert_eq!(EventZone::parse("Mars/Olympus"), EventZone::Local);
        assert_eq!(EventZone::parse("+25:00"), EventZone::Local);
    }

    #[test]
    fn test_zone_formatting() {
        let instant = at(0);
        assert_eq!(EventZone::Utc.format(instant), "1970-01-01 00:00:00.000");
        let plus_eight = EventZone::parse("+08:00");
        assert_eq!(plus_eight.format(instant), "1970-01-01 08:00:00.000");
        assert_eq!(plus_eight.offset_hours(instant), 8.0);
    }

    #[test]
    fn test_parse_object_rules() {
        assert!(parse_object("", "x").unwrap().is_empty());
        assert!(parse_object("   ", "x").unwrap().is_empty());
        assert_eq!(parse_object(r#"{"a":1}"#, "x").unwrap()["a"], json!(1));
        assert!(matches!(
            parse_object("[1]", "x"),
            Err(BridgeError::InvalidPayload(ref m)) if m.contains("an array")
        ));
        assert!(parse_object("{", "x").is_err());
    }

    #[test]
    fn test_merge_order_later_sources_win() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug);
        inst.set_super_properties(r#"{"level":1,"channel":"steam","os":"custom"}"#)
            .unwrap();

        inst.record_track(
            &request("match_end", r#"{"score":10,"level":3}"#, r#"{"level":2,"gold":7}"#),
            at(1_000),
            &transport,
            50,
        )
        .unwrap();

        let records = transport.records();
        assert_eq!(records.len(), 1);
        let props = &records[0]["properties"];
        assert_eq!(props["level"], json!(3));
        assert_eq!(props["gold"], json!(7));
        assert_eq!(props["channel"], json!("steam"));
        assert_eq!(props["os"], json!("custom"));
        assert_eq!(props["lib_version"], json!("1.2.3"));
        assert_eq!(records[0]["type"], json!("track"));
        assert_eq!(records[0]["event_name"], json!("match_end"));
        assert_eq!(records[0]["time"], json!("1970-01-01 00:00:01.000"));
        assert!(records[0].get("account_id").is_none());
    }

    #[test]
    fn test_invalid_dynamic_properties_are_skipped() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug);

        inst.record_track(&request("e", r#"{"a":1}"#, "not json"), at(0), &transport, 50)
            .unwrap();

        let records = transport.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["properties"]["a"], json!(1));
    }

    #[test]
    fn test_first_event_defaults_check_id_to_device() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug);

        let mut req = request("tutorial_done", "{}", "");
        req.kind = EventKind::First { check_id: None };
        inst.record_track(&req, at(0), &transport, 50).unwrap();

        req.kind = EventKind::Update {
            event_id: "evt-9".to_string(),
        };
        inst.record_track(&req, at(0), &transport, 50).unwrap();

        let records = transport.records();
        assert_eq!(records[0]["type"], json!("track_first"));
        assert_eq!(records[0]["first_check_id"], json!("device-1"));
        assert_eq!(records[1]["type"], json!("track_update"));
        assert_eq!(records[1]["event_id"], json!("evt-9"));
    }

    #[test]
    fn test_timed_event_adds_duration() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug);

        inst.time_event("level_play", 10_000);
        inst.record_track(&request("level_play", "", ""), at(12_500), &transport, 50)
            .unwrap();
        inst.record_track(&request("level_play", "", ""), at(20_000), &transport, 50)
            .unwrap();

        let records = transport.records();
        assert_eq!(records[0]["properties"]["duration"], json!(2.5));
        assert!(records[1]["properties"].get("duration").is_none());
    }

    #[test]
    fn test_normal_mode_batches_until_threshold() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Normal);

        inst.record_track(&request("a", "", ""), at(0), &transport, 2).unwrap();
        assert!(transport.batches().is_empty());
        assert_eq!(inst.pending(), 1);

        inst.record_track(&request("b", "", ""), at(0), &transport, 2).unwrap();
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0].app_id, "app1");
        assert_eq!(inst.pending(), 0);
    }

    #[test]
    fn test_failed_delivery_keeps_records() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Normal);
        inst.record_track(&request("a", "", ""), at(0), &transport, 10).unwrap();

        transport.set_failing(true);
        assert!(inst.flush(&transport).is_err());
        assert_eq!(inst.pending(), 1);

        transport.set_failing(false);
        inst.flush(&transport).unwrap();
        assert_eq!(inst.pending(), 0);
        assert_eq!(transport.records().len(), 1);
    }

    #[test]
    fn test_save_only_queue_drops_oldest_beyond_limit() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Normal).with_queue_limit(3);
        inst.set_status(TrackStatus::SaveOnly).unwrap();

        for name in ["a", "b", "c", "d", "e"] {
            inst.record_track(&request(name, "", ""), at(0), &transport, 2).unwrap();
        }
        assert_eq!(inst.pending(), 3);
        assert!(transport.batches().is_empty());

        inst.set_status(TrackStatus::Normal).unwrap();
        inst.flush(&transport).unwrap();
        let names: Vec<_> = transport
            .records()
            .iter()
            .map(|record| record["event_name"].clone())
            .collect();
        assert_eq!(names, vec![json!("c"), json!("d"), json!("e")]);
    }

    #[test]
    fn test_failing_transport_keeps_queue_bounded() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug).with_queue_limit(2);
        transport.set_failing(true);

        for name in ["a", "b", "c"] {
            assert!(inst.record_track(&request(name, "", ""), at(0), &transport, 10).is_err());
        }
        assert_eq!(inst.pending(), 2);
        assert_eq!(inst.light_copy("light").queue_limit, 2);

        transport.set_failing(false);
        inst.flush(&transport).unwrap();
        assert_eq!(transport.records()[0]["event_name"], json!("b"));
    }

    #[test]
    fn test_status_rules() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Normal);

        inst.set_status(TrackStatus::Pause).unwrap();
        inst.record_track(&request("a", "", ""), at(0), &transport, 10).unwrap();
        assert_eq!(inst.pending(), 0);

        inst.set_status(TrackStatus::SaveOnly).unwrap();
        inst.record_track(&request("b", "", ""), at(0), &transport, 10).unwrap();
        inst.flush(&transport).unwrap();
        assert_eq!(inst.pending(), 1);
        assert!(transport.batches().is_empty());

        let before = inst.distinct_id().to_string();
        inst.set_status(TrackStatus::Stop).unwrap();
        assert_eq!(inst.pending(), 0);
        assert_ne!(inst.distinct_id(), before);
        inst.record_track(&request("c", "", ""), at(0), &transport, 10).unwrap();
        assert_eq!(inst.pending(), 0);
    }

    #[test]
    fn test_opt_out_drops_until_opt_in() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Normal);
        inst.login("player-7").unwrap();
        inst.record_track(&request("a", "", ""), at(0), &transport, 10).unwrap();

        inst.opt_out().unwrap();
        assert_eq!(inst.pending(), 0);
        assert_eq!(inst.account_id(), None);
        inst.record_track(&request("b", "", ""), at(0), &transport, 10).unwrap();
        assert_eq!(inst.pending(), 0);

        inst.opt_in();
        inst.record_track(&request("c", "", ""), at(0), &transport, 10).unwrap();
        assert_eq!(inst.pending(), 1);
    }

    #[test]
    fn test_user_records() {
        let transport = MemoryTransport::new();
        let mut inst = instance(AnalyticsMode::Debug);
        inst.login("player-7").unwrap();

        inst.record_user(&UserOperation::Add(r#"{"coins":5}"#.into()), at(0), &transport, 10)
            .unwrap();
        inst.record_user(&UserOperation::Unset("nickname".into()), at(0), &transport, 10)
            .unwrap();
        inst.record_user(&UserOperation::Delete, at(0), &transport, 10).unwrap();

        let records = transport.records();
        assert_eq!(records[0]["type"], json!("user_add"));
        assert_eq!(records[0]["properties"], json!({"coins": 5}));
        assert_eq!(records[0]["account_id"], json!("player-7"));
        assert_eq!(records[1]["properties"], json!({"nickname": 0}));
        assert_eq!(records[2]["type"], json!("user_del"));
        assert!(records[2].get("event_name").is_none());

        let err = inst
            .record_user(&UserOperation::Add(r#"{"coins":"x"}"#.into()), at(0), &transport, 10)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidPayload(_)));
    }

    #[test]
    fn test_identity_rules() {
        let mut inst = instance(AnalyticsMode::Normal);
        assert!(inst.identify("").is_err());
        inst.identify("custom-distinct").unwrap();
        assert_eq!(inst.distinct_id(), "custom-distinct");
        inst.login("acc").unwrap();
        inst.logout().unwrap();
        assert_eq!(inst.account_id(), None);
        assert_eq!(inst.distinct_id(), "custom-distinct");
    }

    #[test]
    fn test_light_copy_has_own_identity() {
        let mut inst = instance(AnalyticsMode::Normal);
        inst.set_super_properties(r#"{"a":1}"#).unwrap();

        let light = inst.light_copy("light-1");
        assert_eq!(light.key(), "light-1");
        assert_eq!(light.config().app_id, "app1");
        assert_ne!(light.distinct_id(), inst.distinct_id());
        assert_eq!(light.super_properties_json(), "{}");
        assert_eq!(light.device_id(), "device-1");
    }
}
