//! Desktop analytics backend
//!
//! In-process implementation of [`AnalyticsBackend`] for Windows, macOS and
//! Linux builds. Instances live in a table keyed by app id; the first
//! instance initialized answers calls addressed to the empty id.

use bridge_traits::{
    analytics::{AnalyticsBackend, InstanceConfig, TrackRequest, TrackStatus, UserOperation},
    error::{BridgeError, Result},
    time::{Clock, SystemClock},
    transport::EventTransport,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::identity::IdentityStore;
use crate::instance::DesktopInstance;
use crate::transport::JsonLinesTransport;

/// Default number of queued records that triggers an automatic flush.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default cap on records held per instance while delivery is held back.
pub const DEFAULT_QUEUE_LIMIT: usize = 10_000;

#[derive(Default)]
struct BackendState {
    instances: HashMap<String, DesktopInstance>,
    default_key: Option<String>,
}

impl BackendState {
    fn key_for<'a>(&'a self, app_id: &'a str) -> Result<&'a str> {
        if app_id.is_empty() {
            return self
                .default_key
                .as_deref()
                .ok_or_else(|| BridgeError::InstanceNotFound(app_id.to_string()));
        }
        if self.instances.contains_key(app_id) {
            Ok(app_id)
        } else {
            Err(BridgeError::InstanceNotFound(app_id.to_string()))
        }
    }

    fn instance_mut(&mut self, app_id: &str) -> Result<&mut DesktopInstance> {
        let key = self.key_for(app_id)?.to_string();
        self.instances
            .get_mut(&key)
            .ok_or(BridgeError::InstanceNotFound(key))
    }

    fn instance(&self, app_id: &str) -> Result<&DesktopInstance> {
        let key = self.key_for(app_id)?;
        self.instances
            .get(key)
            .ok_or_else(|| BridgeError::InstanceNotFound(key.to_string()))
    }
}

/// Desktop implementation of the analytics backend.
///
/// All state sits behind one mutex; every call completes (including any
/// delivery it triggers) before returning.
pub struct DesktopBackend {
    state: Mutex<BackendState>,
    transport: Arc<dyn EventTransport>,
    clock: Arc<dyn Clock>,
    identity_store: Option<IdentityStore>,
    device_id: String,
    batch_size: usize,
    queue_limit: usize,
    clock_offset_millis: AtomicI64,
}

impl DesktopBackend {
    pub fn builder() -> DesktopBackendBuilder {
        DesktopBackendBuilder::default()
    }

    /// Backend with in-memory identity that delivers to `transport`.
    pub fn with_transport(transport: Arc<dyn EventTransport>) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            transport,
            clock: Arc::new(SystemClock),
            identity_store: None,
            device_id: Uuid::new_v4().to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            clock_offset_millis: AtomicI64::new(0),
        }
    }

    pub fn device(&self) -> &str {
        &self.device_id
    }

    /// Number of records waiting for delivery on an instance.
    pub fn pending(&self, app_id: &str) -> Result<usize> {
        Ok(self.state().instance(app_id)?.pending())
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = self.clock_offset_millis.load(Ordering::SeqCst);
        self.clock.now() + Duration::milliseconds(offset)
    }
}

impl AnalyticsBackend for DesktopBackend {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn initialize(&self, config: &InstanceConfig) -> Result<()> {
        if config.app_id.is_empty() {
            return Err(BridgeError::InvalidPayload(
                "app id must not be empty".to_string(),
            ));
        }

        let mut state = self.state();
        if state.instances.contains_key(&config.app_id) {
            debug!(app_id = %config.app_id, "Instance already initialized");
            return Ok(());
        }

        let instance = DesktopInstance::new(
            config.app_id.clone(),
            config.clone(),
            self.device_id.clone(),
            self.identity_store.clone(),
        )?
        .with_queue_limit(self.queue_limit);
        state.instances.insert(config.app_id.clone(), instance);
        if state.default_key.is_none() {
            state.default_key = Some(config.app_id.clone());
        }

        info!(
            app_id = %config.app_id,
            mode = ?config.mode,
            sdk_version = %config.sdk_version,
            "Initialized desktop analytics instance"
        );
        Ok(())
    }

    fn resolve_app_id(&self, app_id: &str) -> Result<String> {
        Ok(self.state().key_for(app_id)?.to_string())
    }

    fn track(&self, request: TrackRequest) -> Result<()> {
        let now = self.now();
        let mut state = self.state();
        let instance = state.instance_mut(&request.app_id)?;
        instance.record_track(&request, now, self.transport.as_ref(), self.batch_size)
    }

    fn user_operation(&self, app_id: &str, operation: UserOperation) -> Result<()> {
        let now = self.now();
        let mut state = self.state();
        let instance = state.instance_mut(app_id)?;
        instance.record_user(&operation, now, self.transport.as_ref(), self.batch_size)
    }

    fn identify(&self, app_id: &str, distinct_id: &str) -> Result<()> {
        self.state().instance_mut(app_id)?.identify(distinct_id)
    }

    fn login(&self, app_id: &str, account_id: &str) -> Result<()> {
        self.state().instance_mut(app_id)?.login(account_id)
    }

    fn logout(&self, app_id: &str) -> Result<()> {
        self.state().instance_mut(app_id)?.logout()
    }

    fn flush(&self, app_id: &str) -> Result<()> {
        self.state()
            .instance_mut(app_id)?
            .flush(self.transport.as_ref())
    }

    fn distinct_id(&self, app_id: &str) -> Result<String> {
        Ok(self.state().instance(app_id)?.distinct_id().to_string())
    }

    fn device_id(&self, app_id: &str) -> Result<String> {
        Ok(self.state().instance(app_id)?.device_id().to_string())
    }

    fn set_super_properties(&self, app_id: &str, properties: &str) -> Result<()> {
        self.state()
            .instance_mut(app_id)?
            .set_super_properties(properties)
    }

    fn super_properties(&self, app_id: &str) -> Result<String> {
        Ok(self.state().instance(app_id)?.super_properties_json())
    }

    fn preset_properties(&self, app_id: &str) -> Result<String> {
        let now = self.now();
        let preset = self.state().instance(app_id)?.preset_properties(now);
        Ok(Value::Object(preset).to_string())
    }

    fn set_track_status(&self, app_id: &str, status: TrackStatus) -> Result<()> {
        let mut state = self.state();
        let instance = state.instance_mut(app_id)?;
        let previous = instance.status();
        instance.set_status(status)?;
        debug!(app_id = %instance.key(), from = %previous, to = %status, "Changed track status");
        Ok(())
    }

    fn time_event(&self, app_id: &str, event_name: &str) -> Result<()> {
        let now = self.now().timestamp_millis();
        self.state()
            .instance_mut(app_id)?
            .time_event(event_name, now);
        Ok(())
    }

    fn opt_out_tracking(&self, app_id: &str) -> Result<()> {
        self.state().instance_mut(app_id)?.opt_out()
    }

    fn opt_in_tracking(&self, app_id: &str) -> Result<()> {
        self.state().instance_mut(app_id)?.opt_in();
        Ok(())
    }

    fn calibrate_time(&self, timestamp_millis: i64) -> Result<()> {
        let offset = timestamp_millis - self.clock.unix_timestamp_millis();
        self.clock_offset_millis.store(offset, Ordering::SeqCst);
        debug!(offset_ms = offset, "Calibrated event clock");
        Ok(())
    }

    fn create_light_instance(&self, app_id: &str) -> Result<String> {
        let mut state = self.state();
        let light = state
            .instance(app_id)?
            .light_copy(Uuid::new_v4().to_string());
        let key = light.key().to_string();
        debug!(app_id = %light.config().app_id, light = %key, "Created light instance");
        state.instances.insert(key.clone(), light);
        Ok(key)
    }
}

/// Builder for [`DesktopBackend`].
#[derive(Default)]
pub struct DesktopBackendBuilder {
    transport: Option<Arc<dyn EventTransport>>,
    clock: Option<Arc<dyn Clock>>,
    data_dir: Option<PathBuf>,
    batch_size: Option<usize>,
    queue_limit: Option<usize>,
}

impl DesktopBackendBuilder {
    pub fn transport(mut self, transport: Arc<dyn EventTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Directory where device and user identity are persisted. Without it,
    /// identity lasts for the lifetime of the backend.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Most records an instance keeps while delivery is held back. The
    /// oldest records are dropped beyond it.
    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = Some(limit);
        self
    }

    /// Build the backend. Fails only when a configured data directory holds
    /// an unreadable identity document.
    pub fn build(self) -> Result<DesktopBackend> {
        let identity_store = self.data_dir.map(IdentityStore::new);

        let device_id = match identity_store.as_ref() {
            Some(store) => match store.load_device_id()? {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4().to_string();
                    store.save_device_id(&id)?;
                    id
                }
            },
            None => Uuid::new_v4().to_string(),
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(JsonLinesTransport::in_data_dir()));

        Ok(DesktopBackend {
            state: Mutex::new(BackendState::default()),
            transport,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            identity_store,
            device_id,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            queue_limit: self.queue_limit.unwrap_or(DEFAULT_QUEUE_LIMIT).max(1),
            clock_offset_millis: AtomicI64::new(0),
        })
    }
}
