//! Core service façade and bootstrap helpers.
//!
//! This crate wires a host-selected [`AnalyticsBackend`] into the shared
//! analytics façade. Desktop hosts typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`); mobile hosts inject their own
//! backend through [`AnalyticsDependencies`].
//!
//! Every façade call is synchronous and infallible from the host's point of
//! view. A missing backend, an unknown instance or a backend failure is logged
//! at warn level with the operation name and instance id, and the call becomes
//! a no-op. Getters return an empty string in those cases.
//!
//! ```ignore
//! use core_service::{AnalyticsConfig, AnalyticsDependencies, AnalyticsService};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let service = AnalyticsService::new(
//!     AnalyticsDependencies::new(Arc::new(my_backend)).with_config(config),
//! );
//! service.initialize();
//! service.set_dynamic_properties("", || json!({"level": player.level()}).to_string());
//! service.track("", "level_up", json!({"from": 4}));
//! ```

pub mod dynamic;
pub mod error;
pub mod properties;
pub mod sharing;

pub use dynamic::{DynamicPropertyProvider, DynamicPropertyRegistry};
pub use error::{CoreError, Result};
pub use properties::Properties;
pub use sharing::{SharingMask, SharingPartner, UnknownPartner};

pub use bridge_traits::{
    AnalyticsBackend, AnalyticsMode, AutoTrackEventType, AutoTrackListener, EncryptionConfig,
    InstanceConfig, TrackStatus,
};
pub use core_runtime::config::AnalyticsConfig;

use std::sync::Arc;

use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    EventKind, TrackRequest, UserOperation,
};
use core_runtime::config::SDK_VERSION;
use core_runtime::logging::redact_if_sensitive;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

/// Aggregated handle to everything the façade needs.
pub struct AnalyticsDependencies {
    /// Platform backend. `None` turns every call into a logged no-op.
    pub backend: Option<Arc<dyn AnalyticsBackend>>,
    pub dynamic_properties: Arc<DynamicPropertyRegistry>,
    /// Settings for the default instance, used by [`AnalyticsService::initialize`]
    pub config: Option<AnalyticsConfig>,
}

impl AnalyticsDependencies {
    pub fn new(backend: Arc<dyn AnalyticsBackend>) -> Self {
        Self {
            backend: Some(backend),
            dynamic_properties: Arc::new(DynamicPropertyRegistry::new()),
            config: None,
        }
    }

    /// Dependencies for a platform without an analytics backend.
    pub fn without_backend() -> Self {
        Self {
            backend: None,
            dynamic_properties: Arc::new(DynamicPropertyRegistry::new()),
            config: None,
        }
    }

    pub fn with_config(mut self, config: AnalyticsConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_registry(mut self, registry: Arc<DynamicPropertyRegistry>) -> Self {
        self.dynamic_properties = registry;
        self
    }
}

/// Primary façade exposed to host applications.
///
/// Every method takes the target instance id first; the empty string
/// addresses the default instance.
#[derive(Clone)]
pub struct AnalyticsService {
    deps: Arc<AnalyticsDependencies>,
}

impl AnalyticsService {
    pub fn new(deps: AnalyticsDependencies) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    pub fn dependencies(&self) -> Arc<AnalyticsDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.deps.backend.as_ref().map(|backend| backend.name())
    }

    // ----- initialization -----

    /// Initialize the default instance from the loaded settings.
    pub fn initialize(&self) {
        match &self.deps.config {
            Some(config) => self.initialize_instance(config.instance_config()),
            None => warn!(
                operation = "initialize",
                "No analytics settings loaded; call ignored"
            ),
        }
    }

    pub fn initialize_instance(&self, mut config: InstanceConfig) {
        if config.sdk_version.is_empty() {
            config.sdk_version = SDK_VERSION.to_string();
        }
        let app_id = config.app_id.clone();
        self.dispatch("initialize_instance", &app_id, |backend| {
            backend.initialize(&config)
        });
    }

    // ----- event tracking -----

    pub fn track(&self, app_id: &str, event_name: &str, properties: impl Into<Properties>) {
        self.track_event("track", app_id, event_name, EventKind::Track, properties.into());
    }

    /// Track an event recorded at most once per device.
    pub fn track_first(&self, app_id: &str, event_name: &str, properties: impl Into<Properties>) {
        self.track_event(
            "track_first",
            app_id,
            event_name,
            EventKind::First { check_id: None },
            properties.into(),
        );
    }

    /// Track an event recorded at most once per `first_check_id`.
    pub fn track_first_with_id(
        &self,
        app_id: &str,
        event_name: &str,
        properties: impl Into<Properties>,
        first_check_id: &str,
    ) {
        self.track_event(
            "track_first",
            app_id,
            event_name,
            EventKind::First {
                check_id: Some(first_check_id.to_string()),
            },
            properties.into(),
        );
    }

    pub fn track_update(
        &self,
        app_id: &str,
        event_name: &str,
        properties: impl Into<Properties>,
        event_id: &str,
    ) {
        self.track_event(
            "track_update",
            app_id,
            event_name,
            EventKind::Update {
                event_id: event_id.to_string(),
            },
            properties.into(),
        );
    }

    pub fn track_overwrite(
        &self,
        app_id: &str,
        event_name: &str,
        properties: impl Into<Properties>,
        event_id: &str,
    ) {
        self.track_event(
            "track_overwrite",
            app_id,
            event_name,
            EventKind::Overwrite {
                event_id: event_id.to_string(),
            },
            properties.into(),
        );
    }

    /// Start a duration timer; the next `track` of `event_name` carries it.
    pub fn time_event(&self, app_id: &str, event_name: &str) {
        self.dispatch("time_event", app_id, |backend| {
            backend.time_event(app_id, event_name)
        });
    }

    // ----- user properties -----

    pub fn user_set(&self, app_id: &str, properties: impl Into<Properties>) {
        self.user_operation(
            app_id,
            UserOperation::Set(properties.into().into_json_string()),
        );
    }

    pub fn user_set_once(&self, app_id: &str, properties: impl Into<Properties>) {
        self.user_operation(
            app_id,
            UserOperation::SetOnce(properties.into().into_json_string()),
        );
    }

    pub fn user_append(&self, app_id: &str, properties: impl Into<Properties>) {
        self.user_operation(
            app_id,
            UserOperation::Append(properties.into().into_json_string()),
        );
    }

    pub fn user_unique_append(&self, app_id: &str, properties: impl Into<Properties>) {
        self.user_operation(
            app_id,
            UserOperation::UniqueAppend(properties.into().into_json_string()),
        );
    }

    /// Add `value` to the numeric user property `property`.
    pub fn user_add(&self, app_id: &str, property: &str, value: f64) {
        let Some(number) = json_number(value) else {
            warn!(
                operation = "user_add",
                app_id,
                property,
                "Non-finite value; call ignored"
            );
            return;
        };

        let mut payload = Map::new();
        payload.insert(property.to_string(), Value::Number(number));
        self.user_operation(app_id, UserOperation::Add(Value::Object(payload).to_string()));
    }

    pub fn user_unset(&self, app_id: &str, property: &str) {
        self.user_operation(app_id, UserOperation::Unset(property.to_string()));
    }

    pub fn user_delete(&self, app_id: &str) {
        self.user_operation(app_id, UserOperation::Delete);
    }

    // ----- identity -----

    pub fn identify(&self, app_id: &str, distinct_id: &str) {
        self.dispatch("identify", app_id, |backend| {
            backend.identify(app_id, distinct_id)
        });
    }

    pub fn login(&self, app_id: &str, account_id: &str) {
        debug!(
            app_id,
            account_id = %redact_if_sensitive("account_id", account_id),
            "Login"
        );
        self.dispatch("login", app_id, |backend| backend.login(app_id, account_id));
    }

    pub fn logout(&self, app_id: &str) {
        self.dispatch("logout", app_id, |backend| backend.logout(app_id));
    }

    pub fn distinct_id(&self, app_id: &str) -> String {
        self.dispatch("distinct_id", app_id, |backend| backend.distinct_id(app_id))
            .unwrap_or_default()
    }

    pub fn device_id(&self, app_id: &str) -> String {
        self.dispatch("device_id", app_id, |backend| backend.device_id(app_id))
            .unwrap_or_default()
    }

    // ----- configuration & control -----

    pub fn flush(&self, app_id: &str) {
        self.dispatch("flush", app_id, |backend| backend.flush(app_id));
    }

    /// Correct event times against a trusted unix timestamp in milliseconds.
    pub fn calibrate_time(&self, timestamp_millis: i64) {
        self.dispatch("calibrate_time", "", |backend| {
            backend.calibrate_time(timestamp_millis)
        });
    }

    pub fn calibrate_time_with_ntp(&self, server: &str) {
        self.dispatch("calibrate_time_with_ntp", "", |backend| {
            backend.calibrate_time_with_ntp(server)
        });
    }

    pub fn opt_out_tracking(&self, app_id: &str) {
        self.dispatch("opt_out_tracking", app_id, |backend| {
            backend.opt_out_tracking(app_id)
        });
    }

    pub fn opt_in_tracking(&self, app_id: &str) {
        self.dispatch("opt_in_tracking", app_id, |backend| {
            backend.opt_in_tracking(app_id)
        });
    }

    pub fn enable_tracking(&self, app_id: &str, enabled: bool) {
        self.dispatch("enable_tracking", app_id, |backend| {
            backend.enable_tracking(app_id, enabled)
        });
    }

    pub fn set_track_status(&self, app_id: &str, status: TrackStatus) {
        self.dispatch("set_track_status", app_id, |backend| {
            backend.set_track_status(app_id, status)
        });
    }

    pub fn set_super_properties(&self, app_id: &str, properties: impl Into<Properties>) {
        let properties = properties.into().into_json_string();
        self.dispatch("set_super_properties", app_id, |backend| {
            backend.set_super_properties(app_id, &properties)
        });
    }

    pub fn super_properties(&self, app_id: &str) -> String {
        self.dispatch("super_properties", app_id, |backend| {
            backend.super_properties(app_id)
        })
        .unwrap_or_default()
    }

    pub fn preset_properties(&self, app_id: &str) -> String {
        self.dispatch("preset_properties", app_id, |backend| {
            backend.preset_properties(app_id)
        })
        .unwrap_or_default()
    }

    /// Create a light instance of `app_id` and return its id, or an empty
    /// string when the backend cannot.
    pub fn create_light_instance(&self, app_id: &str) -> String {
        self.dispatch("create_light_instance", app_id, |backend| {
            backend.create_light_instance(app_id)
        })
        .unwrap_or_default()
    }

    // ----- auto-track -----

    pub fn enable_auto_track(&self, app_id: &str) {
        self.enable_auto_track_with_types(app_id, &AutoTrackEventType::ALL);
    }

    pub fn enable_auto_track_with_types(&self, app_id: &str, types: &[AutoTrackEventType]) {
        self.dispatch("enable_auto_track", app_id, |backend| {
            backend.enable_auto_track(app_id, types, None)
        });
    }

    pub fn enable_auto_track_with_properties(
        &self,
        app_id: &str,
        types: &[AutoTrackEventType],
        properties: impl Into<Properties>,
    ) {
        let properties = properties.into().into_json_string();
        self.dispatch("enable_auto_track", app_id, |backend| {
            backend.enable_auto_track(app_id, types, Some(&properties))
        });
    }

    pub fn set_auto_track_listener<L>(&self, app_id: &str, types: &[AutoTrackEventType], listener: L)
    where
        L: AutoTrackListener + 'static,
    {
        let listener: Arc<dyn AutoTrackListener> = Arc::new(listener);
        self.dispatch("set_auto_track_listener", app_id, |backend| {
            backend.set_auto_track_listener(app_id, types, listener)
        });
    }

    // ----- third-party sharing -----

    /// Share analytics identity with the named partners. Unknown names are
    /// dropped.
    pub fn enable_third_party_sharing<I, S>(&self, app_id: &str, partners: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.share_with(app_id, SharingMask::from_names(partners), None);
    }

    pub fn enable_third_party_sharing_with_properties<I, S>(
        &self,
        app_id: &str,
        partners: I,
        properties: impl Into<Properties>,
    ) where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let properties = properties.into().into_json_string();
        self.share_with(app_id, SharingMask::from_names(partners), Some(properties));
    }

    // ----- dynamic properties -----

    /// Register the provider whose output is merged into every event of
    /// `app_id`. Replaces any earlier provider for the same id.
    ///
    /// Providers are keyed on the id exactly as given, so registering before
    /// the instance is initialized works.
    pub fn set_dynamic_properties<P>(&self, app_id: &str, provider: P)
    where
        P: DynamicPropertyProvider + 'static,
    {
        self.deps.dynamic_properties.register(app_id, provider);
    }

    /// Current output of the provider registered for `app_id`.
    pub fn dynamic_properties(&self, app_id: &str) -> String {
        self.deps.dynamic_properties.resolve(app_id)
    }

    // ----- plumbing -----

    fn track_event(
        &self,
        operation: &'static str,
        app_id: &str,
        event_name: &str,
        kind: EventKind,
        properties: Properties,
    ) {
        let properties = properties.into_json_string();
        let registry = &self.deps.dynamic_properties;
        self.dispatch(operation, app_id, |backend| {
            let resolved = backend.resolve_app_id(app_id)?;
            // the concrete instance wins over the alias the host used
            let dynamic_properties = registry.resolve_first([resolved.as_str(), app_id]);
            backend.track(TrackRequest {
                app_id: resolved,
                event_name: event_name.to_string(),
                kind,
                properties,
                dynamic_properties,
            })
        });
    }

    fn user_operation(&self, app_id: &str, operation: UserOperation) {
        self.dispatch(operation.as_str(), app_id, |backend| {
            backend.user_operation(app_id, operation)
        });
    }

    fn share_with(&self, app_id: &str, mask: SharingMask, properties: Option<String>) {
        debug!(app_id, partners = mask.bits(), "Enabling third-party sharing");
        self.dispatch("enable_third_party_sharing", app_id, |backend| {
            backend.enable_third_party_sharing(app_id, mask.bits(), properties.as_deref())
        });
    }

    /// Run `call` against the backend, absorbing every failure into a warning.
    fn dispatch<T>(
        &self,
        operation: &'static str,
        app_id: &str,
        call: impl FnOnce(&dyn AnalyticsBackend) -> BridgeResult<T>,
    ) -> Option<T> {
        let Some(backend) = self.deps.backend.as_deref() else {
            warn!(operation, app_id, "Analytics backend not available; call ignored");
            return None;
        };

        match call(backend) {
            Ok(value) => Some(value),
            Err(BridgeError::InstanceNotFound(_)) => {
                warn!(
                    operation,
                    app_id,
                    backend = backend.name(),
                    "No analytics instance for id; call ignored"
                );
                None
            }
            Err(err) => {
                warn!(
                    operation,
                    app_id,
                    backend = backend.name(),
                    error_kind = err.as_label(),
                    error = %err,
                    "Analytics call ignored"
                );
                None
            }
        }
    }
}

/// Integral values are emitted without a fractional part.
fn json_number(value: f64) -> Option<Number> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < MAX_EXACT {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

/// Build a service on the desktop backend and initialize the default
/// instance from `config`.
///
/// Identity is kept under the per-user data directory and delivered events
/// are appended to JSON-lines files next to it.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: AnalyticsConfig) -> Result<AnalyticsService> {
    bootstrap_desktop_in(config, bridge_desktop::default_data_dir())
}

/// [`bootstrap_desktop`] rooted at `data_dir` instead of the per-user
/// directory.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop_in(
    config: AnalyticsConfig,
    data_dir: impl Into<std::path::PathBuf>,
) -> Result<AnalyticsService> {
    let data_dir = data_dir.into();
    let backend = bridge_desktop::DesktopBackend::builder()
        .data_dir(data_dir.join("identity"))
        .transport(Arc::new(bridge_desktop::JsonLinesTransport::new(
            data_dir.join("events"),
        )))
        .batch_size(config.batch_size)
        .build()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let service =
        AnalyticsService::new(AnalyticsDependencies::new(Arc::new(backend)).with_config(config));
    service.initialize();
    Ok(service)
}

/// Build a service on the platform default backend from the engine's JSON
/// settings asset.
pub fn bootstrap_from_settings(settings: &str) -> Result<AnalyticsService> {
    let config = AnalyticsConfig::from_json_str(settings)?;
    bootstrap_default(config)
}

#[cfg(feature = "desktop-shims")]
fn bootstrap_default(config: AnalyticsConfig) -> Result<AnalyticsService> {
    bootstrap_desktop(config)
}

#[cfg(not(feature = "desktop-shims"))]
fn bootstrap_default(_config: AnalyticsConfig) -> Result<AnalyticsService> {
    Err(CoreError::CapabilityMissing {
        capability: "AnalyticsBackend".to_string(),
        message: "No default analytics backend is compiled in. \
                  Desktop: enable the 'desktop-shims' feature. \
                  Mobile: construct AnalyticsDependencies with the platform backend."
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_number_prefers_integers() {
        assert_eq!(json_number(5.0).unwrap().to_string(), "5");
        assert_eq!(json_number(-3.0).unwrap().to_string(), "-3");
        assert_eq!(json_number(2.5).unwrap().to_string(), "2.5");
        assert!(json_number(f64::NAN).is_none());
        assert!(json_number(f64::INFINITY).is_none());
    }

    #[test]
    fn test_calls_without_backend_are_noops() {
        let service = AnalyticsService::new(AnalyticsDependencies::without_backend());

        service.initialize();
        service.track("", "level_up", r#"{"level":2}"#);
        service.user_add("", "coins", 10.0);
        service.enable_third_party_sharing("", ["Adjust"]);

        assert_eq!(service.backend_name(), None);
        assert_eq!(service.distinct_id(""), "");
        assert_eq!(service.device_id("app1"), "");
        assert_eq!(service.super_properties(""), "");
        assert_eq!(service.preset_properties(""), "");
        assert_eq!(service.create_light_instance(""), "");
    }

    #[test]
    fn test_dynamic_properties_without_backend_use_raw_id() {
        let service = AnalyticsService::new(AnalyticsDependencies::without_backend());
        service.set_dynamic_properties("app1", || r#"{"level":5}"#.to_string());

        assert_eq!(service.dynamic_properties("app1"), r#"{"level":5}"#);
        assert_eq!(service.dynamic_properties("app2"), "");
    }
}
