//! # Analytics Configuration
//!
//! Settings for the default analytics instance and the backend that serves it.
//!
//! ## Overview
//!
//! [`AnalyticsConfig`] is built with [`AnalyticsConfig::builder`] or loaded
//! from the engine's JSON settings asset with [`AnalyticsConfig::from_json_str`].
//! Both paths validate fail-fast, so a config that reaches the façade is
//! always usable.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::AnalyticsMode;
//! use core_runtime::config::AnalyticsConfig;
//!
//! let config = AnalyticsConfig::builder()
//!     .app_id("1b1c1fef65e3482bad5c9d0e6a823356")
//!     .server_url("https://receiver.example.com")
//!     .mode(AnalyticsMode::Debug)
//!     .time_zone("UTC")
//!     .build()?;
//! ```
//!
//! ## Settings document
//!
//! ```json
//! {
//!   "app_id": "1b1c1fef65e3482bad5c9d0e6a823356",
//!   "server_url": "https://receiver.example.com",
//!   "mode": "DEBUG",
//!   "enable_log": true,
//!   "time_zone": "+08:00",
//!   "encrypt": { "enable": true, "public_key": "MIIB...", "version": 1 }
//! }
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AnalyticsMode, EncryptionConfig, InstanceConfig};
use serde::Deserialize;

/// Records per automatic flush when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Upper bound accepted for [`AnalyticsConfig::batch_size`].
pub const MAX_BATCH_SIZE: usize = 1000;

/// Version stamped on every instance unless overridden.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level analytics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
    pub app_id: String,
    pub server_url: String,
    pub mode: AnalyticsMode,
    pub enable_log: bool,
    /// `UTC`, `±HH:MM`, or empty for local time
    pub time_zone: String,
    pub encryption: Option<EncryptionConfig>,
    /// Pending records that trigger an automatic flush in `Normal` mode
    pub batch_size: usize,
    pub sdk_version: String,
}

impl AnalyticsConfig {
    pub fn builder() -> AnalyticsConfigBuilder {
        AnalyticsConfigBuilder::default()
    }

    /// Load settings from the engine's JSON settings asset.
    ///
    /// Missing optional keys take their defaults. The result is validated
    /// before it is returned.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: SettingsDocument = serde_json::from_str(text)?;

        let mut builder = Self::builder()
            .app_id(document.app_id)
            .server_url(document.server_url)
            .mode(document.mode)
            .enable_log(document.enable_log)
            .time_zone(document.time_zone);

        if let Some(size) = document.batch_size {
            builder = builder.batch_size(size);
        }

        if let Some(encrypt) = document.encrypt.filter(|e| e.enable) {
            let mut encryption = EncryptionConfig::new(encrypt.public_key, encrypt.version);
            if let (Some(symmetric), Some(asymmetric)) =
                (encrypt.symmetric_algorithm, encrypt.asymmetric_algorithm)
            {
                encryption = encryption.with_algorithms(symmetric, asymmetric);
            }
            builder = builder.encryption(encryption);
        }

        builder.build()
    }

    /// Checks:
    /// - app id and server url are not blank
    /// - batch size is within `1..=MAX_BATCH_SIZE`
    /// - encryption, when enabled, has a key and a positive version
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::Config("App id cannot be empty".to_string()));
        }

        if self.server_url.trim().is_empty() {
            return Err(Error::Config("Server url cannot be empty".to_string()));
        }

        if self.batch_size == 0 {
            return Err(Error::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Batch size exceeds maximum of {}",
                MAX_BATCH_SIZE
            )));
        }

        if let Some(encryption) = &self.encryption {
            if encryption.public_key.trim().is_empty() {
                return Err(Error::Config(
                    "Encryption enabled but no public key provided".to_string(),
                ));
            }
            if encryption.version <= 0 {
                return Err(Error::Config(format!(
                    "Encryption version must be positive, got {}",
                    encryption.version
                )));
            }
        }

        Ok(())
    }

    /// Instance settings handed to the backend for the default instance.
    pub fn instance_config(&self) -> InstanceConfig {
        let mut config = InstanceConfig::new(&self.app_id, &self.server_url)
            .with_mode(self.mode)
            .with_log(self.enable_log)
            .with_time_zone(&self.time_zone)
            .with_sdk_version(&self.sdk_version);
        if let Some(encryption) = &self.encryption {
            config = config.with_encryption(encryption.clone());
        }
        config
    }
}

/// Builder for [`AnalyticsConfig`].
#[derive(Debug, Default)]
pub struct AnalyticsConfigBuilder {
    app_id: Option<String>,
    server_url: Option<String>,
    mode: AnalyticsMode,
    enable_log: bool,
    time_zone: String,
    encryption: Option<EncryptionConfig>,
    batch_size: Option<usize>,
    sdk_version: Option<String>,
}

impl AnalyticsConfigBuilder {
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    pub fn mode(mut self, mode: AnalyticsMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn enable_log(mut self, enable: bool) -> Self {
        self.enable_log = enable;
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityMissing`] when the app id or server url was never
    /// set, [`Error::Config`] when a value fails validation.
    pub fn build(self) -> Result<AnalyticsConfig> {
        let app_id = self.app_id.ok_or_else(|| Error::CapabilityMissing {
            capability: "app_id".to_string(),
            message: "An app id is required to initialize the default instance. \
                      Set `app_id` in the settings asset or call `.app_id(..)` on the builder."
                .to_string(),
        })?;

        let server_url = self.server_url.ok_or_else(|| Error::CapabilityMissing {
            capability: "server_url".to_string(),
            message: "A receiver url is required to initialize the default instance. \
                      Set `server_url` in the settings asset or call `.server_url(..)` on the builder."
                .to_string(),
        })?;

        let config = AnalyticsConfig {
            app_id,
            server_url,
            mode: self.mode,
            enable_log: self.enable_log,
            time_zone: self.time_zone,
            encryption: self.encryption,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            sdk_version: self
                .sdk_version
                .unwrap_or_else(|| SDK_VERSION.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    server_url: String,
    #[serde(default)]
    mode: AnalyticsMode,
    #[serde(default)]
    enable_log: bool,
    #[serde(default)]
    time_zone: String,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    encrypt: Option<EncryptSettings>,
}

#[derive(Debug, Deserialize)]
struct EncryptSettings {
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    public_key: String,
    #[serde(default)]
    version: i32,
    symmetric_algorithm: Option<String>,
    asymmetric_algorithm: Option<String>,
}
