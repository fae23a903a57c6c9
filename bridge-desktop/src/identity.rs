//! Identity persistence on the local filesystem
//!
//! Stores the device id once per data directory and the distinct/account ids
//! once per app id, as small JSON documents. Writes go through a temporary
//! file and a rename so a crash never leaves a half-written document.

use bridge_traits::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredIdentity {
    pub distinct_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDevice {
    device_id: String,
}

/// File-backed identity store rooted at one directory.
#[derive(Debug, Clone)]
pub(crate) struct IdentityStore {
    dir: PathBuf,
}

impl IdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_device_id(&self) -> Result<Option<String>> {
        Ok(read_json::<StoredDevice>(&self.device_path())?.map(|d| d.device_id))
    }

    pub fn save_device_id(&self, device_id: &str) -> Result<()> {
        write_json(
            &self.device_path(),
            &StoredDevice {
                device_id: device_id.to_string(),
            },
        )
    }

    pub fn load_identity(&self, app_id: &str) -> Result<Option<StoredIdentity>> {
        read_json(&self.identity_path(app_id))
    }

    pub fn save_identity(&self, app_id: &str, identity: &StoredIdentity) -> Result<()> {
        write_json(&self.identity_path(app_id), identity)
    }

    fn device_path(&self) -> PathBuf {
        self.dir.join("device.json")
    }

    fn identity_path(&self, app_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.identity.json", file_stem_for(app_id)))
    }
}

/// Reduce an app id to characters that are safe in a file name on every
/// desktop OS.
pub(crate) fn file_stem_for(app_id: &str) -> String {
    let stem: String = app_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "default".to_string()
    } else {
        stem
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                BridgeError::OperationFailed(format!(
                    "Corrupt identity file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BridgeError::Io(e)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;

    debug!(path = ?path, "Persisted identity document");
    Ok(())
}
