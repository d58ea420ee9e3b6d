//! Device configuration, deserialised from the host's `[device]` table.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use shared::{DEFAULT_STORE_PATH, DEVICE_NAME};
use thiserror::Error;

/// When the counter is loaded from and saved to its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PersistencePolicy {
    /// Load once at registration, save once at deregistration.
    #[serde(rename = "device")]
    DeviceLifetime,
    /// Load on every open, save on every close.
    #[serde(rename = "session")]
    SessionLifetime,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid persistence policy '{0}' (expected \"device\" or \"session\")")]
pub struct InvalidPolicy(pub String);

impl FromStr for PersistencePolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "device" => Ok(PersistencePolicy::DeviceLifetime),
            "session" => Ok(PersistencePolicy::SessionLifetime),
            other => Err(InvalidPolicy(other.into())),
        }
    }
}

impl fmt::Display for PersistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PersistencePolicy::DeviceLifetime => "device",
            PersistencePolicy::SessionLifetime => "session",
        })
    }
}

/// Mirror of the `[device.persistence]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    pub policy: PersistencePolicy,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}
fn default_store_path() -> PathBuf { DEFAULT_STORE_PATH.into() }

/// Mirror of the `[device]` table. Without a `persistence` table the counter
/// lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,
}
fn default_name() -> String { DEVICE_NAME.into() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { name: default_name(), persistence: None }
    }
}
