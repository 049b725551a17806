//! Persistent configuration for gridcheck.
//!
//! Settings live in `~/.gridcheck/config.json`. Every field has a default that
//! matches a local Appium server driving the Sudoku app on a booted iPhone
//! simulator, so a missing file is not an error.
//!
//! # Example
//!
//! ```no_run
//! use gridcheck_core::config::HarnessConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = HarnessConfig::load();
//! println!("Endpoint: {}", config.endpoint);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controls::Difficulty;

const CONFIG_FILENAME: &str = "config.json";

/// Returns the gridcheck home directory (`~/.gridcheck/`).
///
/// Creates the directory if it doesn't exist.
pub fn gridcheck_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".gridcheck");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Errors raised when an explicitly requested config file can't be used.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Session capabilities sent when opening an automation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub platform_name: String,
    pub device_name: String,
    /// Device identifier of the simulator or phone.
    pub udid: Option<String>,
    /// Bundle identifier of the app under test.
    pub bundle_id: String,
    pub automation_name: String,
    /// Keep app data between sessions instead of reinstalling.
    pub no_reset: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            platform_name: "iOS".to_string(),
            device_name: "iPhone 17".to_string(),
            udid: None,
            bundle_id: "com.sudoku.app".to_string(),
            automation_name: "XCUITest".to_string(),
            no_reset: true,
        }
    }
}

impl Capabilities {
    /// The W3C `capabilities` body for `POST /session`.
    pub fn to_w3c(&self) -> serde_json::Value {
        let mut always = serde_json::json!({
            "platformName": self.platform_name,
            "appium:deviceName": self.device_name,
            "appium:bundleId": self.bundle_id,
            "appium:automationName": self.automation_name,
            "appium:noReset": self.no_reset,
        });
        if let Some(udid) = &self.udid {
            always["appium:udid"] = serde_json::Value::String(udid.clone());
        }
        serde_json::json!({ "capabilities": { "alwaysMatch": always, "firstMatch": [{}] } })
    }
}

/// How to launch the automation server when it isn't already reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Program to spawn.
    pub command: String,
    /// Arguments; `{port}` is replaced with the endpoint port.
    pub args: Vec<String>,
    /// How long to wait after spawning before re-checking, in milliseconds.
    pub grace_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            command: "appium".to_string(),
            args: vec!["--port".to_string(), "{port}".to_string()],
            grace_ms: 5000,
        }
    }
}

/// Persistent gridcheck configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the WebDriver endpoint.
    pub endpoint: String,
    pub capabilities: Capabilities,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Endpoint-side implicit wait applied to every locate call.
    pub implicit_wait_ms: u64,
    /// Harness-side deadline for resolving one logical control.
    pub locate_timeout_ms: u64,
    /// Pause after every action so transition animations can finish.
    pub settle_ms: u64,
    /// Long-press duration; the app's debug gesture needs at least 2s.
    pub long_press_secs: f64,
    pub poll_interval_ms: u64,
    pub poll_deadline_ms: u64,
    /// Difficulty used when a scenario needs a fresh game.
    pub difficulty: Difficulty,
    /// Root directory for screenshots and page-source dumps.
    pub evidence_dir: PathBuf,
    pub bootstrap: BootstrapConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4723".to_string(),
            capabilities: Capabilities::default(),
            request_timeout_ms: 30_000,
            implicit_wait_ms: 0,
            locate_timeout_ms: 5000,
            settle_ms: 300,
            long_press_secs: 2.5,
            poll_interval_ms: 150,
            poll_deadline_ms: 3000,
            difficulty: Difficulty::Beginner,
            evidence_dir: PathBuf::from("/tmp/gridcheck"),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load config from `~/.gridcheck/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = gridcheck_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit path. Unlike [`load`](Self::load), a
    /// missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Port of the endpoint URL, falling back to the scheme's default.
    /// `None` if the endpoint is not a valid URL.
    pub fn endpoint_port(&self) -> Option<u16> {
        Url::parse(&self.endpoint).ok()?.port_or_known_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_millis(self.poll_deadline_ms)
    }
}
