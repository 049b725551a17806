//! Check-and-launch for the automation server.
//!
//! [`ensure_endpoint`] probes `GET /status`. If the endpoint answers, nothing
//! is spawned. Otherwise it launches the configured server command with its
//! output redirected to a log file, waits the grace period, and checks again
//! until a second grace period runs out.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use gridcheck_core::bootstrap::ensure_endpoint;
//! use gridcheck_core::config::HarnessConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarnessConfig::default();
//! let handle = ensure_endpoint(&config, Path::new("/tmp/appium.log")).await?;
//! println!("spawned: {}", handle.spawned());
//! handle.detach();
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::driver::DriverError;
use crate::webdriver::WebDriverClient;

const DEFAULT_PORT: u16 = 4723;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from starting the automation server.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed to open server log {path}: {source}")]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Endpoint {endpoint} still unreachable after {waited_ms}ms")]
    Unreachable { endpoint: String, waited_ms: u64 },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

// ---------------------------------------------------------------------------
// EndpointHandle
// ---------------------------------------------------------------------------

/// A reachable endpoint, plus the server process if this call started it.
///
/// Dropping the handle kills a server it spawned. Call
/// [`detach`](Self::detach) to leave the server running.
#[derive(Debug)]
pub struct EndpointHandle {
    endpoint: String,
    child: Option<Child>,
    log_path: Option<PathBuf>,
}

impl EndpointHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// True if this handle launched the server.
    pub fn spawned(&self) -> bool {
        self.child.is_some()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Leaves a spawned server running after the handle goes away.
    pub fn detach(mut self) {
        if let Some(child) = self.child.take() {
            info!(pid = ?child.id(), "leaving automation server running");
        }
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            info!(pid = ?child.id(), "stopping automation server");
            let _ = child.start_kill();
        }
    }
}

/// The configured server arguments with `{port}` filled in.
pub fn server_args(config: &HarnessConfig) -> Vec<String> {
    let port = config.endpoint_port().unwrap_or(DEFAULT_PORT).to_string();
    config
        .bootstrap
        .args
        .iter()
        .map(|arg| arg.replace("{port}", &port))
        .collect()
}

/// Makes sure the endpoint answers, launching the server if it doesn't.
pub async fn ensure_endpoint(config: &HarnessConfig, log_path: &Path) -> Result<EndpointHandle, BootstrapError> {
    let client = WebDriverClient::new(&config.endpoint, Duration::from_secs(2))?;
    if client.is_reachable().await {
        debug!(endpoint = %config.endpoint, "endpoint already running");
        return Ok(EndpointHandle {
            endpoint: config.endpoint.clone(),
            child: None,
            log_path: None,
        });
    }

    let child = spawn_server(config, log_path)?;
    let handle = EndpointHandle {
        endpoint: config.endpoint.clone(),
        child: Some(child),
        log_path: Some(log_path.to_path_buf()),
    };

    let grace = Duration::from_millis(config.bootstrap.grace_ms);
    tokio::time::sleep(grace).await;
    wait_for_reachable(&client, grace).await?;
    info!(endpoint = %config.endpoint, pid = ?handle.pid(), "automation server started");
    Ok(handle)
}

fn spawn_server(config: &HarnessConfig, log_path: &Path) -> Result<Child, BootstrapError> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let log_err = |source| BootstrapError::Log {
        path: log_path.to_path_buf(),
        source,
    };
    let stdout = std::fs::File::create(log_path).map_err(log_err)?;
    let stderr = stdout.try_clone().map_err(log_err)?;

    let args = server_args(config);
    info!(command = %config.bootstrap.command, ?args, log = %log_path.display(), "starting automation server");
    Command::new(&config.bootstrap.command)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|source| BootstrapError::Spawn {
            command: config.bootstrap.command.clone(),
            source,
        })
}

/// Polls `GET /status` until it answers or `timeout` passes. Always checks
/// at least once.
pub async fn wait_for_reachable(client: &WebDriverClient, timeout: Duration) -> Result<(), BootstrapError> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if client.is_reachable().await {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            warn!(attempts, endpoint = %client.base_url(), "endpoint did not come up");
            return Err(BootstrapError::Unreachable {
                endpoint: client.base_url().to_string(),
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
