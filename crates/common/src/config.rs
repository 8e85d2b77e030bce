use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FabricError, Result};

/// Network and timing constants for the whole fabric, deserialized from
/// `fabric.toml`. Every field carries a sensible built-in default, so a
/// missing config file (or a missing directory) still produces a working
/// configuration — only a *present but malformed* file is a startup error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub ports: Ports,
    pub liveness: LivenessConfig,
    pub dispatch: DispatchConfig,
    pub client: ClientRetryConfig,
    pub protocol: ProtocolLimits,
    pub worker: WorkerConfig,
    pub monitor: MonitorConfig,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            ports: Ports::default(),
            liveness: LivenessConfig::default(),
            dispatch: DispatchConfig::default(),
            client: ClientRetryConfig::default(),
            protocol: ProtocolLimits::default(),
            worker: WorkerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Monitor-side HTTP port and poll cadence against the Dispatcher/NameService.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub http_port: u16,
    pub poll_interval_secs: u64,
    pub poll_retry_attempts: u32,
    pub poll_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            poll_interval_secs: 2,
            poll_retry_attempts: 1,
            poll_timeout_secs: 1,
        }
    }
}

/// Worker-side registration retry and in-flight task concurrency cap.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub registration_retry_attempts: u32,
    pub registration_retry_interval_secs: u64,
    pub registration_timeout_secs: u64,
    /// Maximum number of `TASK` datagrams handled concurrently by one worker process.
    pub pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            registration_retry_attempts: 5,
            registration_retry_interval_secs: 1,
            registration_timeout_secs: 2,
            pool_size: 16,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Ports {
    pub nameservice: u16,
    pub dispatcher: u16,
    pub worker: u16,
    /// Hostname the NameService is reachable at. Defaults to the service
    /// name used in the fabric's compose network; set to `127.0.0.1` for a
    /// single-host run.
    pub nameservice_host: String,
    /// Hostname the Dispatcher is reachable at, from the Client's and
    /// Worker's point of view.
    pub dispatcher_host: String,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            nameservice: 5001,
            dispatcher: 4000,
            worker: 6000,
            nameservice_host: "nameservice".to_string(),
            dispatcher_host: "dispatcher".to_string(),
        }
    }
}

/// NameService liveness and heartbeat cadence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub heartbeat_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            heartbeat_interval_secs: 10,
        }
    }
}

/// Dispatcher-side worker lookup retry and worker pool sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub lookup_retry_attempts: u32,
    pub lookup_retry_interval_secs: u64,
    pub lookup_timeout_secs: u64,
    pub worker_pool_size: usize,
    /// `None` (the default) means unbounded queue growth.
    pub max_queue_len: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lookup_retry_attempts: 10,
            lookup_retry_interval_secs: 1,
            lookup_timeout_secs: 1,
            worker_pool_size: 16,
            max_queue_len: None,
        }
    }
}

/// Client-side retry policy for `POST_TASK` / `GET_RESULT`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRetryConfig {
    pub retry_attempts: u32,
    pub retry_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientRetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            retry_interval_secs: 1,
            request_timeout_secs: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolLimits {
    pub max_datagram_bytes: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_datagram_bytes: 4096,
        }
    }
}

/// Load configuration from `path`. A missing file yields [`FabricConfig::default`];
/// a file that exists but fails to parse is a loud startup error.
pub fn load_config(path: &Path) -> Result<FabricConfig> {
    if !path.exists() {
        tracing::info!(
            path = %path.display(),
            "No fabric config file found, using built-in defaults"
        );
        return Ok(FabricConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| FabricError::Config(format!("failed to read {}: {e}", path.display())))?;

    let config: FabricConfig = toml::from_str(&content)
        .map_err(|e| FabricError::Config(format!("failed to parse {}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "Loaded fabric configuration");
    Ok(config)
}

/// Resolve the config file path from `FABRIC_CONFIG`, defaulting to `./config/fabric.toml`.
pub fn config_path_from_env() -> std::path::PathBuf {
    std::env::var("FABRIC_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config/fabric.toml"))
}
