//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::relay::hooks::UpgradeIndicators;
use crate::rewrite::DEFAULT_MOUNT_ROOT;

/// Root configuration for the relay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Local listener (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Remote endpoint every session connects to.
    pub remote: RemoteConfig,

    /// Payload rewrite rules.
    pub rewrite: RewriteConfig,

    /// Headers that switch a session to raw passthrough.
    pub passthrough: UpgradeIndicators,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:2375").
    pub bind_address: String,

    /// Maximum concurrent sessions (backpressure).
    pub max_connections: usize,

    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:2375".to_string(),
            max_connections: 1024,
            nodelay: false,
        }
    }
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote address (`host:port`).
    pub address: String,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Disable Nagle's algorithm on the remote socket.
    pub nodelay: bool,

    /// Present when the remote speaks TLS and the relay should unwrap it.
    pub tls: Option<RemoteTlsConfig>,
}

impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:2376".to_string(),
            connect_timeout_secs: 5,
            nodelay: false,
            tls: None,
        }
    }
}

/// TLS settings towards the remote.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteTlsConfig {
    /// SNI and certificate name; defaults to the host part of the address.
    pub server_name: Option<String>,

    /// Extra trust anchors (PEM).
    pub ca_file: Option<PathBuf>,
}

/// Payload rewrite configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Translate Windows drive paths to mount paths and back.
    pub path_translation: bool,

    /// Where drive letters are mounted on the remote host.
    pub mount_root: String,

    /// Regex whose matches are logged for every forwarded unit.
    pub match_pattern: Option<String>,

    /// `REGEX~REPLACEMENT` applied to every forwarded unit.
    pub replace_pattern: Option<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            path_translation: true,
            mount_root: DEFAULT_MOUNT_ROOT.to_string(),
            match_pattern: None,
            replace_pattern: None,
        }
    }
}

/// Logging and metrics configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter; `RUST_LOG` overrides it.
    pub log_filter: String,

    /// Render trace dumps of forwarded units as hex.
    pub dump_hex: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "path_relay=info".to_string(),
            dump_hex: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
