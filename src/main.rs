//! path-relay
//!
//! Relays a local TCP port to a remote HTTP endpoint (typically a Docker
//! daemon), translating Windows drive paths in request and response bodies.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                  PATH RELAY                   │
//!   Local client      │  ┌──────────┐   ┌───────────────────────┐    │
//!   ──────────────────┼─▶│   net    │──▶│  relay::ProxySession   │    │
//!                     │  │ listener │   │  ┌─────────────────┐  │    │     Remote
//!                     │  └──────────┘   │  │ Pipe (outbound) │──┼────┼──▶  endpoint
//!                     │                 │  │ http framing +  │  │    │   (plain/TLS)
//!   ◀─────────────────┼─────────────────┼──│ Pipe (inbound)  │◀─┼────┼───
//!                     │                 │  └─────────────────┘  │    │
//!                     │                 └───────────────────────┘    │
//!                     │  config · rewrite · observability · lifecycle│
//!                     └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use path_relay::config::{read_config, validate_config, ConfigError, RelayConfig, RemoteTlsConfig};
use path_relay::lifecycle::{spawn_signal_handler, Shutdown};
use path_relay::net::Listener;
use path_relay::observability::{logging, metrics};
use path_relay::relay::RelayServer;
use path_relay::TracingLogger;

/// How long live sessions may keep running after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "path-relay")]
#[command(about = "HTTP-aware TCP relay that translates Windows paths for a remote daemon", long_about = None)]
struct Cli {
    /// TOML configuration file; flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Local address to listen on.
    #[arg(short = 'l', long = "local", value_name = "ADDR")]
    local: Option<String>,

    /// Remote address to relay to.
    #[arg(short = 'r', long = "remote", value_name = "ADDR")]
    remote: Option<String>,

    /// Connect to the remote with TLS and relay plaintext locally.
    #[arg(long)]
    unwrap_tls: bool,

    /// Server name for TLS verification (implies --unwrap-tls).
    #[arg(long, value_name = "NAME")]
    server_name: Option<String>,

    /// Disable Nagle's algorithm on both sides.
    #[arg(short = 'n', long = "nagles")]
    nagles: bool,

    /// Dump forwarded units as hex at trace level.
    #[arg(long)]
    hex: bool,

    /// Log every match of this regex in forwarded units.
    #[arg(long = "match", value_name = "REGEX")]
    match_pattern: Option<String>,

    /// Rewrite forwarded units, e.g. "foo(\d)~bar$1".
    #[arg(long = "replace", value_name = "REGEX~REPL")]
    replace_pattern: Option<String>,

    /// Relay payloads without translating drive paths.
    #[arg(long)]
    no_path_translation: bool,

    /// Raise verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(local) = &self.local {
            config.listener.bind_address = local.clone();
        }
        if let Some(remote) = &self.remote {
            config.remote.address = remote.clone();
        }
        if self.unwrap_tls || self.server_name.is_some() {
            let tls = config.remote.tls.get_or_insert_with(RemoteTlsConfig::default);
            if let Some(name) = &self.server_name {
                tls.server_name = Some(name.clone());
            }
        }
        if self.nagles {
            config.listener.nodelay = true;
            config.remote.nodelay = true;
        }
        if self.hex {
            config.observability.dump_hex = true;
        }
        if let Some(p) = &self.match_pattern {
            config.rewrite.match_pattern = Some(p.clone());
        }
        if let Some(p) = &self.replace_pattern {
            config.rewrite.replace_pattern = Some(p.clone());
        }
        if self.no_path_translation {
            config.rewrite.path_translation = false;
        }
        match self.verbose {
            0 => {}
            1 => config.observability.log_filter = "path_relay=debug".to_string(),
            _ => config.observability.log_filter = "path_relay=trace".to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    logging::init_logging(&config.observability.log_filter);
    tracing::info!("path-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(field = error.field, "{}", error.message);
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        remote = %config.remote.address,
        tls = config.remote.tls.is_some(),
        path_translation = config.rewrite.path_translation,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = RelayServer::from_config(&config, Arc::new(TracingLogger))?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, &shutdown).await?;
    server.drain(DRAIN_TIMEOUT).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
