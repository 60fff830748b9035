//! Accept loop: one `ProxySession` per accepted connection.
//!
//! # Responsibilities
//! - Turn a validated `RelayConfig` into session options and a remote target
//! - Accept connections until shutdown, spawning a session for each
//! - Drain live sessions (bounded) once accepting stops
//!
//! # Design Decisions
//! - Options are built once and shared by every session through an `Arc`
//! - Each spawned session holds its connection permit and tracker guard
//!   until it ends

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::SetupError;
use crate::lifecycle::Shutdown;
use crate::net::connection::SessionTracker;
use crate::net::dial::{DialOptions, RemoteTarget};
use crate::net::listener::{Listener, ListenerError};
use crate::net::tls::TlsTarget;
use crate::observability::logging::Logger;
use crate::relay::hooks::Hooks;
use crate::relay::session::{ProxySession, SessionOptions};
use crate::rewrite::{pattern, PathTranslator};

/// Pause after a failed accept, so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Relays every accepted connection to one remote endpoint.
pub struct RelayServer {
    remote: RemoteTarget,
    options: Arc<SessionOptions>,
    tracker: SessionTracker,
}

impl RelayServer {
    pub fn new(remote: RemoteTarget, options: SessionOptions) -> Self {
        Self {
            remote,
            options: Arc::new(options),
            tracker: SessionTracker::new(),
        }
    }

    /// Build the server from a configuration that already passed validation.
    pub fn from_config(config: &RelayConfig, logger: Arc<dyn Logger>) -> Result<Self, SetupError> {
        Ok(Self::new(remote_target(config)?, session_options(config, logger)?))
    }

    pub fn remote(&self) -> &RemoteTarget {
        &self.remote
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Accept until `shutdown` fires.
    pub async fn run(&self, listener: Listener, shutdown: &Shutdown) -> Result<(), ListenerError> {
        let mut stop = shutdown.subscribe();
        tracing::info!(remote = %self.remote, "Relay accepting connections");

        loop {
            let (stream, peer, permit) = tokio::select! {
                _ = stop.recv() => {
                    tracing::info!("Accept loop stopping");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            let guard = self.tracker.track();
            let session = ProxySession::with_target(
                stream,
                peer,
                self.remote.clone(),
                Arc::clone(&self.options),
            )
            .with_id(guard.id());

            tokio::spawn(async move {
                let _permit = permit;
                match session.start().await {
                    Ok(stats) => tracing::debug!(
                        session_id = %guard.id(),
                        sent = stats.sent,
                        received = stats.received,
                        "Session finished"
                    ),
                    Err(e) => tracing::debug!(session_id = %guard.id(), error = %e, "Session aborted"),
                }
                drop(guard);
            });
        }

        Ok(())
    }

    /// Wait up to `timeout` for live sessions to end. Returns true if all did.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let active = self.tracker.active_count();
        if active == 0 {
            return true;
        }
        tracing::info!(active, timeout_secs = timeout.as_secs(), "Draining sessions");
        let drained = self.tracker.wait_idle(timeout).await;
        if !drained {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline reached, dropping remaining sessions"
            );
        }
        drained
    }
}

/// Remote endpoint described by `[remote]`.
pub fn remote_target(config: &RelayConfig) -> Result<RemoteTarget, SetupError> {
    let remote = &config.remote;
    match &remote.tls {
        Some(tls) => {
            let target = TlsTarget::new(
                remote.address.clone(),
                tls.server_name.as_deref(),
                tls.ca_file.as_deref(),
            )?;
            Ok(RemoteTarget::Tls(target))
        }
        None => remote
            .address
            .parse::<SocketAddr>()
            .map(RemoteTarget::Plain)
            .map_err(|_| SetupError::RemoteAddress(remote.address.clone())),
    }
}

/// Session options described by `[rewrite]`, `[passthrough]` and friends.
pub fn session_options(
    config: &RelayConfig,
    logger: Arc<dyn Logger>,
) -> Result<SessionOptions, SetupError> {
    let rewrite = &config.rewrite;

    let transforms = if rewrite.path_translation {
        PathTranslator::new(&rewrite.mount_root)
            .map_err(SetupError::MountRoot)?
            .into_transforms()
    } else {
        Default::default()
    };

    let hooks = Hooks {
        matcher: rewrite.match_pattern.as_deref().map(pattern::matcher).transpose()?,
        replacer: rewrite.replace_pattern.as_deref().map(pattern::replacer).transpose()?,
    };

    Ok(SessionOptions {
        hooks,
        transforms,
        indicators: config.passthrough.clone(),
        logger,
        dump_hex: config.observability.dump_hex,
        dial: DialOptions {
            connect_timeout: config.remote.connect_timeout(),
            nodelay: config.remote.nodelay,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteTlsConfig;
    use crate::observability::logging::NullLogger;

    #[test]
    fn plain_remote_from_config() {
        let config = RelayConfig::default();
        let target = remote_target(&config).unwrap();
        assert!(matches!(target, RemoteTarget::Plain(addr) if addr.port() == 2376));
    }

    #[test]
    fn tls_remote_from_config() {
        let mut config = RelayConfig::default();
        config.remote.address = "docker.local:2376".into();
        config.remote.tls = Some(RemoteTlsConfig::default());
        let target = remote_target(&config).unwrap();
        assert_eq!(target.to_string(), "tls://docker.local:2376");
    }

    #[test]
    fn unparsable_plain_remote_is_an_error() {
        let mut config = RelayConfig::default();
        config.remote.address = "docker.local:2376".into();
        assert!(matches!(remote_target(&config), Err(SetupError::RemoteAddress(_))));
    }

    #[test]
    fn options_follow_config() {
        let mut config = RelayConfig::default();
        config.remote.connect_timeout_secs = 9;
        config.remote.nodelay = true;
        config.observability.dump_hex = true;
        config.rewrite.replace_pattern = Some("a~b".into());

        let options = session_options(&config, Arc::new(NullLogger)).unwrap();
        assert!(options.transforms.outbound.is_some());
        assert!(options.transforms.inbound.is_some());
        assert!(options.hooks.replacer.is_some());
        assert!(options.hooks.matcher.is_none());
        assert!(options.dump_hex);
        assert!(options.dial.nodelay);
        assert_eq!(options.dial.connect_timeout, Duration::from_secs(9));
    }

    #[test]
    fn path_translation_can_be_disabled() {
        let mut config = RelayConfig::default();
        config.rewrite.path_translation = false;
        let options = session_options(&config, Arc::new(NullLogger)).unwrap();
        assert!(options.transforms.outbound.is_none());
    }

    #[tokio::test]
    async fn trigger_before_run_stops_immediately() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        let server = RelayServer::from_config(&config, Arc::new(NullLogger)).unwrap();
        let listener = Listener::bind(&config.listener).await.unwrap();

        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), server.run(listener, &shutdown))
            .await
            .expect("accept loop ignored an earlier trigger")
            .unwrap();
        assert_eq!(server.tracker().active_count(), 0);
    }

    #[test]
    fn bad_patterns_fail_setup() {
        let mut config = RelayConfig::default();
        config.rewrite.match_pattern = Some("(".into());
        assert!(matches!(
            session_options(&config, Arc::new(NullLogger)),
            Err(SetupError::Pattern(_))
        ));
    }
}
