//! One relayed connection: dial the remote, run both pipes, tear down.
//!
//! # Responsibilities
//! - Own the local stream and connect the remote side (plain or TLS)
//! - Launch one pipe per direction over shared state
//! - Wait for the shutdown signal, then close both streams
//! - Report final byte counts
//!
//! # Design Decisions
//! - The session never retries; a failed connect is returned to the acceptor
//! - Pipe tasks are aborted by a guard on every exit path, which drops
//!   (and so closes) every stream half

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::{PipeError, RelayError};
use crate::net::connection::SessionId;
use crate::net::dial::{self, DialOptions, RelayStream, RemoteTarget};
use crate::net::tls::TlsTarget;
use crate::observability::logging::{Logger, NullLogger};
use crate::observability::metrics;
use crate::relay::hooks::{Hooks, Transforms, UpgradeIndicators};
use crate::relay::pipe::Pipe;
use crate::relay::state::{
    ByteCounters, Direction, DirectionState, FailureLatch, ShutdownAction, ShutdownSignal,
};

/// Everything a session needs besides its endpoints.
///
/// Shared read-only by every session spawned from one listener.
#[derive(Clone)]
pub struct SessionOptions {
    pub hooks: Hooks,
    pub transforms: Transforms,
    pub indicators: UpgradeIndicators,
    pub logger: Arc<dyn Logger>,
    /// Trace dumps are rendered as hex instead of text.
    pub dump_hex: bool,
    pub dial: DialOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            hooks: Hooks::default(),
            transforms: Transforms::default(),
            indicators: UpgradeIndicators::default(),
            logger: Arc::new(NullLogger),
            dump_hex: false,
            dial: DialOptions::default(),
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("hooks", &self.hooks)
            .field("transforms", &self.transforms)
            .field("indicators", &self.indicators)
            .field("dump_hex", &self.dump_hex)
            .field("dial", &self.dial)
            .finish_non_exhaustive()
    }
}

/// Bytes written to each side over the session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Written to the remote side.
    pub sent: u64,
    /// Written to the local side.
    pub received: u64,
}

/// A relay between one accepted local stream and the remote endpoint.
pub struct ProxySession<L> {
    id: SessionId,
    local: L,
    local_addr: SocketAddr,
    remote: RemoteTarget,
    options: Arc<SessionOptions>,
}

impl<L> ProxySession<L>
where
    L: RelayStream + 'static,
{
    /// Take ownership of `local`; nothing is dialed until [`start`](Self::start).
    pub fn new(
        local: L,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        options: Arc<SessionOptions>,
    ) -> Self {
        Self::with_target(local, local_addr, RemoteTarget::Plain(remote_addr), options)
    }

    /// Like [`new`](Self::new), but the remote side speaks TLS.
    ///
    /// The local side stays plaintext; both pipes see decrypted bytes.
    pub fn with_tls_unwrap(
        local: L,
        local_addr: SocketAddr,
        tls: TlsTarget,
        options: Arc<SessionOptions>,
    ) -> Self {
        Self::with_target(local, local_addr, RemoteTarget::Tls(tls), options)
    }

    pub fn with_target(
        local: L,
        local_addr: SocketAddr,
        remote: RemoteTarget,
        options: Arc<SessionOptions>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            local,
            local_addr,
            remote,
            options,
        }
    }

    /// Use an externally allocated id, so logs line up with the acceptor's.
    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Connect the remote side and relay until the session shuts down.
    pub async fn start(self) -> Result<SessionStats, RelayError> {
        let Self {
            id,
            local,
            local_addr,
            remote,
            options,
        } = self;
        let log = Arc::clone(&options.logger);

        let remote_stream = match dial::connect(&remote, options.dial).await {
            Ok(stream) => stream,
            Err(err) => {
                log.warn(format_args!("{id} remote connection failed: {err}"));
                metrics::record_connect_failure();
                return Err(err);
            }
        };

        log.info(format_args!("{id} opened {local_addr} >>> {remote}"));
        metrics::record_session_opened();

        let state = Arc::new(DirectionState::new());
        let counters = Arc::new(ByteCounters::default());
        let (signal, done) = ShutdownSignal::new();
        let latch = Arc::new(FailureLatch::new(signal));

        let (local_rd, local_wr) = tokio::io::split(local);
        let (remote_rd, remote_wr) = tokio::io::split(remote_stream);

        let outbound = Pipe::new(
            Direction::Outbound,
            local_rd,
            remote_wr,
            Arc::clone(&state),
            Arc::clone(&counters),
            Arc::clone(&options),
        );
        let inbound = Pipe::new(
            Direction::Inbound,
            remote_rd,
            local_wr,
            Arc::clone(&state),
            Arc::clone(&counters),
            Arc::clone(&options),
        );

        let tasks = PipeTasks {
            handles: vec![
                spawn_pipe(id, Direction::Outbound, outbound.run(), Arc::clone(&latch), &log),
                spawn_pipe(id, Direction::Inbound, inbound.run(), latch, &log),
            ],
        };

        // Err means both tasks ended without posting, which only a panic does.
        let _ = done.await;
        tasks.close().await;

        let stats = SessionStats {
            sent: counters.sent(),
            received: counters.received(),
        };
        log.info(format_args!(
            "{id} closed ({} bytes sent, {} bytes received)",
            stats.sent, stats.received
        ));
        metrics::record_session_closed();

        Ok(stats)
    }
}

/// Run one pipe and hand its exit reason to the latch.
fn spawn_pipe<F>(
    id: SessionId,
    direction: Direction,
    run: F,
    latch: Arc<FailureLatch>,
    log: &Arc<dyn Logger>,
) -> JoinHandle<()>
where
    F: std::future::Future<Output = PipeError> + Send + 'static,
{
    let log = Arc::clone(log);
    tokio::spawn(async move {
        let err = run.await;
        let arrow = direction.arrow();
        if err.is_eof() {
            log.info(format_args!("{id} {arrow} {err}"));
        } else {
            log.warn(format_args!("{id} {arrow} {err}"));
        }
        if latch.report(direction, &err) == ShutdownAction::Deferred {
            log.debug(format_args!("{id} {arrow} waiting for the response side to finish"));
        }
    })
}

/// Aborts the pipe tasks when dropped.
struct PipeTasks {
    handles: Vec<JoinHandle<()>>,
}

impl PipeTasks {
    /// Abort both tasks and wait until they have released their streams.
    async fn close(mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Drop for PipeTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn connect_failure_starts_no_pipes() {
        let (_client, local) = duplex(1024);
        let session = ProxySession::new(
            local,
            local_addr(),
            closed_port().await,
            Arc::new(SessionOptions::default()),
        );
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, RelayError::Connect { .. }));
    }

    #[tokio::test]
    async fn relays_request_and_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let backend = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            socket.read_to_end(&mut request).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                .await
                .unwrap();
            request
        });

        let mut options = SessionOptions::default();
        options.transforms.outbound = Some(Arc::new(|p: &[u8]| p.to_ascii_uppercase()));
        let (mut client, local) = duplex(64 * 1024);
        let session = ProxySession::new(local, local_addr(), remote, Arc::new(options));
        let running = tokio::spawn(session.start());

        let request = b"POST /v1 HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody";
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec());

        let seen = backend.await.unwrap();
        assert_eq!(seen, b"POST /v1 HTTP/1.1\r\nContent-Length: 4\r\n\r\nBODY".to_vec());

        let stats = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.sent, request.len() as u64);
        assert_eq!(stats.received, response.len() as u64);
    }

    #[tokio::test]
    async fn remote_reset_tears_down_local() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let (mut client, local) = duplex(1024);
        let session = ProxySession::new(
            local,
            local_addr(),
            remote,
            Arc::new(SessionOptions::default()),
        );
        let stats = tokio::time::timeout(Duration::from_secs(5), session.start())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, SessionStats::default());

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn tls_handshake_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let tls = TlsTarget::new(remote.to_string(), Some("localhost"), None).unwrap();
        let (_client, local) = duplex(1024);
        let session = ProxySession::with_tls_unwrap(
            local,
            local_addr(),
            tls,
            Arc::new(SessionOptions::default()),
        );
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, RelayError::Tls(_)));
    }

    #[test]
    fn explicit_id_is_kept() {
        let (_client, local) = duplex(16);
        let id = SessionId::new();
        let session = ProxySession::new(
            local,
            local_addr(),
            local_addr(),
            Arc::new(SessionOptions::default()),
        )
        .with_id(id);
        assert_eq!(session.id(), id);
    }
}
