//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use path_relay::config::RelayConfig;
use path_relay::lifecycle::Shutdown;
use path_relay::net::Listener;
use path_relay::relay::RelayServer;
use path_relay::NullLogger;

/// Upper bound for any single step of a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a one-shot mock backend running `handler` on the first connection.
pub async fn start_backend<F, Fut, T>(handler: F) -> (SocketAddr, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        handler(socket).await
    });
    (addr, task)
}

/// Read one complete, non-chunked HTTP message.
pub async fn read_http_message(socket: &mut TcpStream, is_request: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let (complete, _) = path_relay::http::is_complete(&buf, is_request);
        if complete && !buf.is_empty() {
            return buf;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "peer closed before the message was complete");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// A relay listening on an ephemeral loopback port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub server: Arc<RelayServer>,
    pub task: JoinHandle<()>,
}

/// Start a relay towards `remote` with `tweak` applied to the default config.
pub async fn start_relay(remote: SocketAddr, tweak: impl FnOnce(&mut RelayConfig)) -> TestRelay {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.remote.address = remote.to_string();
    tweak(&mut config);

    let server = Arc::new(RelayServer::from_config(&config, Arc::new(NullLogger)).unwrap());
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let task = {
        let server = Arc::clone(&server);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server.run(listener, &shutdown).await.unwrap();
        })
    };

    TestRelay {
        addr,
        shutdown,
        server,
        task,
    }
}

/// Split a message at the end of its header block.
pub fn split_message(message: &[u8]) -> (&[u8], &[u8]) {
    let pos = message
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator");
    (&message[..pos + 4], &message[pos + 4..])
}

/// A free loopback port nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
