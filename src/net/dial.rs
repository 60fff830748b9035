//! Outbound connection establishment.
//!
//! # Responsibilities
//! - Dial the remote endpoint over plain TCP or TLS
//! - Enforce the connect timeout
//! - Hand back a type-erased byte stream so sessions treat both alike

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::RelayError;
use crate::net::tls::TlsTarget;

/// Bidirectional byte stream a session can relay.
pub trait RelayStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> RelayStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Boxed remote stream, plain or TLS.
pub type BoxedStream = Box<dyn RelayStream>;

/// Where a session connects to.
#[derive(Debug, Clone)]
pub enum RemoteTarget {
    Plain(SocketAddr),
    /// TLS towards the remote; the local side stays plaintext.
    Tls(TlsTarget),
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteTarget::Plain(addr) => write!(f, "{addr}"),
            RemoteTarget::Tls(target) => write!(f, "tls://{}", target.address()),
        }
    }
}

/// Options applied to every outbound connection.
#[derive(Debug, Clone, Copy)]
pub struct DialOptions {
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on the remote socket.
    pub nodelay: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            nodelay: false,
        }
    }
}

/// Connect to `target`, running the TLS handshake when required.
pub async fn connect(target: &RemoteTarget, options: DialOptions) -> Result<BoxedStream, RelayError> {
    match target {
        RemoteTarget::Plain(addr) => {
            let tcp = tcp_connect(*addr, &addr.to_string(), options).await?;
            Ok(Box::new(tcp))
        }
        RemoteTarget::Tls(tls) => {
            let tcp = tcp_connect(tls.address(), tls.address(), options).await?;
            let stream = tls.handshake(tcp).await?;
            Ok(Box::new(stream))
        }
    }
}

async fn tcp_connect<A: ToSocketAddrs>(
    addr: A,
    label: &str,
    options: DialOptions,
) -> Result<TcpStream, RelayError> {
    let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RelayError::ConnectTimeout {
            addr: label.to_string(),
            timeout: options.connect_timeout,
        })?
        .map_err(|source| RelayError::Connect {
            addr: label.to_string(),
            source,
        })?;

    if options.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(remote = %label, error = %e, "Failed to set TCP_NODELAY");
        }
    }
    Ok(stream)
}
