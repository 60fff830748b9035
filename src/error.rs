//! Error types shared across the relay.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::rewrite::PatternError;

/// Errors that abort a session before or while it is set up.
#[derive(Debug, Error)]
pub enum RelayError {
    /// TCP connection to the remote endpoint failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The remote endpoint did not accept the connection in time.
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// TLS setup or handshake with the remote endpoint failed.
    #[error("tls error: {0}")]
    Tls(#[from] TlsError),

    /// Socket level failure not tied to a particular phase.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while preparing or performing the outbound TLS handshake.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("failed to read CA bundle {path}: {source}")]
    CaBundle {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("CA bundle {0} contains no usable certificates")]
    EmptyCaBundle(String),

    #[error("tls configuration rejected: {0}")]
    Config(String),

    #[error("handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Why a session pipe stopped.
///
/// Every pipe ends with one of these; `Eof` is the normal closing path.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("end of stream")]
    Eof,

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl PipeError {
    /// Returns true for a clean end-of-stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, PipeError::Eof)
    }
}

/// Errors turning a validated configuration into a running relay.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid remote address {0:?}")]
    RemoteAddress(String),

    #[error("invalid mount root: {0}")]
    MountRoot(#[source] regex::Error),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}
