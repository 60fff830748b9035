//! Outbound TLS configuration and handshakes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::TlsError;

/// A TLS-wrapped remote endpoint.
///
/// `address` is dialed as-is; `server_name` drives SNI and certificate checks.
#[derive(Clone)]
pub struct TlsTarget {
    address: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
}

impl std::fmt::Debug for TlsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTarget")
            .field("address", &self.address)
            .field("server_name", &self.server_name)
            .finish()
    }
}

impl TlsTarget {
    /// Build a target for `address` (`host:port`).
    ///
    /// The server name defaults to the host part of the address. Trust
    /// anchors are the platform's native roots plus anything in `ca_file`.
    pub fn new(
        address: impl Into<String>,
        server_name: Option<&str>,
        ca_file: Option<&Path>,
    ) -> Result<Self, TlsError> {
        let address = address.into();
        let name = match server_name {
            Some(name) => name.to_string(),
            None => host_of(&address).to_string(),
        };
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| TlsError::InvalidServerName(name))?;
        let config = client_config(ca_file)?;

        Ok(Self {
            address,
            server_name,
            connector: TlsConnector::from(config),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run the client handshake over an established TCP connection.
    pub async fn handshake(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>, TlsError> {
        self.connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(|source| TlsError::Handshake {
                addr: self.address.clone(),
                source,
            })
    }
}

/// Client configuration trusting the platform roots and an optional PEM bundle.
pub fn client_config(ca_file: Option<&Path>) -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    if let Some(err) = native.errors.first() {
        tracing::warn!(error = %err, "Error loading some native certificates");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");

    if let Some(path) = ca_file {
        let shown = path.display().to_string();
        let file = File::open(path).map_err(|source| TlsError::CaBundle {
            path: shown.clone(),
            source,
        })?;
        let certs = rustls_pemfile::certs(&mut BufReader::new(file))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| TlsError::CaBundle {
                path: shown.clone(),
                source,
            })?;
        let (added, _ignored) = roots.add_parsable_certificates(certs);
        if added == 0 {
            return Err(TlsError::EmptyCaBundle(shown));
        }
        tracing::debug!(path = %shown, added, "Loaded extra CA certificates");
    }

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::Config(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Host part of `host:port`, with IPv6 brackets removed.
fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}
