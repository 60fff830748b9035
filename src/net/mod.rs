//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session id, lifetime tracking)
//!     → relay session
//!         → dial.rs (connect to remote, plain or TLS)
//!         → tls.rs (client handshake, trust anchors)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each session tracked for graceful shutdown
//! - TLS is only used towards the remote; the local side stays plaintext

pub mod connection;
pub mod dial;
pub mod listener;
pub mod tls;

pub use connection::{SessionGuard, SessionId, SessionTracker};
pub use dial::{BoxedStream, DialOptions, RelayStream, RemoteTarget};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use tls::TlsTarget;
