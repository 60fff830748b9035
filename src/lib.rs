//! HTTP-framing-aware TCP relay.
//!
//! Sits between a local client and a remote HTTP endpoint, reassembles
//! whole HTTP messages (or whole chunks) in each direction, rewrites their
//! payloads and repairs the framing, and drops to raw passthrough once a
//! stream upgrades to a multiplexed protocol.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod rewrite;

pub use config::RelayConfig;
pub use error::{PipeError, RelayError, TlsError};
pub use lifecycle::Shutdown;
pub use observability::logging::{Logger, NullLogger, TracingLogger};
pub use relay::{ProxySession, SessionOptions, SessionStats};
