//! Relay core: sessions and their per-direction pipes.
//!
//! # Data Flow
//! ```text
//! ProxySession::start
//!     → dial remote (plain or TLS)
//!     → Pipe(outbound): local → remote, requests
//!     → Pipe(inbound):  remote → local, responses
//!     → shared DirectionState (passthrough flag)
//!     → FailureLatch → ShutdownSignal → teardown
//!
//! RelayServer (server.rs): accept loop spawning one session per connection
//! ```
//!
//! # Design Decisions
//! - Two independent tasks per session, no session-level lock
//! - Hooks and the logger are injected through `SessionOptions`
//! - Passthrough is one-way: once raw, always raw

pub mod hooks;
pub mod pipe;
pub mod server;
pub mod session;
pub mod state;

pub use hooks::{Hooks, Matcher, Replacer, Transform, Transforms, UpgradeIndicator, UpgradeIndicators};
pub use pipe::Pipe;
pub use server::RelayServer;
pub use session::{ProxySession, SessionOptions, SessionStats};
pub use state::{ByteCounters, Direction, DirectionState, FailureLatch, ShutdownAction, ShutdownSignal};
