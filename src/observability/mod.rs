//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay core (sessions, pipes):
//!     → logging.rs (Logger port; TracingLogger in the binary)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The core logs through a trait object whose default does nothing
//! - Session ids flow into every session log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
