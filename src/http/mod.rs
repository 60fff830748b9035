//! HTTP framing subsystem.
//!
//! # Data Flow
//! ```text
//! Bytes accumulated by a session pipe
//!     → framing.rs (is the head complete? chunked or fixed length?)
//!     → chunked.rs (has the terminal chunk arrived?)
//!     → rewrite.rs (transform payload, repair framing)
//!     → Forwarded unit
//! ```
//!
//! # Design Decisions
//! - Best-effort HTTP/1.1 only: no trailers, no HTTP/2
//! - All functions are pure; logging goes through the `Logger` port
//! - Header scanning lives in headers.rs and is shared by every stage

pub mod chunked;
pub mod framing;
pub mod headers;
pub mod rewrite;

pub use chunked::{is_last_chunk_complete, scan_chunks, ChunkScan};
pub use framing::is_complete;
pub use rewrite::{edit_chunked_payload, edit_http_message};
