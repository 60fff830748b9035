//! Payload rewrite rules plugged into sessions.
//!
//! # Data Flow
//! ```text
//! config [rewrite] / CLI flags
//!     → pattern.rs (match observer, replace hook)   → Hooks
//!     → paths.rs (drive-path translation)           → Transforms
//!     → SessionOptions, shared by every session
//! ```

pub mod paths;
pub mod pattern;

pub use paths::{PathTranslator, DEFAULT_MOUNT_ROOT};
pub use pattern::{matcher, replacer, PatternError};
