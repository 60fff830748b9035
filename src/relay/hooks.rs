//! Injection points for observing and rewriting forwarded units.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::http::headers;
use crate::relay::state::Direction;

/// Read-only observer called once per forwarded unit.
pub type Matcher = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Replaces a whole unit before HTTP-aware editing; any length is allowed.
pub type Replacer = Arc<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>;

/// Maps one payload (or one chunk) to its replacement.
pub type Transform = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Optional per-unit hooks, applied in both directions.
#[derive(Clone, Default)]
pub struct Hooks {
    pub matcher: Option<Matcher>,
    pub replacer: Option<Replacer>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("matcher", &self.matcher.is_some())
            .field("replacer", &self.replacer.is_some())
            .finish()
    }
}

/// Payload transforms, one per direction. `None` leaves payloads untouched.
#[derive(Clone, Default)]
pub struct Transforms {
    pub outbound: Option<Transform>,
    pub inbound: Option<Transform>,
}

impl Transforms {
    pub fn for_direction(&self, direction: Direction) -> Option<&Transform> {
        match direction {
            Direction::Outbound => self.outbound.as_ref(),
            Direction::Inbound => self.inbound.as_ref(),
        }
    }
}

impl fmt::Debug for Transforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transforms")
            .field("outbound", &self.outbound.is_some())
            .field("inbound", &self.inbound.is_some())
            .finish()
    }
}

/// A header whose presence means the stream is leaving HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpgradeIndicator {
    /// Header name, matched case-insensitively.
    pub header: String,
    /// Substring the header value must contain, matched case-insensitively.
    pub value: String,
}

impl UpgradeIndicator {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, header_block: &[u8]) -> bool {
        headers::header_contains(header_block, &self.header, &self.value)
    }
}

/// Upgrade indicators checked after rewriting, per direction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpgradeIndicators {
    pub outbound: Vec<UpgradeIndicator>,
    pub inbound: Vec<UpgradeIndicator>,
}

impl UpgradeIndicators {
    pub fn for_direction(&self, direction: Direction) -> &[UpgradeIndicator] {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    /// True if any indicator for `direction` matches the header block.
    pub fn detect(&self, direction: Direction, header_block: &[u8]) -> bool {
        self.for_direction(direction)
            .iter()
            .any(|i| i.matches(header_block))
    }
}

impl Default for UpgradeIndicators {
    fn default() -> Self {
        Self {
            outbound: vec![UpgradeIndicator::new("Upgrade", "tcp")],
            inbound: vec![
                UpgradeIndicator::new("Content-Type", "application/vnd.docker.raw-stream"),
                UpgradeIndicator::new("Content-Type", "application/vnd.docker.multiplexed-stream"),
            ],
        }
    }
}
