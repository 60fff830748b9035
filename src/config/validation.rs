//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that addresses parse and rewrite patterns compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayConfig;
use crate::rewrite::{pattern, PathTranslator};

/// One semantic problem, tied to the field that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    // TLS remotes may be dialed by host name; plain remotes must be literal.
    let remote = &config.remote;
    if remote.tls.is_some() {
        if !has_port(&remote.address) {
            errors.push(ValidationError::new(
                "remote.address",
                format!("{:?} must be host:port", remote.address),
            ));
        }
    } else if remote.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "remote.address",
            format!("{:?} is not a socket address", remote.address),
        ));
    }
    if remote.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("remote.connect_timeout_secs", "must be > 0"));
    }
    if let Some(ca_file) = remote.tls.as_ref().and_then(|t| t.ca_file.as_deref()) {
        if !ca_file.is_file() {
            errors.push(ValidationError::new(
                "remote.tls.ca_file",
                format!("{} does not exist", ca_file.display()),
            ));
        }
    }

    let rewrite = &config.rewrite;
    // a path on the remote Linux side, whatever the host platform
    if !rewrite.mount_root.starts_with('/') {
        errors.push(ValidationError::new(
            "rewrite.mount_root",
            format!("{:?} must be an absolute remote path", rewrite.mount_root),
        ));
    } else if let Err(e) = PathTranslator::new(&rewrite.mount_root) {
        errors.push(ValidationError::new("rewrite.mount_root", e.to_string()));
    }
    if let Some(p) = &rewrite.match_pattern {
        if let Err(e) = pattern::matcher(p) {
            errors.push(ValidationError::new("rewrite.match_pattern", e.to_string()));
        }
    }
    if let Some(p) = &rewrite.replace_pattern {
        if let Err(e) = pattern::replacer(p) {
            errors.push(ValidationError::new("rewrite.replace_pattern", e.to_string()));
        }
    }

    for (direction, list) in [
        ("passthrough.outbound", &config.passthrough.outbound),
        ("passthrough.inbound", &config.passthrough.inbound),
    ] {
        if list.iter().any(|i| i.header.trim().is_empty()) {
            errors.push(ValidationError::new(direction, "header name must not be empty"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn has_port(address: &str) -> bool {
    matches!(address.rsplit_once(':'), Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok())
}
