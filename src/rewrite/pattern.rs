//! User-supplied match and replace rules.
//!
//! `--match REGEX` logs every occurrence in forwarded units.
//! `--replace REGEX~REPLACEMENT` rewrites units before HTTP-aware editing;
//! the replacement may reference groups as `$1` or `${name}`.

use std::sync::Arc;

use regex::bytes::Regex;
use thiserror::Error;

use crate::relay::hooks::{Matcher, Replacer};

/// Separates the regex from its replacement.
pub const REPLACE_SEPARATOR: char = '~';

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("replace rule {0:?} must have the form REGEX~REPLACEMENT")]
    MissingSeparator(String),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// Observer that logs each match of `pattern`.
pub fn matcher(pattern: &str) -> Result<Matcher, PatternError> {
    let re = Regex::new(pattern)?;
    Ok(Arc::new(move |unit: &[u8]| {
        for (i, m) in re.find_iter(unit).enumerate() {
            tracing::info!(
                pattern = %re.as_str(),
                "Match #{}: {}",
                i + 1,
                String::from_utf8_lossy(m.as_bytes())
            );
        }
    }))
}

/// Split a `REGEX~REPLACEMENT` rule at its first separator.
pub fn split_rule(rule: &str) -> Result<(&str, &str), PatternError> {
    rule.split_once(REPLACE_SEPARATOR)
        .ok_or_else(|| PatternError::MissingSeparator(rule.to_string()))
}

/// Rewrite hook replacing every match of the rule's regex.
pub fn replacer(rule: &str) -> Result<Replacer, PatternError> {
    let (pattern, replacement) = split_rule(rule)?;
    let re = Regex::new(pattern)?;
    let replacement = replacement.as_bytes().to_vec();
    Ok(Arc::new(move |unit: Vec<u8>| {
        if !re.is_match(&unit) {
            return unit;
        }
        re.replace_all(&unit, replacement.as_slice()).into_owned()
    }))
}
