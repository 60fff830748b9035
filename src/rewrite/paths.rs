//! Drive-path translation between Windows clients and a Linux daemon.
//!
//! Outbound payloads carry JSON-escaped Windows paths such as
//! `"C:\\Users\\me"`; these become `"/mnt/c/Users/me"`. Inbound payloads get
//! the reverse mapping, so the client sees its own paths again.

use std::sync::Arc;

use regex::bytes::{Captures, Regex};

use crate::relay::hooks::{Transform, Transforms};

/// Default mount point of the Windows drives on the Linux side.
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt";

/// A path must be followed by a byte that cannot continue it; that byte is
/// part of the match and copied back unchanged.
const OUTBOUND_PATTERN: &str =
    r#"(?-u)(?P<lead>[", ])(?P<drive>[A-Za-z]):(?P<path>(?:(?:\\\\|/)[\w\-. ]+)+(?:\\\\|/)?[^\\/\w\-. ])"#;

const INBOUND_TAIL: &str = r#"/(?P<drive>[a-z])(?P<path>(?:/[\w\-. ]+)+[^\\/\w\-. ])"#;

/// Compiled regexes for both translation directions.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    mount_root: String,
    outbound: Regex,
    inbound: Regex,
}

impl PathTranslator {
    /// `mount_root` is where drive letters live, e.g. `/mnt` for `/mnt/c`.
    pub fn new(mount_root: &str) -> Result<Self, regex::Error> {
        let mount_root = mount_root.trim_end_matches('/').to_string();
        let inbound = format!("(?-u){}{}", regex::escape(&mount_root), INBOUND_TAIL);
        Ok(Self {
            outbound: Regex::new(OUTBOUND_PATTERN)?,
            inbound: Regex::new(&inbound)?,
            mount_root,
        })
    }

    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    /// `C:\\dir` → `/mnt/c/dir`.
    pub fn to_linux(&self, payload: &[u8]) -> Vec<u8> {
        self.outbound
            .replace_all(payload, |caps: &Captures<'_>| {
                let mut out = Vec::with_capacity(caps[0].len() + self.mount_root.len());
                out.extend_from_slice(&caps["lead"]);
                out.extend_from_slice(self.mount_root.as_bytes());
                out.push(b'/');
                out.extend(caps["drive"].iter().map(u8::to_ascii_lowercase));
                out.extend(replace_bytes(&caps["path"], br"\\", b"/"));
                out
            })
            .into_owned()
    }

    /// `/mnt/c/dir` → `C:\\dir`.
    pub fn to_windows(&self, payload: &[u8]) -> Vec<u8> {
        self.inbound
            .replace_all(payload, |caps: &Captures<'_>| {
                let mut out = Vec::with_capacity(caps[0].len() * 2);
                out.extend(caps["drive"].iter().map(u8::to_ascii_uppercase));
                out.push(b':');
                out.extend(replace_bytes(&caps["path"], b"/", br"\\"));
                out
            })
            .into_owned()
    }

    /// Per-direction transforms for a session.
    pub fn into_transforms(self) -> Transforms {
        let outbound = Arc::new(self);
        let inbound = Arc::clone(&outbound);
        let outbound: Transform = Arc::new(move |p: &[u8]| outbound.to_linux(p));
        let inbound: Transform = Arc::new(move |p: &[u8]| inbound.to_windows(p));
        Transforms {
            outbound: Some(outbound),
            inbound: Some(inbound),
        }
    }
}

fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = memchr::memmem::find(rest, from) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}
