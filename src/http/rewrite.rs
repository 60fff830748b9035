//! Payload rewriting for complete HTTP messages.
//!
//! # Responsibilities
//! - Split a message at the header/payload boundary
//! - Run a caller-supplied transform over the payload
//! - Keep framing valid: re-chunk chunked bodies, repair Content-Length otherwise
//!
//! # Design Decisions
//! - Each chunk is transformed on its own; chunks are never merged
//! - Only the header block is searched for Content-Length, so body text that
//!   looks like a header is never touched
//! - Malformed framing is logged and passed through, never fatal

use memchr::memmem;

use crate::http::chunked::parse_chunk_size;
use crate::http::headers::{self, CRLF};
use crate::observability::logging::Logger;

/// Rewrite the payload of one complete message.
///
/// Messages without a header/payload boundary are returned unchanged.
pub fn edit_http_message(
    message: &[u8],
    transform: &dyn Fn(&[u8]) -> Vec<u8>,
    log: &dyn Logger,
) -> Vec<u8> {
    let Some(start) = headers::payload_start(message) else {
        return message.to_vec();
    };
    let (head, payload) = message.split_at(start);

    let mut edited = Vec::with_capacity(message.len());
    edited.extend_from_slice(head);

    if headers::is_chunked_header(head) {
        edited.extend(edit_chunked_payload(payload, transform, log));
        edited
    } else {
        edited.extend(transform(payload));
        fix_content_length(message.len(), edited, log)
    }
}

/// Transform each chunk of a chunk-encoded payload and re-emit it with a fresh size line.
///
/// The terminal chunk and everything after it are copied verbatim, as is any
/// remainder that is malformed or has not fully arrived.
pub fn edit_chunked_payload(
    payload: &[u8],
    transform: &dyn Fn(&[u8]) -> Vec<u8>,
    log: &dyn Logger,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut pos = 0;

    while pos < payload.len() {
        let rest = &payload[pos..];
        let Some(line_len) = memmem::find(rest, CRLF) else {
            out.extend_from_slice(rest);
            break;
        };
        let Some(size) = parse_chunk_size(&rest[..line_len]) else {
            log.warn(format_args!(
                "malformed chunk size line {:?}, passing remainder through",
                String::from_utf8_lossy(&rest[..line_len])
            ));
            out.extend_from_slice(rest);
            break;
        };
        if size == 0 {
            out.extend_from_slice(rest);
            break;
        }

        let data_start = line_len + CRLF.len();
        let data_end = data_start.saturating_add(size);
        if data_end.saturating_add(CRLF.len()) > rest.len() {
            out.extend_from_slice(rest);
            break;
        }

        let edited = transform(&rest[data_start..data_end]);
        // A zero-size chunk here would end the body early.
        if !edited.is_empty() {
            out.extend_from_slice(format!("{:x}\r\n", edited.len()).as_bytes());
            out.extend_from_slice(&edited);
            out.extend_from_slice(CRLF);
        }
        pos += data_end + CRLF.len();
    }

    out
}

/// Shift the first Content-Length header by the change in message length.
fn fix_content_length(original_len: usize, edited: Vec<u8>, log: &dyn Logger) -> Vec<u8> {
    let delta = edited.len() as i64 - original_len as i64;
    if delta == 0 {
        return edited;
    }

    let Some(line) = headers::find_header(headers::header_block(&edited), "content-length") else {
        return edited;
    };

    let raw = &edited[line.value.clone()];
    let current = match std::str::from_utf8(raw).ok().and_then(|v| v.parse::<i64>().ok()) {
        Some(n) => n,
        None => {
            log.warn(format_args!(
                "non-numeric Content-Length {:?}, assuming 0",
                String::from_utf8_lossy(raw)
            ));
            0
        }
    };
    let updated = (current + delta).max(0).to_string();

    let mut out = Vec::with_capacity(edited.len() + updated.len());
    out.extend_from_slice(&edited[..line.value.start]);
    out.extend_from_slice(updated.as_bytes());
    out.extend_from_slice(&edited[line.value.end..]);
    out
}
