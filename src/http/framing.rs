//! Framing detection for partially received HTTP messages.
//!
//! # Responsibilities
//! - Decide whether the bytes buffered so far hold one complete message
//! - Tell the caller when the body is chunk-encoded so it can switch to chunk tracking
//!
//! # Design Decisions
//! - Heads are parsed with `httparse`; an incomplete or invalid head is "not yet"
//! - Body completeness compares the declared length against every body byte
//!   buffered so far, however many reads it took

const MAX_HEADERS: usize = 100;

/// How the body of a parsed head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLength {
    Fixed(usize),
    Chunked,
    /// Response without length: body runs until the connection closes.
    UntilClose,
}

/// Parsed head: its length in bytes and the body framing it declares.
#[derive(Debug, Clone, Copy)]
struct Head {
    len: usize,
    body: BodyLength,
}

/// Decide whether `buffered` holds a complete message.
///
/// Returns `(complete, is_chunked)`. `(true, true)` only means the head is
/// complete and the body is chunked; the caller must track chunks itself.
pub fn is_complete(buffered: &[u8], is_request: bool) -> (bool, bool) {
    let head = if is_request {
        parse_request_head(buffered)
    } else {
        parse_response_head(buffered)
    };
    let Some(head) = head else {
        return (false, false);
    };

    match head.body {
        BodyLength::Chunked => (true, true),
        BodyLength::UntilClose => (true, false),
        BodyLength::Fixed(declared) => {
            (declared <= buffered.len() - head.len, false)
        }
    }
}

fn parse_request_head(buf: &[u8]) -> Option<Head> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut slots);
    let len = match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) | Err(_) => return None,
    };
    let body = declared_body(req.headers)?.unwrap_or(BodyLength::Fixed(0));
    Some(Head { len, body })
}

fn parse_response_head(buf: &[u8]) -> Option<Head> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut slots);
    let len = match res.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) | Err(_) => return None,
    };
    let status = res.code.unwrap_or(200);
    let body = if (100..200).contains(&status) || status == 204 || status == 304 {
        BodyLength::Fixed(0)
    } else {
        declared_body(res.headers)?.unwrap_or(BodyLength::UntilClose)
    };
    Some(Head { len, body })
}

/// Framing declared by the headers.
///
/// Outer `None`: the headers are unusable (bad Content-Length).
/// Inner `None`: no framing header present.
fn declared_body(headers: &[httparse::Header<'_>]) -> Option<Option<BodyLength>> {
    let chunked = headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case("transfer-encoding")
            && h.value
                .split(|b| *b == b',')
                .any(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"))
    });
    if chunked {
        return Some(Some(BodyLength::Chunked));
    }

    match headers.iter().find(|h| h.name.eq_ignore_ascii_case("content-length")) {
        Some(h) => {
            let value = std::str::from_utf8(h.value).ok()?.trim();
            let len = value.parse::<usize>().ok()?;
            Some(Some(BodyLength::Fixed(len)))
        }
        None => Some(None),
    }
}
