//! Chunked transfer-encoding boundary tracking.
//!
//! Walks `<hex-size>\r\n<data>\r\n` runs without copying and reports how far
//! the buffered bytes get towards the terminal zero-size chunk.

use memchr::memmem;

use crate::http::headers::{self, CRLF};

/// Outcome of walking the chunks buffered so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkScan {
    /// The zero-size chunk's size line has arrived; `end` is just past it.
    Terminal { end: usize },
    /// The buffer stops inside a chunk's data or its trailing CRLF.
    Incomplete,
    /// Every chunk so far is whole; the size line starting at `offset` has not fully arrived.
    SizeLinePending { offset: usize },
    /// The size line starting at `offset` is not valid hex.
    Malformed { offset: usize },
}

impl ChunkScan {
    /// Collapse into `(complete, terminal_chunk_seen)`.
    ///
    /// A malformed size line counts as terminal: there is nothing more we can
    /// validate, so the caller forwards what it has.
    pub fn as_pair(self) -> (bool, bool) {
        match self {
            ChunkScan::Terminal { .. } | ChunkScan::Malformed { .. } => (true, true),
            ChunkScan::Incomplete => (false, false),
            ChunkScan::SizeLinePending { .. } => (true, false),
        }
    }
}

/// Decide whether the terminating chunk has arrived.
///
/// Returns `(complete, terminal_chunk_seen)`. `(true, false)` means the next
/// size line is still arriving and there is nothing to validate yet.
pub fn is_last_chunk_complete(buffered: &[u8]) -> (bool, bool) {
    scan_chunks(buffered).as_pair()
}

/// Walk the chunks in `buffered`, skipping a response head if present.
///
/// Offsets in the result are relative to `buffered`.
pub fn scan_chunks(buffered: &[u8]) -> ChunkScan {
    let mut pos = if buffered.starts_with(b"HTTP") {
        headers::payload_start(buffered).unwrap_or(0)
    } else {
        0
    };

    loop {
        let rest = &buffered[pos..];
        let Some(line_len) = memmem::find(rest, CRLF) else {
            return ChunkScan::SizeLinePending { offset: pos };
        };
        let Some(size) = parse_chunk_size(&rest[..line_len]) else {
            return ChunkScan::Malformed { offset: pos };
        };

        let data_start = pos + line_len + CRLF.len();
        if size == 0 {
            return ChunkScan::Terminal { end: data_start };
        }

        let next = data_start.saturating_add(size).saturating_add(CRLF.len());
        if next > buffered.len() {
            return ChunkScan::Incomplete;
        }
        pos = next;
    }
}

/// End of the trailer section that follows a terminal size line at `from`.
///
/// The section is either a bare CRLF or trailer fields closed by an empty
/// line. Returns `None` until it has fully arrived.
pub fn trailer_end(buffered: &[u8], from: usize) -> Option<usize> {
    let rest = buffered.get(from..)?;
    if rest.starts_with(CRLF) {
        return Some(from + CRLF.len());
    }
    if rest.len() < CRLF.len() {
        return None;
    }
    memmem::find(rest, b"\r\n\r\n").map(|i| from + i + 4)
}

/// Parse a chunk-size line (without its CRLF). Chunk extensions are ignored.
pub(crate) fn parse_chunk_size(line: &[u8]) -> Option<usize> {
    let digits = match memchr::memchr(b';', line) {
        Some(i) => &line[..i],
        None => line,
    };
    let digits = std::str::from_utf8(digits).ok()?.trim_matches(|c| c == ' ' || c == '\t');
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"4\r\nWiki\r\n6\r\npedia \r\nE\r\nin \r\n\r\nchunks.\r\n0\r\n\r\n";

    #[test]
    fn terminal_only_once_zero_line_arrives() {
        let zero_line_end = BODY.len() - 2;
        for cut in 0..=BODY.len() {
            let (complete, terminal) = is_last_chunk_complete(&BODY[..cut]);
            assert_eq!(terminal, cut >= zero_line_end, "cut at {cut}");
            if terminal {
                assert!(complete);
            }
        }
    }

    #[test]
    fn mid_chunk_prefixes_are_incomplete() {
        // inside "Wiki\r\n"
        for cut in 3..9 {
            assert_eq!(is_last_chunk_complete(&BODY[..cut]), (false, false), "cut at {cut}");
        }
    }

    #[test]
    fn pending_size_line_reports_offset() {
        assert_eq!(scan_chunks(b"4\r\nWiki\r\n"), ChunkScan::SizeLinePending { offset: 9 });
        assert_eq!(scan_chunks(b"4\r\nWiki\r\n6"), ChunkScan::SizeLinePending { offset: 9 });
        assert_eq!(is_last_chunk_complete(b""), (true, false));
    }

    #[test]
    fn response_head_is_skipped() {
        let msg = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n";
        assert_eq!(scan_chunks(msg), ChunkScan::Terminal { end: msg.len() });
    }

    #[test]
    fn trailer_section_must_close() {
        let body = b"3\r\nabc\r\n0\r\n";
        let ChunkScan::Terminal { end } = scan_chunks(body) else {
            panic!("terminal chunk not found");
        };
        assert_eq!(trailer_end(body, end), None);

        let mut closed = body.to_vec();
        closed.push(b'\r');
        assert_eq!(trailer_end(&closed, end), None);
        closed.push(b'\n');
        assert_eq!(trailer_end(&closed, end), Some(closed.len()));

        let trailers = b"0\r\nDigest: abc\r\nExpires: never\r\n\r\n";
        assert_eq!(trailer_end(&trailers[..trailers.len() - 2], 3), None);
        assert_eq!(trailer_end(trailers, 3), Some(trailers.len()));
    }

    #[test]
    fn extensions_and_case() {
        assert_eq!(parse_chunk_size(b"1A;name=value"), Some(26));
        assert_eq!(parse_chunk_size(b"ff "), Some(255));
        assert_eq!(parse_chunk_size(b""), None);
        assert_eq!(parse_chunk_size(b"zz"), None);
    }

    #[test]
    fn malformed_size_line_is_flagged() {
        assert_eq!(scan_chunks(b"3\r\nabc\r\nxyz\r\n"), ChunkScan::Malformed { offset: 8 });
        assert_eq!(is_last_chunk_complete(b"xyz\r\n"), (true, true));
    }

    #[test]
    fn huge_size_does_not_overflow() {
        assert_eq!(scan_chunks(b"ffffffffffffffff\r\nab"), ChunkScan::Incomplete);
    }
}
