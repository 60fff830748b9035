//! Header-block scanning helpers.
//!
//! Everything here is pure and works on raw bytes; nothing assumes the
//! message is valid UTF-8.

use std::ops::Range;

use memchr::memmem;

/// Blank line separating the header block from the payload.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Line terminator used by start lines, headers and chunk-size lines.
pub const CRLF: &[u8] = b"\r\n";

/// Offset of the first payload byte, or `None` while headers are still arriving.
pub fn payload_start(message: &[u8]) -> Option<usize> {
    memmem::find(message, HEADER_TERMINATOR).map(|i| i + HEADER_TERMINATOR.len())
}

/// The header block including its terminating blank line.
///
/// Without a boundary the whole message is returned.
pub fn header_block(message: &[u8]) -> &[u8] {
    match payload_start(message) {
        Some(start) => &message[..start],
        None => message,
    }
}

/// Byte ranges of one `Name: value` line inside a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: Range<usize>,
    /// Value with surrounding whitespace trimmed.
    pub value: Range<usize>,
}

/// Iterates the header lines of a block, skipping the start line.
pub fn header_lines(block: &[u8]) -> HeaderLines<'_> {
    let first_line_end = memchr::memchr(b'\n', block).map_or(block.len(), |i| i + 1);
    HeaderLines {
        block,
        pos: first_line_end,
    }
}

pub struct HeaderLines<'a> {
    block: &'a [u8],
    pos: usize,
}

impl Iterator for HeaderLines<'_> {
    type Item = HeaderLine;

    fn next(&mut self) -> Option<HeaderLine> {
        while self.pos < self.block.len() {
            let start = self.pos;
            let end = memchr::memchr(b'\n', &self.block[start..]).map_or(self.block.len(), |i| start + i);
            self.pos = end + 1;

            let line = &self.block[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                // blank line ends the block
                self.pos = self.block.len();
                return None;
            }
            let Some(colon) = memchr::memchr(b':', line) else {
                continue;
            };
            let value = trim_range(line, colon + 1, line.len());
            return Some(HeaderLine {
                name: start..start + colon,
                value: start + value.start..start + value.end,
            });
        }
        None
    }
}

fn trim_range(line: &[u8], mut from: usize, mut to: usize) -> Range<usize> {
    while from < to && line[from].is_ascii_whitespace() {
        from += 1;
    }
    while to > from && line[to - 1].is_ascii_whitespace() {
        to -= 1;
    }
    from..to
}

/// First header named `name` (case-insensitive).
pub fn find_header(block: &[u8], name: &str) -> Option<HeaderLine> {
    header_lines(block).find(|h| block[h.name.clone()].eq_ignore_ascii_case(name.as_bytes()))
}

/// True if some header `name` has a value containing `needle` (both case-insensitive).
pub fn header_contains(block: &[u8], name: &str, needle: &str) -> bool {
    header_lines(block).any(|h| {
        block[h.name.clone()].eq_ignore_ascii_case(name.as_bytes())
            && contains_ignore_case(&block[h.value.clone()], needle.as_bytes())
    })
}

/// True if the block declares `Transfer-Encoding: chunked`.
pub fn is_chunked_header(block: &[u8]) -> bool {
    header_contains(block, "transfer-encoding", "chunked")
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}
