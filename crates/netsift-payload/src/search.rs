//! Byte-sequence search over payload windows.

use memchr::memmem;
use std::ops::Range;

/// A located value inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub offset: usize,
    pub len: usize,
}

impl Match {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// The matched bytes of `data`; empty if the match lies outside it.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.range()).unwrap_or(&[])
    }
}

/// Finds the first `needle` starting inside `haystack[start..end]`.
///
/// `end` is clamped to the haystack length. Returns the absolute offset.
pub fn index_of(haystack: &[u8], needle: &[u8], start: usize, end: usize) -> Option<usize> {
    let window = haystack.get(start..end.min(haystack.len()))?;
    memmem::find(window, needle).map(|at| start + at)
}

/// Finds the first `byte` inside `haystack[start..end]`.
pub fn index_of_byte(haystack: &[u8], byte: u8, start: usize, end: usize) -> Option<usize> {
    let window = haystack.get(start..end.min(haystack.len()))?;
    memchr::memchr(byte, window).map(|at| start + at)
}

/// Locates the value following `pattern` within `data[..end]`, running up
/// to (not including) the next `\r`.
///
/// `None` when the pattern is absent or the value is not `\r`-terminated.
pub fn find_header_value(data: &[u8], pattern: &[u8], end: usize) -> Option<Match> {
    let at = index_of(data, pattern, 0, end)?;
    let offset = at + pattern.len();
    let stop = index_of_byte(data, b'\r', offset, data.len())?;
    Some(Match {
        offset,
        len: stop - offset,
    })
}
