//! Stripping of URL attribute values from HTML.

use memchr::memmem;
use std::ops::Range;

/// Which URL-carrying attributes to blank out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlAttrs {
    pub src: bool,
    pub href: bool,
}

impl UrlAttrs {
    pub const ALL: UrlAttrs = UrlAttrs {
        src: true,
        href: true,
    };
    pub const SRC: UrlAttrs = UrlAttrs {
        src: true,
        href: false,
    };
    pub const HREF: UrlAttrs = UrlAttrs {
        src: false,
        href: true,
    };

    fn names(self) -> impl Iterator<Item = &'static [u8]> {
        [(self.src, &b"src="[..]), (self.href, &b"href="[..])]
            .into_iter()
            .filter_map(|(enabled, name)| enabled.then_some(name))
    }
}

impl Default for UrlAttrs {
    fn default() -> Self {
        UrlAttrs::ALL
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Byte ranges of quoted attribute values, sorted and non-overlapping.
///
/// An attribute counts when its name is not glued to a preceding word
/// character and `=` is followed directly by `"` or `'`. The range covers
/// the value between the quotes. A value nested inside another value is
/// dropped.
pub fn url_value_ranges(html: &[u8], attrs: UrlAttrs) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    for name in attrs.names() {
        for at in memmem::find_iter(html, name) {
            if at > 0 && is_word_byte(html[at - 1]) {
                continue;
            }
            let quote_at = at + name.len();
            let quote = match html.get(quote_at) {
                Some(&q) if q == b'"' || q == b'\'' => q,
                _ => continue,
            };
            let start = quote_at + 1;
            let Some(len) = html.get(start..).and_then(|rest| memchr::memchr(quote, rest)) else {
                continue;
            };
            if len > 0 {
                ranges.push(start..start + len);
            }
        }
    }

    ranges.sort_unstable_by_key(|range| range.start);
    let mut kept: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match kept.last() {
            Some(last) if range.start < last.end => {}
            _ => kept.push(range),
        }
    }
    kept
}

/// Copies `html` with the values of the selected URL attributes removed,
/// keeping the quotes (`href="http://a/"` becomes `href=""`).
///
/// The output is exactly the input minus the removed value bytes, and
/// applying the function twice gives the same result as applying it once.
pub fn html_without_urls(html: &[u8], attrs: UrlAttrs) -> Vec<u8> {
    let gaps = url_value_ranges(html, attrs);
    let removed: usize = gaps.iter().map(|gap| gap.len()).sum();
    let mut out = Vec::with_capacity(html.len() - removed);
    let mut cursor = 0;
    for gap in gaps {
        out.extend_from_slice(&html[cursor..gap.start]);
        cursor = gap.end;
    }
    out.extend_from_slice(&html[cursor..]);
    out
}
