//! Field extraction from raw HTTP/1.x payload bytes.
//!
//! No message parsing happens here: each accessor searches the payload for
//! an exact header prefix such as `"\nHost: "` and reads the value up to the
//! next `\r`. Header names are matched case-sensitively, in the canonical
//! spelling clients and servers overwhelmingly send.

use crate::search::{find_header_value, index_of, index_of_byte, Match};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of body fingerprinted by [`HttpPayload::stamp`].
pub const STAMP_WINDOW_LEN: usize = 128;

/// Stamp value while headers or the fingerprint window are incomplete.
pub const STAMP_PENDING: u32 = 0;

/// Stamp value for a message that ends right after its headers.
pub const STAMP_HEADER_ONLY: u32 = 0xffff_ffff;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const HOST: &[u8] = b"\nHost: ";
const REFERER: &[u8] = b"\nReferer: ";
const CONTENT_LENGTH: &[u8] = b"\nContent-Length: ";
const CONTENT_RANGE: &[u8] = b"\nContent-Range: ";
const CONTENT_TYPE: &[u8] = b"\nContent-Type: ";
const ETAG: &[u8] = b"\nETag: ";
const ATTACHMENT_FILENAME: &[u8] = b"\nContent-Disposition: Attachment; filename=";
const USER_AGENT: &[u8] = b"\nUser-Agent: ";
const LOCATION: &[u8] = b"\nLocation: ";

const HEADER_END: &[u8] = b"\r\n\r\n";

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9][a-z0-9_-]*(\.[a-z0-9][a-z0-9_-]*)*$")
        .expect("Invalid hostname regex")
});

/// Request methods recognised on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Put,
    Delete,
    Options,
    Connect,
    Trace,
    Patch,
}

impl HttpMethod {
    const ALL: [HttpMethod; 9] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Head,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Connect,
        HttpMethod::Trace,
        HttpMethod::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Matches `"<METHOD> "` at the start of `data`.
    fn from_request_line(data: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|method| {
            let name = method.as_str().as_bytes();
            data.len() > name.len() && data.starts_with(name) && data[name.len()] == b' '
        })
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `Content-Range: bytes from-to/total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    pub from: u64,
    pub to: u64,
    pub total: u64,
}

impl ContentRange {
    /// Parses `"bytes from-to/total"`; an empty `to` means "up to total".
    pub fn parse(value: &[u8]) -> Option<Self> {
        let rest = value.strip_prefix(b"bytes ")?;
        let dash = memchr::memchr(b'-', rest)?;
        let slash = memchr::memchr(b'/', rest)?;
        if slash < dash {
            return None;
        }
        let from = parse_u64(&rest[..dash])?;
        let total = parse_u64(&rest[slash + 1..])?;
        let to = if slash == dash + 1 {
            total
        } else {
            parse_u64(&rest[dash + 1..slash])?
        };
        Some(ContentRange { from, to, total })
    }
}

/// Fingerprint of the first body bytes of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stamp {
    /// Headers incomplete or body shorter than the window
    Pending,
    /// Headers complete and no body bytes follow
    HeaderOnly,
    Fingerprint(u32),
}

impl Stamp {
    /// The 32-bit value: [`STAMP_PENDING`], [`STAMP_HEADER_ONLY`] or the hash.
    pub fn value(self) -> u32 {
        match self {
            Stamp::Pending => STAMP_PENDING,
            Stamp::HeaderOnly => STAMP_HEADER_ONLY,
            Stamp::Fingerprint(hash) => hash,
        }
    }

    pub fn is_pending(self) -> bool {
        self == Stamp::Pending
    }
}

/// 32-bit FNV-1a over `data`.
pub fn fnv1a32(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Borrowed view of the bytes of one HTTP request or response.
#[derive(Debug, Clone, Copy)]
pub struct HttpPayload<'a> {
    data: &'a [u8],
}

impl<'a> HttpPayload<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        HttpPayload { data }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Length of the header block including the terminating blank line.
    pub fn header_len(&self) -> Option<usize> {
        index_of(self.data, HEADER_END, 0, self.data.len()).map(|at| at + HEADER_END.len())
    }

    /// Header lookups stop at the blank line when there is one.
    fn search_end(&self) -> usize {
        self.header_len().unwrap_or(self.data.len())
    }

    fn header(&self, pattern: &[u8]) -> Option<&'a [u8]> {
        find_header_value(self.data, pattern, self.search_end()).map(|found| found.slice(self.data))
    }

    fn header_str(&self, pattern: &[u8]) -> Option<&'a str> {
        self.header(pattern)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn method(&self) -> Option<HttpMethod> {
        HttpMethod::from_request_line(self.data)
    }

    /// Request target of a `GET` or `POST` request line ending in
    /// `" HTTP/1.x"`.
    ///
    /// With `decode`, percent escapes are decoded; a malformed escape or a
    /// non-UTF-8 result falls back to the raw target.
    pub fn url(&self, decode: bool) -> Option<String> {
        let target = self.request_target()?;
        let raw = String::from_utf8_lossy(target.slice(self.data));
        if decode {
            if let Some(decoded) = decode_url(target.slice(self.data)) {
                return Some(decoded);
            }
        }
        Some(raw.into_owned())
    }

    fn request_target(&self) -> Option<Match> {
        let start = match self.method()? {
            HttpMethod::Get => 4,
            HttpMethod::Post => 5,
            _ => return None,
        };
        let line_end = index_of(self.data, b"\r\n", 0, self.data.len())?;
        let line = &self.data[..line_end];
        let version_at = line.len().checked_sub(9)?;
        let version = &line[version_at..];
        if !version.starts_with(b" HTTP/1.") || !version[8].is_ascii_digit() {
            return None;
        }
        if version_at <= start {
            return None;
        }
        Some(Match {
            offset: start,
            len: version_at - start,
        })
    }

    /// `Host` header without `:port`, if it is a well-formed host name.
    pub fn host(&self) -> Option<&'a str> {
        valid_host(strip_port(self.header_str(HOST)?)?)
    }

    /// Raw `Referer` value, usually a full URL. The checked host name is
    /// [`referer_host`](Self::referer_host).
    pub fn referer(&self) -> Option<&'a str> {
        self.header_str(REFERER)
    }

    /// Host part of the `Referer` URL, without scheme, path or port.
    pub fn referer_host(&self) -> Option<&'a str> {
        let referer = self.referer()?;
        let rest = match referer.find("://") {
            Some(at) => &referer[at + 3..],
            None => referer,
        };
        let authority = rest.split(['/', '?', '#']).next()?;
        valid_host(strip_port(authority)?)
    }

    pub fn content_range(&self) -> Option<ContentRange> {
        ContentRange::parse(self.header(CONTENT_RANGE)?)
    }

    pub fn content_range_from(&self) -> Option<u64> {
        self.content_range().map(|range| range.from)
    }

    pub fn content_range_to(&self) -> Option<u64> {
        self.content_range().map(|range| range.to)
    }

    pub fn content_range_total(&self) -> Option<u64> {
        self.content_range().map(|range| range.total)
    }

    pub fn content_length(&self) -> Option<u64> {
        parse_u64(self.header(CONTENT_LENGTH)?)
    }

    pub fn content_type(&self) -> Option<&'a str> {
        self.header_str(CONTENT_TYPE)
    }

    pub fn etag(&self) -> Option<&'a str> {
        self.header_str(ETAG)
    }

    /// File name of an `Attachment` content disposition, unquoted.
    pub fn content_disposition_filename(&self) -> Option<&'a str> {
        let value = self.header_str(ATTACHMENT_FILENAME)?;
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then_some(value)
    }

    pub fn user_agent(&self) -> Option<&'a str> {
        self.header_str(USER_AGENT)
    }

    pub fn location(&self) -> Option<&'a str> {
        self.header_str(LOCATION)
    }

    /// Status code of a response line `"HTTP/x.x NNN "`, if in 200..=599.
    pub fn response_code(&self) -> Option<u16> {
        let line = self.data.get(..13)?;
        let well_formed = line.starts_with(b"HTTP/")
            && line[5].is_ascii_digit()
            && line[6] == b'.'
            && line[7].is_ascii_digit()
            && line[8] == b' '
            && line[9..12].iter().all(u8::is_ascii_digit)
            && line[12] == b' ';
        if !well_formed {
            return None;
        }
        let code = line[9..12]
            .iter()
            .fold(0u16, |code, digit| code * 10 + u16::from(digit - b'0'));
        (200..=599).contains(&code).then_some(code)
    }

    /// Fingerprint of the first [`STAMP_WINDOW_LEN`] body bytes.
    pub fn stamp(&self) -> Stamp {
        self.stamp_with_window(STAMP_WINDOW_LEN)
    }

    pub fn stamp_with_window(&self, window: usize) -> Stamp {
        let Some(header_len) = self.header_len() else {
            return Stamp::Pending;
        };
        let body = &self.data[header_len..];
        if body.is_empty() {
            return Stamp::HeaderOnly;
        }
        if body.len() < window {
            return Stamp::Pending;
        }
        let hash = match fnv1a32(&body[..window]) {
            STAMP_PENDING => 1,
            STAMP_HEADER_ONLY => STAMP_HEADER_ONLY - 1,
            hash => hash,
        };
        Stamp::Fingerprint(hash)
    }
}

/// Decodes percent escapes; `None` on a malformed escape or non-UTF-8 result.
fn decode_url(raw: &[u8]) -> Option<String> {
    let mut at = 0;
    while let Some(percent) = index_of_byte(raw, b'%', at, raw.len()) {
        let escape = raw.get(percent + 1..percent + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        at = percent + 3;
    }
    percent_decode(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Drops a trailing `:port`; `None` when the port is not numeric.
fn strip_port(authority: &str) -> Option<&str> {
    match authority.split_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => Some(host),
        Some(_) => None,
        None => Some(authority),
    }
}

fn valid_host(host: &str) -> Option<&str> {
    HOSTNAME_RE.is_match(host).then_some(host)
}

fn parse_u64(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0u64, |value, digit| {
        value.checked_mul(10)?.checked_add(u64::from(digit - b'0'))
    })
}
