//! Extractors that read protocol fields straight out of TCP payload bytes.
//!
//! - [`tls_host_name`]: SNI host name from a TLS ClientHello
//! - [`HttpPayload`]: request line, status code and selected header values
//!   of an HTTP/1.x message, plus a body [`Stamp`]
//! - [`html_without_urls`]: HTML with `src`/`href` values blanked
//!
//! All extractors borrow the input and return `None` instead of failing on
//! short or malformed bytes.

mod html;
mod http;
pub mod search;
mod tls;

pub use html::{html_without_urls, url_value_ranges, UrlAttrs};
pub use http::{
    fnv1a32, ContentRange, HttpMethod, HttpPayload, Stamp, STAMP_HEADER_ONLY, STAMP_PENDING,
    STAMP_WINDOW_LEN,
};
pub use search::{index_of, Match};
pub use tls::{
    is_client_hello, tls_host_name, CONTENT_TYPE_HANDSHAKE, EXTENSION_SERVER_NAME,
    HANDSHAKE_CLIENT_HELLO, NAME_TYPE_HOST_NAME, TLS_VERSION_1_0, TLS_VERSION_1_1,
};
