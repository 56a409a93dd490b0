//! Server Name Indication from a TLS ClientHello.
//!
//! ```text
//! record     content_type(1)=22 version(2) length(2)
//! handshake  msg_type(1)=1 length(3)
//! hello      client_version(2) random(32)
//!            session_id(1+N) cipher_suites(2+N) compression_methods(1+N)
//!            extensions(2+N) { type(2) length(2) data }*
//! sni        server_name_list(2+N) { name_type(1)=0 name(2+N) }*
//! ```

use netsift_types::bytes::{get_u16, get_u24};
use tracing::trace;

pub const CONTENT_TYPE_HANDSHAKE: u8 = 22;
pub const HANDSHAKE_CLIENT_HELLO: u8 = 1;
pub const EXTENSION_SERVER_NAME: u16 = 0;
pub const NAME_TYPE_HOST_NAME: u8 = 0;

pub const TLS_VERSION_1_0: u16 = 0x0301;
pub const TLS_VERSION_1_1: u16 = 0x0302;

const RECORD_HEADER_LEN: usize = 5;
const HANDSHAKE_HEADER_LEN: usize = 4;
const RANDOM_LEN: usize = 32;

/// Length-checked forward reader over one length-delimited block.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    fn u16(&mut self) -> Option<u16> {
        let value = get_u16(self.data, self.pos)?;
        self.pos += 2;
        Some(value)
    }

    fn skip(&mut self, len: usize) -> Option<()> {
        if len > self.remaining() {
            return None;
        }
        self.pos += len;
        Some(())
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if len > self.remaining() {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(bytes)
    }

    /// Block prefixed by a 1-byte length.
    fn vec8(&mut self) -> Option<Reader<'a>> {
        let len = usize::from(self.u8()?);
        self.take(len).map(Reader::new)
    }

    /// Block prefixed by a 2-byte length.
    fn vec16(&mut self) -> Option<Reader<'a>> {
        let len = usize::from(self.u16()?);
        self.take(len).map(Reader::new)
    }
}

/// Returns the handshake body when `buffer[start..]` opens with a
/// ClientHello record.
fn client_hello_body(buffer: &[u8], start: usize) -> Option<&[u8]> {
    let record = buffer.get(start..)?;
    if record.len() < RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN {
        return None;
    }
    if record[0] != CONTENT_TYPE_HANDSHAKE {
        trace!(content_type = record[0], "not a handshake record");
        return None;
    }
    let version = get_u16(record, 1)?;
    if version != TLS_VERSION_1_0 && version != TLS_VERSION_1_1 {
        trace!(version, "unsupported record version");
        return None;
    }
    let record_len = usize::from(get_u16(record, 3)?);
    if record[RECORD_HEADER_LEN] != HANDSHAKE_CLIENT_HELLO {
        return None;
    }
    let handshake_len = get_u24(record, RECORD_HEADER_LEN + 1)? as usize;
    if handshake_len + HANDSHAKE_HEADER_LEN > record_len {
        trace!(handshake_len, record_len, "handshake longer than record");
        return None;
    }
    let body_start = RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN;
    let body_end = (body_start + handshake_len).min(record.len());
    Some(&record[body_start..body_end])
}

/// True when `buffer[start..]` begins with a TLS 1.0/1.1 record carrying a
/// ClientHello whose length fits the record.
pub fn is_client_hello(buffer: &[u8], start: usize) -> bool {
    client_hello_body(buffer, start).is_some()
}

/// Extracts the first host name of the server_name extension of the
/// ClientHello at `buffer[start..]`.
///
/// Every length prefix is checked against the bytes that remain, so short
/// or malformed input yields `None`.
pub fn tls_host_name(buffer: &[u8], start: usize) -> Option<String> {
    let mut hello = Reader::new(client_hello_body(buffer, start)?);
    hello.skip(2 + RANDOM_LEN)?;
    hello.vec8()?; // session id
    hello.vec16()?; // cipher suites
    hello.vec8()?; // compression methods

    let mut extensions = hello.vec16()?;
    while extensions.remaining() > 0 {
        let kind = extensions.u16()?;
        let mut data = extensions.vec16()?;
        if kind != EXTENSION_SERVER_NAME {
            continue;
        }
        let mut names = data.vec16()?;
        while names.remaining() > 0 {
            let name_type = names.u8()?;
            let name = names.vec16()?;
            if name_type == NAME_TYPE_HOST_NAME {
                return std::str::from_utf8(name.data)
                    .ok()
                    .filter(|host| !host.is_empty())
                    .map(str::to_owned);
            }
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn with_len16(out: &mut Vec<u8>, body: &[u8]) {
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
    }

    fn sni_extension(host: &str) -> Vec<u8> {
        let mut entry = vec![NAME_TYPE_HOST_NAME];
        with_len16(&mut entry, host.as_bytes());
        let mut list = Vec::new();
        with_len16(&mut list, &entry);
        let mut ext = EXTENSION_SERVER_NAME.to_be_bytes().to_vec();
        with_len16(&mut ext, &list);
        ext
    }

    fn client_hello(record_version: u16, extensions: &[u8]) -> Vec<u8> {
        let mut hello = vec![0x03, 0x03];
        hello.extend_from_slice(&[0x11; RANDOM_LEN]);
        hello.push(0);
        with_len16(&mut hello, &[0x13, 0x01, 0xc0, 0x2f]);
        hello.extend_from_slice(&[1, 0]);
        with_len16(&mut hello, extensions);

        let mut handshake = vec![HANDSHAKE_CLIENT_HELLO];
        handshake.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
        handshake.extend(hello);

        let mut record = vec![CONTENT_TYPE_HANDSHAKE];
        record.extend_from_slice(&record_version.to_be_bytes());
        with_len16(&mut record, &handshake);
        record
    }

    fn supported_versions() -> Vec<u8> {
        vec![0x00, 0x2b, 0x00, 0x03, 0x02, 0x03, 0x04]
    }

    #[test]
    fn test_extracts_host_name() {
        let mut extensions = supported_versions();
        extensions.extend(sni_extension("example.com"));
        let record = client_hello(TLS_VERSION_1_0, &extensions);
        assert!(is_client_hello(&record, 0));
        assert_eq!(tls_host_name(&record, 0), Some("example.com".to_string()));
    }

    #[test]
    fn test_start_offset() {
        let mut buffer = vec![0xaa; 7];
        buffer.extend(client_hello(TLS_VERSION_1_1, &sni_extension("a.b")));
        assert_eq!(tls_host_name(&buffer, 7), Some("a.b".to_string()));
        assert_eq!(tls_host_name(&buffer, 0), None);
        assert_eq!(tls_host_name(&buffer, 1000), None);
    }

    #[test]
    fn test_without_server_name() {
        let record = client_hello(TLS_VERSION_1_0, &supported_versions());
        assert!(is_client_hello(&record, 0));
        assert_eq!(tls_host_name(&record, 0), None);
    }

    #[test]
    fn test_rejects_other_records() {
        let mut record = client_hello(TLS_VERSION_1_0, &sni_extension("example.com"));
        record[0] = 23;
        assert_eq!(tls_host_name(&record, 0), None);

        let record = client_hello(0x0303, &sni_extension("example.com"));
        assert!(!is_client_hello(&record, 0));

        let mut record = client_hello(TLS_VERSION_1_0, &sni_extension("example.com"));
        record[5] = 2;
        assert_eq!(tls_host_name(&record, 0), None);
    }

    #[test]
    fn test_handshake_longer_than_record() {
        let mut record = client_hello(TLS_VERSION_1_0, &sni_extension("example.com"));
        record[8] = record[8].wrapping_add(1);
        assert!(!is_client_hello(&record, 0));
    }

    #[test]
    fn test_truncated_input_never_panics() {
        let record = client_hello(TLS_VERSION_1_0, &sni_extension("example.com"));
        for len in 0..record.len() {
            assert_eq!(tls_host_name(&record[..len], 0), None, "len {len}");
        }
    }

    #[test]
    fn test_oversized_extension_length() {
        let mut record = client_hello(TLS_VERSION_1_0, &sni_extension("example.com"));
        // server_name extension length sits right after its 2-byte type
        let ext_at = record.len() - sni_extension("example.com").len();
        record[ext_at + 2] = 0xff;
        assert_eq!(tls_host_name(&record, 0), None);
    }
}
