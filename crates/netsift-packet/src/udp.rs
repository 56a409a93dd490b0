//! UDP header overlay (RFC 768).

use crate::checksum;
use crate::ipv4::{Ipv4Packet, IPPROTO_UDP};
use netsift_types::bytes::{read_u16, write_u16};
use std::fmt;
use tracing::trace;

pub const UDP_HEADER_LEN: usize = 8;

const SRC_PORT: usize = 0;
const DST_PORT: usize = 2;
const LENGTH: usize = 4;
const CHECKSUM: usize = 6;

/// Zero-copy view of a UDP datagram inside an IPv4 packet.
#[derive(Debug, Clone, Copy)]
pub struct UdpPacket<B> {
    ip: Ipv4Packet<B>,
    offset: usize,
    valid: bool,
}

impl<B: AsRef<[u8]>> UdpPacket<B> {
    /// Overlays Ethernet + IPv4 + UDP headers on a frame starting at `eth_offset`.
    pub fn new(buffer: B, eth_offset: usize) -> Self {
        Self::from_ip(Ipv4Packet::new(buffer, eth_offset))
    }

    pub fn parse(buffer: B, eth_offset: usize) -> Option<Self> {
        let packet = Self::new(buffer, eth_offset);
        packet.valid.then_some(packet)
    }

    /// Continues validation from an already constructed IPv4 overlay.
    pub fn from_ip(ip: Ipv4Packet<B>) -> Self {
        let offset = if ip.is_valid() {
            ip.payload_offset()
        } else {
            ip.offset()
        };
        let valid = ip.is_valid() && Self::check(&ip, offset);
        UdpPacket { ip, offset, valid }
    }

    fn check(ip: &Ipv4Packet<B>, offset: usize) -> bool {
        if ip.protocol() != IPPROTO_UDP {
            trace!(protocol = ip.protocol(), "not a udp datagram");
            return false;
        }
        let available = ip.bytes().len().saturating_sub(offset);
        if available < UDP_HEADER_LEN {
            trace!(offset, available, "udp header truncated");
            return false;
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ip(&self) -> &Ipv4Packet<B> {
        &self.ip
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn src_port(&self) -> u16 {
        read_u16(self.bytes(), self.offset + SRC_PORT)
    }

    pub fn dst_port(&self) -> u16 {
        read_u16(self.bytes(), self.offset + DST_PORT)
    }

    /// Length field: header plus payload.
    pub fn length(&self) -> u16 {
        read_u16(self.bytes(), self.offset + LENGTH)
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.bytes(), self.offset + CHECKSUM)
    }

    pub fn headers_len(&self) -> usize {
        self.ip.header_len() + UDP_HEADER_LEN
    }

    pub fn payload_offset(&self) -> usize {
        self.offset + UDP_HEADER_LEN
    }

    /// Declared payload length from the UDP length field.
    pub fn payload_len(&self) -> usize {
        usize::from(self.length()).saturating_sub(UDP_HEADER_LEN)
    }

    /// Captured payload bytes, clamped to the buffer.
    pub fn payload(&self) -> &[u8] {
        let bytes = self.bytes();
        let start = self.payload_offset().min(bytes.len());
        let end = start.saturating_add(self.payload_len()).min(bytes.len());
        &bytes[start..end]
    }

    /// Computes the checksum over pseudo header, header and payload.
    ///
    /// A computed value of zero is returned as `0xffff`, since zero on the
    /// wire means "no checksum".
    pub fn calculate_checksum(&self) -> u16 {
        match checksum::finish(self.sum(Some(CHECKSUM))) {
            0 => 0xffff,
            value => value,
        }
    }

    /// Checksum including the stored field; 0 when the stored value is correct.
    pub fn checksum_residue(&self) -> u16 {
        checksum::finish(self.sum(None))
    }

    /// True when the checksum matches or the sender left it unset.
    pub fn is_checksum_valid(&self) -> bool {
        self.checksum() == 0 || self.checksum_residue() == 0
    }

    fn sum(&self, skip: Option<usize>) -> u32 {
        let length = self.length();
        let bytes = self.bytes();
        let end = self.offset.saturating_add(usize::from(length)).min(bytes.len());
        let datagram = &bytes[self.offset..end];
        checksum::combine(
            self.ip.pseudo_header_sum(length),
            checksum::sum_words(datagram, skip),
        )
    }

    fn bytes(&self) -> &[u8] {
        self.ip.bytes()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> UdpPacket<B> {
    pub fn ip_mut(&mut self) -> &mut Ipv4Packet<B> {
        &mut self.ip
    }

    pub fn set_src_port(&mut self, port: u16) {
        let at = self.offset + SRC_PORT;
        write_u16(self.ip.bytes_mut(), at, port);
    }

    pub fn set_dst_port(&mut self, port: u16) {
        let at = self.offset + DST_PORT;
        write_u16(self.ip.bytes_mut(), at, port);
    }

    pub fn set_length(&mut self, length: u16) {
        let at = self.offset + LENGTH;
        write_u16(self.ip.bytes_mut(), at, length);
    }

    pub fn set_checksum(&mut self, value: u16) {
        let at = self.offset + CHECKSUM;
        write_u16(self.ip.bytes_mut(), at, value);
    }

    /// Recomputes the checksum and writes it into the header.
    pub fn update_checksum(&mut self) -> u16 {
        let value = self.calculate_checksum();
        self.set_checksum(value);
        value
    }
}

impl<B: AsRef<[u8]>> fmt::Display for UdpPacket<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("invalid udp datagram");
        }
        write!(
            f,
            "{}:{}-{}:{} len={} header={} protocol=UDP payload={}",
            self.ip.src_ip(),
            self.src_port(),
            self.ip.dst_ip(),
            self.dst_port(),
            self.ip.total_len(),
            self.headers_len(),
            self.payload_len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipv4::IPPROTO_TCP;
    use pretty_assertions::assert_eq;

    /// Ethernet + IPv4 + UDP (DNS-ish) with a 5-byte payload.
    fn datagram() -> Vec<u8> {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x08, 0x00]);
        frame.extend_from_slice(&[
            0x45, 0x00, 0x00, 0x21, // total len 33
            0x00, 0x01, 0x00, 0x00, //
            0x40, 0x11, 0x00, 0x00, // ttl 64, udp
            192, 168, 1, 10, //
            8, 8, 8, 8, //
        ]);
        frame.extend_from_slice(&[
            0xd4, 0x31, 0x00, 0x35, // 54321 -> 53
            0x00, 0x0d, 0x00, 0x00, // length 13, no checksum
        ]);
        frame.extend_from_slice(b"hello");
        frame
    }

    #[test]
    fn test_header_fields() {
        let frame = datagram();
        let udp = UdpPacket::new(&frame[..], 0);
        assert!(udp.is_valid());
        assert_eq!(udp.src_port(), 54321);
        assert_eq!(udp.dst_port(), 53);
        assert_eq!(udp.length(), 13);
        assert_eq!(udp.payload_len(), 5);
        assert_eq!(udp.payload(), b"hello");
        assert_eq!(udp.headers_len(), 28);
        assert!(udp.is_checksum_valid());
    }

    #[test]
    fn test_checksum_roundtrip_with_odd_payload() {
        let mut frame = datagram();
        let mut udp = UdpPacket::new(&mut frame[..], 0);
        let written = udp.update_checksum();
        assert_eq!(udp.checksum(), written);
        assert_eq!(udp.checksum_residue(), 0);
        udp.set_dst_port(5353);
        assert!(!udp.is_checksum_valid());
    }

    #[test]
    fn test_protocol_mismatch_is_invalid() {
        let mut frame = datagram();
        frame[23] = IPPROTO_TCP;
        assert!(!UdpPacket::new(&frame[..], 0).is_valid());
    }

    #[test]
    fn test_truncated_header_is_invalid() {
        let frame = datagram();
        assert!(!UdpPacket::new(&frame[..40], 0).is_valid());
        assert!(UdpPacket::parse(&frame[..42], 0).is_some());
    }

    #[test]
    fn test_display() {
        let frame = datagram();
        let udp = UdpPacket::new(&frame[..], 0);
        assert_eq!(
            udp.to_string(),
            "192.168.1.10:54321-8.8.8.8:53 len=33 header=28 protocol=UDP payload=5"
        );
    }
}
