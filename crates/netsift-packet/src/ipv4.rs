//! IPv4 header overlay (RFC 791).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version|  IHL  |Type of Service|          Total Length         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Identification        |Flags|      Fragment Offset    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Time to Live |    Protocol   |         Header Checksum       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Source Address                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Destination Address                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::checksum;
use crate::ether::{EtherPacket, ETHERTYPE_IPV4};
use netsift_types::bytes::{read_u16, read_u32, write_u16, write_u32};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::trace;

/// Length of an IPv4 header without options.
pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_IGMP: u8 = 2;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_GRE: u8 = 47;
pub const IPPROTO_ESP: u8 = 50;
pub const IPPROTO_AH: u8 = 51;
pub const IPPROTO_ICMPV6: u8 = 58;
pub const IPPROTO_SCTP: u8 = 132;

/// "Don't fragment" bit of the 3-bit flags field.
pub const IP_FLAG_DF: u8 = 0b010;
/// "More fragments" bit of the 3-bit flags field.
pub const IP_FLAG_MF: u8 = 0b001;

const VERSION_IHL: usize = 0;
const TOS: usize = 1;
const TOTAL_LEN: usize = 2;
const IDENTIFICATION: usize = 4;
const FLAGS_FRAGMENT: usize = 6;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: usize = 10;
const SRC_ADDR: usize = 12;
const DST_ADDR: usize = 16;

/// Returns the conventional name of an IP protocol number.
pub fn protocol_name(protocol: u8) -> Option<&'static str> {
    match protocol {
        IPPROTO_ICMP => Some("ICMP"),
        IPPROTO_IGMP => Some("IGMP"),
        IPPROTO_TCP => Some("TCP"),
        IPPROTO_UDP => Some("UDP"),
        IPPROTO_GRE => Some("GRE"),
        IPPROTO_ESP => Some("ESP"),
        IPPROTO_AH => Some("AH"),
        IPPROTO_ICMPV6 => Some("ICMPv6"),
        IPPROTO_SCTP => Some("SCTP"),
        _ => None,
    }
}

/// Zero-copy view of an IPv4 header carried in an Ethernet frame.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Packet<B> {
    ether: EtherPacket<B>,
    offset: usize,
    valid: bool,
}

impl<B: AsRef<[u8]>> Ipv4Packet<B> {
    /// Overlays Ethernet + IPv4 headers on a frame starting at `eth_offset`.
    pub fn new(buffer: B, eth_offset: usize) -> Self {
        Self::from_ether(EtherPacket::new(buffer, eth_offset))
    }

    pub fn parse(buffer: B, eth_offset: usize) -> Option<Self> {
        let packet = Self::new(buffer, eth_offset);
        packet.valid.then_some(packet)
    }

    /// Continues validation from an already constructed Ethernet overlay.
    pub fn from_ether(ether: EtherPacket<B>) -> Self {
        let offset = if ether.is_valid() {
            ether.payload_offset()
        } else {
            ether.offset()
        };
        let valid = ether.is_valid() && Self::check(ether.buffer(), ether.ether_type(), offset);
        Ipv4Packet {
            ether,
            offset,
            valid,
        }
    }

    fn check(bytes: &[u8], ether_type: u16, offset: usize) -> bool {
        if ether_type != ETHERTYPE_IPV4 {
            trace!(ether_type, "not an ipv4 frame");
            return false;
        }
        let available = bytes.len().saturating_sub(offset);
        if available < IPV4_MIN_HEADER_LEN {
            trace!(offset, available, "ipv4 header truncated");
            return false;
        }
        let version_ihl = bytes[offset + VERSION_IHL];
        if version_ihl >> 4 != 4 {
            trace!(version = version_ihl >> 4, "unexpected ip version");
            return false;
        }
        let header_len = usize::from(version_ihl & 0x0f) * 4;
        if header_len < IPV4_MIN_HEADER_LEN || header_len > available {
            trace!(header_len, available, "ipv4 header length out of range");
            return false;
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ether(&self) -> &EtherPacket<B> {
        &self.ether
    }

    /// Offset of the IPv4 header inside the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn version(&self) -> u8 {
        self.byte(VERSION_IHL) >> 4
    }

    /// Header length in bytes (IHL × 4).
    pub fn header_len(&self) -> usize {
        usize::from(self.byte(VERSION_IHL) & 0x0f) * 4
    }

    pub fn tos(&self) -> u8 {
        self.byte(TOS)
    }

    pub fn total_len(&self) -> u16 {
        read_u16(self.bytes(), self.offset + TOTAL_LEN)
    }

    pub fn identification(&self) -> u16 {
        read_u16(self.bytes(), self.offset + IDENTIFICATION)
    }

    /// The 3-bit flags field (reserved, DF, MF).
    pub fn flags(&self) -> u8 {
        (read_u16(self.bytes(), self.offset + FLAGS_FRAGMENT) >> 13) as u8
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags() & IP_FLAG_DF != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags() & IP_FLAG_MF != 0
    }

    /// Fragment offset in 8-byte units.
    pub fn fragment_offset(&self) -> u16 {
        read_u16(self.bytes(), self.offset + FLAGS_FRAGMENT) & 0x1fff
    }

    pub fn ttl(&self) -> u8 {
        self.byte(TTL)
    }

    pub fn protocol(&self) -> u8 {
        self.byte(PROTOCOL)
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.bytes(), self.offset + CHECKSUM)
    }

    pub fn src_addr(&self) -> u32 {
        read_u32(self.bytes(), self.offset + SRC_ADDR)
    }

    pub fn dst_addr(&self) -> u32 {
        read_u32(self.bytes(), self.offset + DST_ADDR)
    }

    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src_addr())
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst_addr())
    }

    /// Offset of the first byte after the IPv4 header (options included).
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len()
    }

    /// Declared payload length (total length minus header), never negative.
    pub fn payload_len(&self) -> usize {
        usize::from(self.total_len()).saturating_sub(self.header_len())
    }

    /// Captured payload bytes, clamped to both the declared length and the buffer.
    pub fn payload(&self) -> &[u8] {
        let bytes = self.bytes();
        let start = self.payload_offset().min(bytes.len());
        let end = start.saturating_add(self.payload_len()).min(bytes.len());
        &bytes[start..end]
    }

    /// Computes the header checksum, treating the stored checksum field as zero.
    pub fn calculate_checksum(&self) -> u16 {
        checksum::finish(checksum::sum_words(self.header(), Some(CHECKSUM)))
    }

    /// Checksum over the header including the stored field; 0 when the stored value is correct.
    pub fn checksum_residue(&self) -> u16 {
        checksum::internet_checksum(self.header())
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.checksum_residue() == 0
    }

    /// Sum of the pseudo header used by the transport checksum.
    pub(crate) fn pseudo_header_sum(&self, length: u16) -> u32 {
        checksum::pseudo_header_sum(self.src_addr(), self.dst_addr(), self.protocol(), length)
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.ether.buffer()
    }

    fn header(&self) -> &[u8] {
        &self.bytes()[self.offset..self.offset + self.header_len()]
    }

    fn byte(&self, field: usize) -> u8 {
        self.bytes()[self.offset + field]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Ipv4Packet<B> {
    pub fn ether_mut(&mut self) -> &mut EtherPacket<B> {
        &mut self.ether
    }

    pub fn set_tos(&mut self, tos: u8) {
        self.set_byte(TOS, tos);
    }

    pub fn set_total_len(&mut self, len: u16) {
        let at = self.offset + TOTAL_LEN;
        write_u16(self.bytes_mut(), at, len);
    }

    pub fn set_identification(&mut self, id: u16) {
        let at = self.offset + IDENTIFICATION;
        write_u16(self.bytes_mut(), at, id);
    }

    /// Replaces the 3-bit flags field, leaving the fragment offset untouched.
    pub fn set_flags(&mut self, flags: u8) {
        let at = self.offset + FLAGS_FRAGMENT;
        let word = read_u16(self.bytes(), at);
        let word = (word & 0x1fff) | (u16::from(flags & 0x07) << 13);
        write_u16(self.bytes_mut(), at, word);
    }

    /// Replaces the 13-bit fragment offset, leaving the flags untouched.
    pub fn set_fragment_offset(&mut self, fragment_offset: u16) {
        let at = self.offset + FLAGS_FRAGMENT;
        let word = read_u16(self.bytes(), at);
        let word = (word & 0xe000) | (fragment_offset & 0x1fff);
        write_u16(self.bytes_mut(), at, word);
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.set_byte(TTL, ttl);
    }

    pub fn set_protocol(&mut self, protocol: u8) {
        self.set_byte(PROTOCOL, protocol);
    }

    pub fn set_checksum(&mut self, value: u16) {
        let at = self.offset + CHECKSUM;
        write_u16(self.bytes_mut(), at, value);
    }

    pub fn set_src_addr(&mut self, addr: u32) {
        let at = self.offset + SRC_ADDR;
        write_u32(self.bytes_mut(), at, addr);
    }

    pub fn set_dst_addr(&mut self, addr: u32) {
        let at = self.offset + DST_ADDR;
        write_u32(self.bytes_mut(), at, addr);
    }

    /// Recomputes the header checksum and writes it into the header.
    pub fn update_checksum(&mut self) -> u16 {
        let value = self.calculate_checksum();
        self.set_checksum(value);
        value
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.ether.buffer_mut()
    }

    fn set_byte(&mut self, field: usize, value: u8) {
        let at = self.offset + field;
        self.bytes_mut()[at] = value;
    }
}

impl<B: AsRef<[u8]>> fmt::Display for Ipv4Packet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("invalid ipv4 packet");
        }
        write!(
            f,
            "{}-{} len={} header={} protocol=",
            self.src_ip(),
            self.dst_ip(),
            self.total_len(),
            self.header_len()
        )?;
        match protocol_name(self.protocol()) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.protocol()),
        }
    }
}
