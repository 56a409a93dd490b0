//! TCP header overlay (RFC 793).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Source Port          |       Destination Port        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Data |       |C|E|U|A|P|R|S|F|                               |
//! | Offset| Rsrvd |W|C|R|C|S|S|Y|I|            Window             |
//! |       |       |R|E|G|K|H|T|N|N|                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |         Urgent Pointer        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::checksum;
use crate::ipv4::{Ipv4Packet, IPPROTO_TCP};
use netsift_types::bytes::{read_u16, read_u32, write_u16, write_u32};
use std::fmt;
use tracing::trace;

/// Length of a TCP header without options.
pub const TCP_MIN_HEADER_LEN: usize = 20;

const SRC_PORT: usize = 0;
const DST_PORT: usize = 2;
const SEQ: usize = 4;
const ACK: usize = 8;
const DATA_OFFSET: usize = 12;
const FLAGS: usize = 13;
const WINDOW: usize = 14;
const CHECKSUM: usize = 16;
const URGENT: usize = 18;

/// The TCP control bits byte.
///
/// ```
/// use netsift_packet::TcpFlags;
///
/// let mut flags = TcpFlags::SYN;
/// flags.add(TcpFlags::ACK);
/// assert!(flags.is_set(TcpFlags::SYN | TcpFlags::ACK));
/// assert!(flags.is_set_only(TcpFlags::SYN | TcpFlags::ACK));
/// flags.remove(TcpFlags::SYN);
/// assert!(!flags.is_set_any(TcpFlags::SYN | TcpFlags::RST));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const URG: TcpFlags = TcpFlags(0x20);
    pub const ECE: TcpFlags = TcpFlags(0x40);
    pub const CWR: TcpFlags = TcpFlags(0x80);

    pub const fn empty() -> Self {
        TcpFlags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        TcpFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit in `mask` is set.
    pub const fn is_set(self, mask: TcpFlags) -> bool {
        self.0 & mask.0 == mask.0
    }

    /// True when at least one bit in `mask` is set.
    pub const fn is_set_any(self, mask: TcpFlags) -> bool {
        self.0 & mask.0 != 0
    }

    /// True when exactly the bits in `mask` are set and nothing else.
    pub const fn is_set_only(self, mask: TcpFlags) -> bool {
        self.0 == mask.0
    }

    pub fn add(&mut self, mask: TcpFlags) {
        self.0 |= mask.0;
    }

    pub fn remove(&mut self, mask: TcpFlags) {
        self.0 &= !mask.0;
    }

    /// Replaces all bits with `mask`.
    pub fn set(&mut self, mask: TcpFlags) {
        self.0 = mask.0;
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(TcpFlags, &str); 8] = [
            (TcpFlags::FIN, "FIN"),
            (TcpFlags::SYN, "SYN"),
            (TcpFlags::RST, "RST"),
            (TcpFlags::PSH, "PSH"),
            (TcpFlags::ACK, "ACK"),
            (TcpFlags::URG, "URG"),
            (TcpFlags::ECE, "ECE"),
            (TcpFlags::CWR, "CWR"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.is_set(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// Zero-copy view of a TCP segment inside an IPv4 packet.
#[derive(Debug, Clone, Copy)]
pub struct TcpPacket<B> {
    ip: Ipv4Packet<B>,
    offset: usize,
    valid: bool,
}

impl<B: AsRef<[u8]>> TcpPacket<B> {
    /// Overlays Ethernet + IPv4 + TCP headers on a frame starting at `eth_offset`.
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
        TcpPacket { ip, offset, valid }
    }

    fn check(ip: &Ipv4Packet<B>, offset: usize) -> bool {
        if ip.protocol() != IPPROTO_TCP {
            trace!(protocol = ip.protocol(), "not a tcp segment");
            return false;
        }
        let bytes = ip.bytes();
        let available = bytes.len().saturating_sub(offset);
        if available < TCP_MIN_HEADER_LEN {
            trace!(offset, available, "tcp header truncated");
            return false;
        }
        let header_len = usize::from(bytes[offset + DATA_OFFSET] >> 4) * 4;
        if header_len < TCP_MIN_HEADER_LEN || header_len > available {
            trace!(header_len, available, "tcp data offset out of range");
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

    /// Offset of the TCP header inside the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn src_port(&self) -> u16 {
        read_u16(self.bytes(), self.offset + SRC_PORT)
    }

    pub fn dst_port(&self) -> u16 {
        read_u16(self.bytes(), self.offset + DST_PORT)
    }

    pub fn seq(&self) -> u32 {
        read_u32(self.bytes(), self.offset + SEQ)
    }

    pub fn ack(&self) -> u32 {
        read_u32(self.bytes(), self.offset + ACK)
    }

    /// Data offset in 32-bit words (high nibble of byte 12).
    pub fn data_offset(&self) -> u8 {
        self.bytes()[self.offset + DATA_OFFSET] >> 4
    }

    /// TCP header length in bytes, options included.
    pub fn header_len(&self) -> usize {
        usize::from(self.data_offset()) * 4
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_bits(self.bytes()[self.offset + FLAGS])
    }

    pub fn is_set(&self, mask: TcpFlags) -> bool {
        self.flags().is_set(mask)
    }

    pub fn is_set_any(&self, mask: TcpFlags) -> bool {
        self.flags().is_set_any(mask)
    }

    pub fn is_set_only(&self, mask: TcpFlags) -> bool {
        self.flags().is_set_only(mask)
    }

    pub fn window(&self) -> u16 {
        read_u16(self.bytes(), self.offset + WINDOW)
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.bytes(), self.offset + CHECKSUM)
    }

    pub fn urgent_ptr(&self) -> u16 {
        read_u16(self.bytes(), self.offset + URGENT)
    }

    /// IPv4 header length plus TCP header length.
    pub fn headers_len(&self) -> usize {
        self.ip.header_len() + self.header_len()
    }

    /// Segment length (TCP header + data) as declared by the IPv4 header.
    pub fn segment_len(&self) -> usize {
        self.ip.payload_len()
    }

    /// Declared payload length: IPv4 total length minus both headers.
    pub fn payload_len(&self) -> usize {
        usize::from(self.ip.total_len()).saturating_sub(self.headers_len())
    }

    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len()
    }

    /// Captured payload bytes, clamped to the buffer.
    pub fn payload(&self) -> &[u8] {
        let bytes = self.bytes();
        let start = self.payload_offset().min(bytes.len());
        let end = start.saturating_add(self.payload_len()).min(bytes.len());
        &bytes[start..end]
    }

    /// Computes the checksum over pseudo header, header and payload,
    /// treating the stored checksum field as zero.
    pub fn calculate_checksum(&self) -> u16 {
        checksum::finish(self.sum(Some(CHECKSUM)))
    }

    /// Checksum including the stored field; 0 when the stored value is correct.
    pub fn checksum_residue(&self) -> u16 {
        checksum::finish(self.sum(None))
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.checksum_residue() == 0
    }

    fn sum(&self, skip: Option<usize>) -> u32 {
        let length = self.segment_len();
        let bytes = self.bytes();
        let end = self.offset.saturating_add(length).min(bytes.len());
        let segment = &bytes[self.offset..end];
        checksum::combine(
            self.ip.pseudo_header_sum(length as u16),
            checksum::sum_words(segment, skip),
        )
    }

    fn bytes(&self) -> &[u8] {
        self.ip.bytes()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TcpPacket<B> {
    pub fn ip_mut(&mut self) -> &mut Ipv4Packet<B> {
        &mut self.ip
    }

    pub fn set_src_port(&mut self, port: u16) {
        let at = self.offset + SRC_PORT;
        write_u16(self.bytes_mut(), at, port);
    }

    pub fn set_dst_port(&mut self, port: u16) {
        let at = self.offset + DST_PORT;
        write_u16(self.bytes_mut(), at, port);
    }

    pub fn set_seq(&mut self, seq: u32) {
        let at = self.offset + SEQ;
        write_u32(self.bytes_mut(), at, seq);
    }

    pub fn set_ack(&mut self, ack: u32) {
        let at = self.offset + ACK;
        write_u32(self.bytes_mut(), at, ack);
    }

    pub fn set_flags(&mut self, flags: TcpFlags) {
        let at = self.offset + FLAGS;
        self.bytes_mut()[at] = flags.bits();
    }

    pub fn add_flags(&mut self, mask: TcpFlags) {
        let mut flags = self.flags();
        flags.add(mask);
        self.set_flags(flags);
    }

    pub fn remove_flags(&mut self, mask: TcpFlags) {
        let mut flags = self.flags();
        flags.remove(mask);
        self.set_flags(flags);
    }

    pub fn set_window(&mut self, window: u16) {
        let at = self.offset + WINDOW;
        write_u16(self.bytes_mut(), at, window);
    }

    pub fn set_checksum(&mut self, value: u16) {
        let at = self.offset + CHECKSUM;
        write_u16(self.bytes_mut(), at, value);
    }

    pub fn set_urgent_ptr(&mut self, ptr: u16) {
        let at = self.offset + URGENT;
        write_u16(self.bytes_mut(), at, ptr);
    }

    /// Recomputes the checksum and writes it into the header.
    pub fn update_checksum(&mut self) -> u16 {
        let value = self.calculate_checksum();
        self.set_checksum(value);
        value
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.ip.bytes_mut()
    }
}

impl<B: AsRef<[u8]>> fmt::Display for TcpPacket<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("invalid tcp segment");
        }
        write!(
            f,
            "{}:{}-{}:{} len={} header={} protocol=TCP flags={} payload={}",
            self.ip.src_ip(),
            self.src_port(),
            self.ip.dst_ip(),
            self.dst_port(),
            self.ip.total_len(),
            self.headers_len(),
            self.flags(),
            self.payload_len()
        )
    }
}
