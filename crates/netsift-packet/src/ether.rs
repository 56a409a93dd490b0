//! Ethernet II overlay with optional 802.1Q tag.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     destination mac address                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  destination (con't)          |      source mac address       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     source (con't)                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   ether type or 0x8100        |  TCI (only when tagged)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   ether type (only when tagged)
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use netsift_types::bytes::{read_u16, write_u16};
use netsift_types::{MacAddress, VlanId, VlanTag};
use std::fmt;
use tracing::trace;

/// Length of an untagged Ethernet header.
pub const ETH_HEADER_LEN: usize = 14;

/// Length of an Ethernet header carrying one 802.1Q tag.
pub const ETH_VLAN_HEADER_LEN: usize = 18;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

const DST_MAC: usize = 0;
const SRC_MAC: usize = 6;
const TYPE_OR_TPID: usize = 12;
const TCI: usize = 14;

/// Zero-copy view of an Ethernet frame starting at `offset` inside `buffer`.
///
/// The buffer is borrowed (`&[u8]`) for reading or mutably borrowed
/// (`&mut [u8]`) when header fields are rewritten in place. Field accessors
/// assume [`is_valid`](Self::is_valid) returned true.
#[derive(Debug, Clone, Copy)]
pub struct EtherPacket<B> {
    buffer: B,
    offset: usize,
    header_len: usize,
    has_vlan: bool,
    valid: bool,
}

impl<B: AsRef<[u8]>> EtherPacket<B> {
    /// Overlays an Ethernet header at `offset`. Never fails; check
    /// [`is_valid`](Self::is_valid) before reading fields.
    pub fn new(buffer: B, offset: usize) -> Self {
        let bytes = buffer.as_ref();
        let available = bytes.len().saturating_sub(offset);

        let mut header_len = ETH_HEADER_LEN;
        let mut has_vlan = false;
        let valid = if available < ETH_HEADER_LEN {
            trace!(offset, available, "ethernet header truncated");
            false
        } else if read_u16(bytes, offset + TYPE_OR_TPID) == ETHERTYPE_VLAN {
            has_vlan = true;
            header_len = ETH_VLAN_HEADER_LEN;
            if available < ETH_VLAN_HEADER_LEN {
                trace!(offset, available, "802.1Q tag truncated");
                false
            } else {
                true
            }
        } else {
            true
        };

        EtherPacket {
            buffer,
            offset,
            header_len,
            has_vlan,
            valid,
        }
    }

    /// Returns the overlay only if the header validated.
    pub fn parse(buffer: B, offset: usize) -> Option<Self> {
        let packet = Self::new(buffer, offset);
        packet.valid.then_some(packet)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 14 for untagged frames, 18 when an 802.1Q tag is present.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn has_vlan(&self) -> bool {
        self.has_vlan
    }

    /// Offset of the first byte after the Ethernet header.
    pub fn payload_offset(&self) -> usize {
        self.offset.saturating_add(self.header_len)
    }

    pub fn dst_mac(&self) -> MacAddress {
        self.mac_at(self.offset + DST_MAC)
    }

    pub fn src_mac(&self) -> MacAddress {
        self.mac_at(self.offset + SRC_MAC)
    }

    /// The ether type of the payload, looking past an 802.1Q tag.
    pub fn ether_type(&self) -> u16 {
        read_u16(self.buffer.as_ref(), self.ether_type_offset())
    }

    /// Raw tag control information of the 802.1Q tag.
    pub fn vlan_tci(&self) -> Option<u16> {
        self.has_vlan
            .then(|| read_u16(self.buffer.as_ref(), self.offset + TCI))
    }

    /// Decoded 802.1Q tag (priority, drop eligibility, VID).
    pub fn vlan_tag(&self) -> Option<VlanTag> {
        self.vlan_tci().map(VlanTag::from_tci)
    }

    /// VLAN id of the 802.1Q tag; `None` for untagged and priority-only tags.
    pub fn vlan_id(&self) -> Option<VlanId> {
        self.vlan_tag().and_then(VlanTag::vlan_id)
    }

    /// The whole underlying buffer.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_ref()
    }

    /// Bytes following the Ethernet header up to the end of the buffer.
    pub fn payload(&self) -> &[u8] {
        let bytes = self.buffer.as_ref();
        bytes.get(self.payload_offset()..).unwrap_or(&[])
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }

    fn ether_type_offset(&self) -> usize {
        self.offset + self.header_len - 2
    }

    fn mac_at(&self, at: usize) -> MacAddress {
        let bytes = self.buffer.as_ref();
        MacAddress::from_slice(&bytes[at..]).unwrap_or(MacAddress::ZERO)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> EtherPacket<B> {
    pub fn set_dst_mac(&mut self, mac: MacAddress) {
        let at = self.offset + DST_MAC;
        self.buffer.as_mut()[at..at + MacAddress::LEN].copy_from_slice(mac.as_bytes());
    }

    pub fn set_src_mac(&mut self, mac: MacAddress) {
        let at = self.offset + SRC_MAC;
        self.buffer.as_mut()[at..at + MacAddress::LEN].copy_from_slice(mac.as_bytes());
    }

    /// Rewrites the payload ether type (after the tag on tagged frames).
    pub fn set_ether_type(&mut self, ether_type: u16) {
        let at = self.ether_type_offset();
        write_u16(self.buffer.as_mut(), at, ether_type);
    }

    /// Mutable access to the whole underlying buffer.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut()
    }
}

impl<B: AsRef<[u8]>> fmt::Display for EtherPacket<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("invalid ethernet frame");
        }
        write!(
            f,
            "{}->{} type={:#06x}",
            self.src_mac(),
            self.dst_mac(),
            self.ether_type()
        )?;
        if let Some(tag) = self.vlan_tag() {
            write!(f, " vlan={}", tag.vid)?;
        }
        Ok(())
    }
}
