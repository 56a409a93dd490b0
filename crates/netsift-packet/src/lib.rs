//! Zero-copy packet overlays for captured Ethernet frames.
//!
//! Each overlay borrows a caller-owned buffer and records the offsets of the
//! layers it validated. Nothing is copied on construction and construction
//! never fails: a frame that is too short or carries an unexpected ether type
//! or protocol simply yields an overlay whose `is_valid()` is false.
//!
//! - [`EtherPacket`]: Ethernet II header with optional 802.1Q tag
//! - [`Ipv4Packet`]: IPv4 header, composed over an [`EtherPacket`]
//! - [`TcpPacket`] / [`UdpPacket`]: transport headers, composed over an [`Ipv4Packet`]
//! - [`checksum`]: the Internet checksum shared by all three network layers
//!
//! Use `&[u8]` buffers to read and `&mut [u8]` buffers to rewrite header
//! fields and checksums in place:
//!
//! ```
//! use netsift_packet::{TcpFlags, TcpPacket};
//!
//! # let mut frame = vec![0u8; 54];
//! # frame[12] = 0x08; frame[14] = 0x45; frame[17] = 40; frame[23] = 6; frame[46] = 0x50;
//! let mut tcp = TcpPacket::new(&mut frame[..], 0);
//! assert!(tcp.is_valid());
//! tcp.add_flags(TcpFlags::SYN);
//! tcp.update_checksum();
//! assert!(tcp.is_checksum_valid());
//! ```

pub mod checksum;
mod ether;
mod ipv4;
mod tcp;
mod udp;

pub use ether::{
    EtherPacket, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6, ETHERTYPE_VLAN, ETH_HEADER_LEN,
    ETH_VLAN_HEADER_LEN,
};
pub use ipv4::{
    protocol_name, Ipv4Packet, IPPROTO_AH, IPPROTO_ESP, IPPROTO_GRE, IPPROTO_ICMP,
    IPPROTO_ICMPV6, IPPROTO_IGMP, IPPROTO_SCTP, IPPROTO_TCP, IPPROTO_UDP, IPV4_MIN_HEADER_LEN,
    IP_FLAG_DF, IP_FLAG_MF,
};
pub use tcp::{TcpFlags, TcpPacket, TCP_MIN_HEADER_LEN};
pub use udp::{UdpPacket, UDP_HEADER_LEN};
