//! Cross-layer tests for the packet overlays.

use netsift_packet::{
    checksum, EtherPacket, Ipv4Packet, TcpFlags, TcpPacket, UdpPacket, ETHERTYPE_VLAN,
    IPPROTO_TCP, IPPROTO_UDP,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const SRC: [u8; 4] = [10, 1, 2, 3];
const DST: [u8; 4] = [172, 16, 0, 9];

/// Builds an Ethernet frame (optionally tagged) carrying IPv4 with the given
/// transport header and payload.
fn frame(vlan: Option<u16>, protocol: u8, transport: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x02, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0x02];
    if let Some(vid) = vlan {
        out.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        out.extend_from_slice(&vid.to_be_bytes());
    }
    out.extend_from_slice(&[0x08, 0x00]);

    let total = (20 + transport.len() + payload.len()) as u16;
    out.extend_from_slice(&[0x45, 0x00]);
    out.extend_from_slice(&total.to_be_bytes());
    out.extend_from_slice(&[0x12, 0x34, 0x40, 0x00, 0x40, protocol, 0x00, 0x00]);
    out.extend_from_slice(&SRC);
    out.extend_from_slice(&DST);
    out.extend_from_slice(transport);
    out.extend_from_slice(payload);
    out
}

fn tcp_header() -> [u8; 20] {
    [
        0x30, 0x39, 0x01, 0xbb, // 12345 -> 443
        0x00, 0x00, 0x00, 0x64, // seq 100
        0x00, 0x00, 0x00, 0x00, // ack
        0x50, 0x18, 0x20, 0x00, // offset 5, PSH|ACK, window 8192
        0x00, 0x00, 0x00, 0x00, // checksum, urgent
    ]
}

fn udp_header(payload_len: usize) -> [u8; 8] {
    let len = (8 + payload_len) as u16;
    let [hi, lo] = len.to_be_bytes();
    [0x13, 0x88, 0x18, 0xc7, hi, lo, 0x00, 0x00]
}

#[test]
fn test_vlan_tag_moves_every_layer_by_four_bytes() {
    let payload = b"GET / HTTP/1.1\r\n";
    let plain = frame(None, IPPROTO_TCP, &tcp_header(), payload);
    let tagged = frame(Some(42), IPPROTO_TCP, &tcp_header(), payload);

    let a = TcpPacket::new(&plain[..], 0);
    let b = TcpPacket::new(&tagged[..], 0);
    assert!(a.is_valid() && b.is_valid());
    assert_eq!(a.ip().ether().header_len(), 14);
    assert_eq!(b.ip().ether().header_len(), 18);
    assert_eq!(b.ip().offset(), a.ip().offset() + 4);
    assert_eq!(b.payload_offset(), a.payload_offset() + 4);
    assert_eq!(a.payload(), payload);
    assert_eq!(b.payload(), payload);
    assert_eq!(b.ip().ether().vlan_id().map(|v| v.as_u16()), Some(42));
}

#[test]
fn test_layers_can_be_built_incrementally() {
    let bytes = frame(None, IPPROTO_UDP, &udp_header(3), b"abc");
    let ether = EtherPacket::new(&bytes[..], 0);
    let ip = Ipv4Packet::from_ether(ether);
    assert!(ip.is_valid());
    let udp = UdpPacket::from_ip(ip);
    assert!(udp.is_valid());
    assert_eq!(udp.src_port(), 5000);
    assert_eq!(udp.dst_port(), 6343);
    assert_eq!(udp.payload(), b"abc");
}

#[test]
fn test_protocol_mismatch_invalidates_transport_only() {
    let bytes = frame(None, IPPROTO_UDP, &udp_header(0), b"");
    assert!(Ipv4Packet::new(&bytes[..], 0).is_valid());
    assert!(UdpPacket::new(&bytes[..], 0).is_valid());
    assert!(!TcpPacket::new(&bytes[..], 0).is_valid());
    assert!(TcpPacket::parse(&bytes[..], 0).is_none());
}

#[test]
fn test_non_ipv4_ether_type_invalidates_ip() {
    let mut bytes = frame(None, IPPROTO_TCP, &tcp_header(), b"");
    bytes[12] = 0x86;
    bytes[13] = 0xdd;
    assert!(EtherPacket::new(&bytes[..], 0).is_valid());
    assert!(!Ipv4Packet::new(&bytes[..], 0).is_valid());
    assert!(!TcpPacket::new(&bytes[..], 0).is_valid());
}

#[test]
fn test_rewrite_then_verify_all_checksums() {
    let mut bytes = frame(Some(7), IPPROTO_TCP, &tcp_header(), b"payload!");
    let mut tcp = TcpPacket::new(&mut bytes[..], 0);
    tcp.add_flags(TcpFlags::FIN);
    tcp.set_dst_port(8443);
    tcp.update_checksum();
    tcp.ip_mut().set_ttl(63);
    tcp.ip_mut().update_checksum();

    let tcp = TcpPacket::new(&bytes[..], 0);
    assert!(tcp.ip().is_checksum_valid());
    assert!(tcp.is_checksum_valid());
    assert!(tcp.flags().is_set(TcpFlags::FIN | TcpFlags::ACK));
    assert_eq!(tcp.ip().ttl(), 63);
}

#[test]
fn test_offsets_near_usize_max_are_invalid() {
    let bytes = frame(None, IPPROTO_TCP, &tcp_header(), b"data");
    for offset in [usize::MAX, usize::MAX - 3, usize::MAX - 17] {
        assert!(!TcpPacket::new(&bytes[..], offset).is_valid());
        assert!(!UdpPacket::new(&bytes[..], offset).is_valid());
        assert!(Ipv4Packet::parse(&bytes[..], offset).is_none());
    }
}

proptest! {
    #[test]
    fn prop_checksum_written_then_verified(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = frame(None, IPPROTO_TCP, &tcp_header(), &payload);
        let mut tcp = TcpPacket::new(&mut bytes[..], 0);
        prop_assert!(tcp.is_valid());
        tcp.update_checksum();
        prop_assert_eq!(tcp.checksum_residue(), 0);

        let mut bytes = frame(None, IPPROTO_UDP, &udp_header(payload.len()), &payload);
        let mut udp = UdpPacket::new(&mut bytes[..], 0);
        prop_assert!(udp.is_valid());
        let written = udp.update_checksum();
        prop_assert_ne!(written, 0);
        prop_assert_eq!(udp.checksum_residue(), 0);
    }

    #[test]
    fn prop_internet_checksum_residue_is_zero(mut data in proptest::collection::vec(any::<u8>(), 2..128)) {
        if data.len() % 2 == 1 {
            data.push(0);
        }
        data[0] = 0;
        data[1] = 0;
        let sum = checksum::internet_checksum(&data);
        data[..2].copy_from_slice(&sum.to_be_bytes());
        prop_assert_eq!(checksum::internet_checksum(&data), 0);
    }

    #[test]
    fn prop_overlays_never_panic_on_garbage(
        bytes in proptest::collection::vec(any::<u8>(), 0..96),
        offset in prop_oneof![0usize..100, (usize::MAX - 32)..=usize::MAX],
    ) {
        let _ = EtherPacket::new(&bytes[..], offset).payload_offset();
        let _ = Ipv4Packet::new(&bytes[..], offset).is_valid();
        let tcp = TcpPacket::new(&bytes[..], offset);
        if tcp.is_valid() {
            let _ = tcp.to_string();
            let _ = tcp.payload();
            let _ = tcp.calculate_checksum();
        }
        let udp = UdpPacket::new(&bytes[..], offset);
        if udp.is_valid() {
            let _ = udp.to_string();
            let _ = udp.payload();
            let _ = udp.calculate_checksum();
        }
    }
}
