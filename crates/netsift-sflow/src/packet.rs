//! sFlow v5 datagram decoding.
//!
//! ```text
//! datagram {
//!     version        u32   must be 5
//!     address_type   u32   1 = IPv4 (4 bytes), 2 = IPv6 (16 bytes)
//!     agent_address  4 or 16 bytes
//!     sub_agent_id   u32
//!     sequence       u32
//!     uptime         u32   milliseconds
//!     sample_count   u32
//!     sample[sample_count] {
//!         data_format  u32   enterprise:20 | format:12
//!         length       u32
//!         payload      length bytes
//!     }
//! }
//! ```

use crate::config::{DownstreamParity, SflowConfig};
use crate::cursor::Cursor;
use crate::error::{Result, SflowError};
use crate::sample::{split_data_format, SflowFlowSample};
use netsift_packet::UdpPacket;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

pub const SFLOW_VERSION: u32 = 5;

/// Well-known collector port for sFlow datagrams.
pub const SFLOW_PORT: u16 = 6343;

const ADDRESS_TYPE_IPV4: u32 = 1;
const ADDRESS_TYPE_IPV6: u32 = 2;

const FORMAT_FLOW_SAMPLE: u32 = 1;

/// A decoded sFlow datagram.
///
/// Built by [`parse`](Self::parse), which never fails: a datagram that does
/// not decode yields a packet whose [`is_legal`](Self::is_legal) is false and
/// whose [`error`](Self::error) names the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SflowPacket {
    legal: bool,
    error: Option<SflowError>,
    agent_ip: Option<IpAddr>,
    agent_addr: u32,
    sub_agent_id: u32,
    sequence: u32,
    uptime: u32,
    sample_count: u32,
    is_dir_downstream: bool,
    samples: Vec<SflowFlowSample>,
    skipped_samples: u32,
    dropped_samples: u32,
}

impl SflowPacket {
    /// Decodes `datagram[payload_offset..payload_offset + payload_len]`
    /// with the default unstripped-header policy.
    pub fn parse(
        datagram: &[u8],
        payload_offset: usize,
        payload_len: usize,
        parity: DownstreamParity,
    ) -> Self {
        Self::parse_inner(datagram, payload_offset, payload_len, parity, true)
    }

    /// Like [`parse`](Self::parse) with parity and stripping policy taken
    /// from `config`.
    pub fn parse_with_config(
        datagram: &[u8],
        payload_offset: usize,
        payload_len: usize,
        config: &SflowConfig,
    ) -> Self {
        Self::parse_inner(
            datagram,
            payload_offset,
            payload_len,
            config.downstream_parity,
            config.require_unstripped,
        )
    }

    /// Decodes the payload of a UDP overlay.
    pub fn from_udp<B: AsRef<[u8]>>(udp: &UdpPacket<B>, config: &SflowConfig) -> Self {
        Self::parse_with_config(
            udp.ip().ether().buffer(),
            udp.payload_offset(),
            udp.payload_len(),
            config,
        )
    }

    /// Decodes a datagram, returning the failure reason instead of an
    /// illegal packet.
    pub fn try_parse(
        datagram: &[u8],
        payload_offset: usize,
        payload_len: usize,
        config: &SflowConfig,
    ) -> Result<Self> {
        Self::decode(
            datagram,
            payload_offset,
            payload_len,
            config.downstream_parity,
            config.require_unstripped,
        )
    }

    fn parse_inner(
        datagram: &[u8],
        payload_offset: usize,
        payload_len: usize,
        parity: DownstreamParity,
        require_unstripped: bool,
    ) -> Self {
        match Self::decode(
            datagram,
            payload_offset,
            payload_len,
            parity,
            require_unstripped,
        ) {
            Ok(packet) => packet,
            Err(error) => {
                debug!(
                    kind = ?error.kind(),
                    %error,
                    payload_offset,
                    payload_len,
                    "dropping sflow datagram"
                );
                SflowPacket::illegal(error)
            }
        }
    }

    fn illegal(error: SflowError) -> Self {
        SflowPacket {
            legal: false,
            error: Some(error),
            agent_ip: None,
            agent_addr: 0,
            sub_agent_id: 0,
            sequence: 0,
            uptime: 0,
            sample_count: 0,
            is_dir_downstream: false,
            samples: Vec::new(),
            skipped_samples: 0,
            dropped_samples: 0,
        }
    }

    fn decode(
        datagram: &[u8],
        payload_offset: usize,
        payload_len: usize,
        parity: DownstreamParity,
        require_unstripped: bool,
    ) -> Result<Self> {
        let mut cursor = Cursor::new(datagram, payload_offset, payload_len)?;

        let version = cursor.read_u32()?;
        if version != SFLOW_VERSION {
            return Err(SflowError::UnsupportedVersion(version));
        }

        let (agent_ip, agent_addr) = match cursor.read_u32()? {
            ADDRESS_TYPE_IPV4 => {
                let bytes = cursor.read_bytes(4)?;
                let octets = [bytes[0], bytes[1], bytes[2], bytes[3]];
                (IpAddr::V4(Ipv4Addr::from(octets)), u32::from_be_bytes(octets))
            }
            ADDRESS_TYPE_IPV6 => {
                let bytes = cursor.read_bytes(16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes);
                let low = u32::from_be_bytes([octets[12], octets[13], octets[14], octets[15]]);
                (IpAddr::V6(Ipv6Addr::from(octets)), low)
            }
            other => return Err(SflowError::UnknownAddressType(other)),
        };

        let sub_agent_id = cursor.read_u32()?;
        let sequence = cursor.read_u32()?;
        let uptime = cursor.read_u32()?;
        let sample_count = cursor.read_u32()?;

        let mut samples = Vec::new();
        let mut skipped_samples = 0;
        let mut dropped_samples = 0;
        for index in 0..sample_count {
            let (enterprise, format) = split_data_format(cursor.read_u32()?);
            let len = cursor.read_u32()? as usize;
            let mut block = cursor.block(len)?;

            if enterprise != 0 || format != FORMAT_FLOW_SAMPLE {
                skipped_samples += 1;
                continue;
            }
            match SflowFlowSample::decode(&mut block, require_unstripped) {
                Ok(sample) => samples.push(sample),
                Err(error) => {
                    dropped_samples += 1;
                    debug!(
                        %agent_ip,
                        sub_agent_id,
                        index,
                        kind = ?error.kind(),
                        %error,
                        "dropping flow sample"
                    );
                }
            }
        }
        cursor.finish()?;

        Ok(SflowPacket {
            legal: true,
            error: None,
            agent_ip: Some(agent_ip),
            agent_addr,
            sub_agent_id,
            sequence,
            uptime,
            sample_count,
            is_dir_downstream: parity.is_downstream(sub_agent_id),
            samples,
            skipped_samples,
            dropped_samples,
        })
    }

    pub fn is_legal(&self) -> bool {
        self.legal
    }

    /// Why decoding failed, for illegal packets.
    pub fn error(&self) -> Option<&SflowError> {
        self.error.as_ref()
    }

    /// Low 32 bits of the agent address (the whole address for IPv4).
    pub fn agent_addr(&self) -> u32 {
        self.agent_addr
    }

    pub fn agent_ip(&self) -> Option<IpAddr> {
        self.agent_ip
    }

    pub fn sub_agent_id(&self) -> u32 {
        self.sub_agent_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Agent uptime in milliseconds.
    pub fn uptime(&self) -> u32 {
        self.uptime
    }

    /// Sample count declared by the datagram header.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn is_dir_downstream(&self) -> bool {
        self.is_dir_downstream
    }

    /// Successfully decoded flow samples, in datagram order.
    pub fn samples(&self) -> &[SflowFlowSample] {
        &self.samples
    }

    /// Samples of other formats (counter samples, expanded samples, ...).
    pub fn skipped_samples(&self) -> u32 {
        self.skipped_samples
    }

    /// Flow samples that failed to decode.
    pub fn dropped_samples(&self) -> u32 {
        self.dropped_samples
    }
}

impl fmt::Display for SflowPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.agent_ip) {
            (Some(error), _) => write!(f, "illegal sflow datagram: {error}"),
            (None, Some(agent)) => write!(
                f,
                "agent={}/{} seq={} uptime={}ms samples={}/{} {}",
                agent,
                self.sub_agent_id,
                self.sequence,
                self.uptime,
                self.samples.len(),
                self.sample_count,
                if self.is_dir_downstream {
                    "downstream"
                } else {
                    "upstream"
                }
            ),
            (None, None) => f.write_str("illegal sflow datagram"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn push(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn flow_sample_block(header: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for value in [1, 2, 512, 1000, 0, 2, 3, 1] {
            push(&mut body, value);
        }
        let padded = (header.len() + 3) & !3;
        push(&mut body, 1);
        push(&mut body, (16 + padded) as u32);
        push(&mut body, 1);
        push(&mut body, 64);
        push(&mut body, 0);
        push(&mut body, header.len() as u32);
        body.extend_from_slice(header);
        body.resize(body.len() + padded - header.len(), 0);

        let mut block = Vec::new();
        push(&mut block, FORMAT_FLOW_SAMPLE);
        push(&mut block, body.len() as u32);
        block.extend(body);
        block
    }

    fn counter_sample_block() -> Vec<u8> {
        let mut block = Vec::new();
        push(&mut block, 2);
        push(&mut block, 8);
        push(&mut block, 0xdead_beef);
        push(&mut block, 0xcafe_f00d);
        block
    }

    fn datagram(sub_agent_id: u32, blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        push(&mut out, 5);
        push(&mut out, 1);
        out.extend_from_slice(&[192, 0, 2, 1]);
        push(&mut out, sub_agent_id);
        push(&mut out, 42);
        push(&mut out, 360_000);
        push(&mut out, blocks.len() as u32);
        for block in blocks {
            out.extend_from_slice(block);
        }
        out
    }

    fn frame() -> Vec<u8> {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x08, 0x00]);
        frame.extend_from_slice(&[0x45, 0, 0, 20, 0, 0, 0, 0, 64, 17, 0, 0]);
        frame.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
        frame
    }

    #[test]
    fn test_parse_single_flow_sample() {
        let bytes = datagram(1, &[flow_sample_block(&frame())]);
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert!(packet.is_legal());
        assert_eq!(packet.error(), None);
        assert_eq!(packet.agent_ip(), Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))));
        assert_eq!(packet.agent_addr(), 0xc000_0201);
        assert_eq!(packet.sub_agent_id(), 1);
        assert_eq!(packet.sequence(), 42);
        assert_eq!(packet.uptime(), 360_000);
        assert!(packet.is_dir_downstream());
        assert_eq!(packet.samples().len(), 1);
        assert_eq!(packet.samples()[0].header(), &frame()[..]);
        assert_eq!(packet.samples()[0].sampling_rate(), 512);
    }

    #[test]
    fn test_counter_samples_are_skipped() {
        let bytes = datagram(
            2,
            &[counter_sample_block(), flow_sample_block(&frame())],
        );
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert!(packet.is_legal());
        assert!(!packet.is_dir_downstream());
        assert_eq!(packet.sample_count(), 2);
        assert_eq!(packet.skipped_samples(), 1);
        assert_eq!(packet.samples().len(), 1);
    }

    #[test]
    fn test_bad_flow_sample_drops_only_that_sample() {
        let mut bad = flow_sample_block(&frame());
        // record count lives at byte 8 + 28 of the block
        bad[36..40].copy_from_slice(&2u32.to_be_bytes());
        let bytes = datagram(1, &[bad, flow_sample_block(&frame())]);
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert!(packet.is_legal());
        assert_eq!(packet.dropped_samples(), 1);
        assert_eq!(packet.samples().len(), 1);
    }

    #[test]
    fn test_payload_window_inside_larger_buffer() {
        let mut buffer = vec![0xeeu8; 42];
        let body = datagram(1, &[flow_sample_block(&frame())]);
        buffer.extend_from_slice(&body);
        buffer.extend_from_slice(&[0xee; 6]);
        let packet = SflowPacket::parse(&buffer, 42, body.len(), DownstreamParity::Even);
        assert!(packet.is_legal());
        assert!(!packet.is_dir_downstream());
    }

    #[test]
    fn test_wrong_version_is_illegal() {
        let mut bytes = datagram(1, &[]);
        bytes[3] = 4;
        let config = SflowConfig::default();
        assert_eq!(
            SflowPacket::try_parse(&bytes, 0, bytes.len(), &config),
            Err(SflowError::UnsupportedVersion(4))
        );
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert!(!packet.is_legal());
        assert_eq!(packet.error().map(SflowError::kind), Some(ErrorKind::Mismatch));
    }

    #[test]
    fn test_unknown_address_type_is_illegal() {
        let mut bytes = datagram(1, &[]);
        bytes[7] = 3;
        let config = SflowConfig::default();
        assert_eq!(
            SflowPacket::try_parse(&bytes, 0, bytes.len(), &config),
            Err(SflowError::UnknownAddressType(3))
        );
    }

    #[test]
    fn test_ipv6_agent_keeps_low_bits() {
        let mut bytes = Vec::new();
        push(&mut bytes, 5);
        push(&mut bytes, 2);
        bytes.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        for value in [7, 1, 100, 0] {
            push(&mut bytes, value);
        }
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert!(packet.is_legal());
        assert_eq!(packet.agent_addr(), 0x0000_0102);
        assert_eq!(packet.agent_ip().map(|ip| ip.is_ipv6()), Some(true));
    }

    #[test]
    fn test_trailing_bytes_are_inconsistent() {
        let mut bytes = datagram(1, &[flow_sample_block(&frame())]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let config = SflowConfig::default();
        let err = SflowPacket::try_parse(&bytes, 0, bytes.len(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
    }

    #[test]
    fn test_one_byte_short_is_illegal() {
        let bytes = datagram(1, &[flow_sample_block(&frame())]);
        let packet = SflowPacket::parse(&bytes, 0, bytes.len() - 1, DownstreamParity::Odd);
        assert!(!packet.is_legal());
        let packet = SflowPacket::parse(&bytes[..bytes.len() - 1], 0, bytes.len(), DownstreamParity::Odd);
        assert!(!packet.is_legal());
        assert_eq!(packet.error().map(SflowError::kind), Some(ErrorKind::TooShort));
    }

    #[test]
    fn test_display() {
        let bytes = datagram(1, &[flow_sample_block(&frame())]);
        let packet = SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd);
        assert_eq!(
            packet.to_string(),
            "agent=192.0.2.1/1 seq=42 uptime=360000ms samples=1/1 downstream"
        );
        let packet = SflowPacket::parse(&bytes[..4], 0, 4, DownstreamParity::Odd);
        assert!(packet.to_string().starts_with("illegal sflow datagram: "));
    }
}
