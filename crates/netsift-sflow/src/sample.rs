//! Flow sample (enterprise 0, format 1) carrying one raw packet header record.
//!
//! ```text
//! flow_sample {
//!     sequence_number   u32
//!     source_id         u32   type:8 | index:24
//!     sampling_rate     u32
//!     sample_pool       u32
//!     drops             u32
//!     input             u32
//!     output            u32
//!     record_count      u32   must be 1
//!     record {
//!         data_format   u32   enterprise:20 | format:12, must be 0:1
//!         length        u32
//!         protocol      u32   must be 1 (ethernet)
//!         frame_length  u32
//!         stripped      u32
//!         header_length u32
//!         header        header_length bytes, padded to 4
//!     }
//! }
//! ```

use crate::cursor::{xdr_padded, Cursor};
use crate::error::{Result, SflowError};
use netsift_packet::EtherPacket;

/// Header protocol value for Ethernet in a raw packet header record.
pub const HEADER_PROTOCOL_ETHERNET: u32 = 1;

/// Raw packet header flow record format.
pub const FORMAT_RAW_PACKET_HEADER: u32 = 1;

/// Splits a `data_format` word into (enterprise, format).
pub fn split_data_format(word: u32) -> (u32, u32) {
    (word >> 12, word & 0x0fff)
}

/// A decoded flow sample with its captured frame copied out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SflowFlowSample {
    sequence: u32,
    source_id_type: u8,
    source_id_index: u32,
    sampling_rate: u32,
    sample_pool: u32,
    drops: u32,
    input_if: u32,
    output_if: u32,
    frame_length: u32,
    stripped: u32,
    header: Vec<u8>,
}

impl SflowFlowSample {
    /// Decodes the payload of a flow sample block.
    ///
    /// `sample` is exactly the bytes declared by the sample's length field.
    pub fn parse(sample: &[u8], require_unstripped: bool) -> Result<Self> {
        let mut cursor = Cursor::new(sample, 0, sample.len())?;
        Self::decode(&mut cursor, require_unstripped)
    }

    pub(crate) fn decode(cursor: &mut Cursor<'_>, require_unstripped: bool) -> Result<Self> {
        let sequence = cursor.read_u32()?;
        let source_id = cursor.read_u32()?;
        let sampling_rate = cursor.read_u32()?;
        let sample_pool = cursor.read_u32()?;
        let drops = cursor.read_u32()?;
        let input_if = cursor.read_u32()?;
        let output_if = cursor.read_u32()?;

        let record_count = cursor.read_u32()?;
        if record_count != 1 {
            return Err(SflowError::RecordCount(record_count));
        }

        let (enterprise, format) = split_data_format(cursor.read_u32()?);
        if enterprise != 0 || format != FORMAT_RAW_PACKET_HEADER {
            return Err(SflowError::UnsupportedRecord { enterprise, format });
        }
        let record_len = cursor.read_u32()? as usize;
        let mut record = cursor.block(record_len)?;

        let protocol = record.read_u32()?;
        if protocol != HEADER_PROTOCOL_ETHERNET {
            return Err(SflowError::UnsupportedHeaderProtocol(protocol));
        }
        let frame_length = record.read_u32()?;
        let stripped = record.read_u32()?;
        if require_unstripped && stripped != 0 {
            return Err(SflowError::StrippedBytes(stripped));
        }
        let header_len = record.read_u32()? as usize;
        let padded = xdr_padded(header_len);
        if padded > record.remaining() {
            return Err(SflowError::LengthOverrun {
                declared: padded,
                remaining: record.remaining(),
            });
        }
        let header = record.read_bytes(header_len)?.to_vec();

        Ok(SflowFlowSample {
            sequence,
            source_id_type: (source_id >> 24) as u8,
            source_id_index: source_id & 0x00ff_ffff,
            sampling_rate,
            sample_pool,
            drops,
            input_if,
            output_if,
            frame_length,
            stripped,
            header,
        })
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Source id class (0 = ifIndex, 1 = smonVlanDataSource, 2 = entPhysicalEntry).
    pub fn source_id_type(&self) -> u8 {
        self.source_id_type
    }

    pub fn source_id_index(&self) -> u32 {
        self.source_id_index
    }

    /// One packet in `sampling_rate` was sampled.
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn sample_pool(&self) -> u32 {
        self.sample_pool
    }

    pub fn drops(&self) -> u32 {
        self.drops
    }

    pub fn input_if(&self) -> u32 {
        self.input_if
    }

    pub fn output_if(&self) -> u32 {
        self.output_if
    }

    /// Length of the original frame on the wire.
    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    pub fn stripped(&self) -> u32 {
        self.stripped
    }

    /// Captured leading bytes of the frame.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Ethernet overlay over the captured bytes.
    pub fn ether(&self) -> EtherPacket<&[u8]> {
        EtherPacket::new(&self.header[..], 0)
    }
}
