//! sFlow v5 decoding and per-agent aggregation.
//!
//! [`SflowPacket`] decodes one datagram and copies out the sampled frames of
//! its flow samples ([`SflowFlowSample`]). [`SflowAgentList`] groups legal
//! datagrams by agent address and sub-agent id and keeps running counters
//! plus a bounded history of windowed packet and bit rates per agent.
//!
//! ```
//! use netsift_sflow::{SflowAgentList, SflowConfig};
//!
//! let list = SflowAgentList::new(SflowConfig::default()).unwrap();
//! let datagram = [
//!     0, 0, 0, 5, 0, 0, 0, 1, 192, 0, 2, 1, // v5, agent 192.0.2.1
//!     0, 0, 0, 1, 0, 0, 0, 9, 0, 0, 0, 0, 0, 0, 0, 0, // sub 1, seq 9, no samples
//! ];
//! let packet = list.ingest(&datagram, 0, datagram.len());
//! assert!(packet.is_legal());
//! assert_eq!(list.len(), 1);
//! ```

mod agent;
mod agent_list;
mod config;
mod cursor;
mod error;
mod packet;
mod sample;

pub use agent::{AgentCounters, RateSample, SflowAgentItem, SflowAgentSnapshot};
pub use agent_list::{agent_key, SflowAgentList};
pub use config::{DownstreamParity, SflowConfig};
pub use error::{ConfigError, ErrorKind, Result, SflowError};
pub use packet::{SflowPacket, SFLOW_PORT, SFLOW_VERSION};
pub use sample::{
    split_data_format, SflowFlowSample, FORMAT_RAW_PACKET_HEADER, HEADER_PROTOCOL_ETHERNET,
};
