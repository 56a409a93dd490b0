//! Network primitives shared by the netsift crates.
//!
//! This crate provides the stateless helpers every packet overlay builds on:
//!
//! - [`bytes`]: big-endian byte ⇄ integer conversions over raw buffers
//! - [`Ipv4Cidr`] / [`Ipv4Range`]: IPv4 network and address range helpers
//! - IPv4 string / integer / byte conversions ([`ipv4_to_u32`], [`u32_to_ipv4`], ...)
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`VlanId`] / [`VlanTag`]: IEEE 802.1Q VLAN ids and tag control fields

pub mod bytes;
mod ip;
mod mac;
mod vlan;

pub use ip::{
    ipv4_bytes_to_string, ipv4_bytes_to_u32, ipv4_to_u32, is_private_ipv4, mask_to_prefix_len,
    prefix_len_to_mask, u32_to_ipv4, u32_to_ipv4_bytes, Ipv4Cidr, Ipv4Range,
};
pub use mac::MacAddress;
pub use vlan::{VlanId, VlanTag};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid IP range: {0}")]
    InvalidIpRange(String),

    #[error("invalid netmask: {0:#010x}")]
    InvalidNetmask(u32),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),
}
