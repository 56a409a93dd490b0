//! IPv4 address conversions and CIDR / range helpers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parses a dotted-quad IPv4 string into its host-order integer value.
///
/// ```
/// assert_eq!(netsift_types::ipv4_to_u32("10.0.0.1").unwrap(), 0x0a00_0001);
/// ```
pub fn ipv4_to_u32(s: &str) -> Result<u32, ParseError> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
}

/// Formats a host-order integer as a dotted-quad IPv4 string.
pub fn u32_to_ipv4(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// Converts 4 network-order bytes into a host-order integer.
pub const fn ipv4_bytes_to_u32(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Converts a host-order integer into 4 network-order bytes.
pub const fn u32_to_ipv4_bytes(addr: u32) -> [u8; 4] {
    addr.to_be_bytes()
}

/// Formats 4 network-order bytes as a dotted-quad IPv4 string.
pub fn ipv4_bytes_to_string(bytes: [u8; 4]) -> String {
    Ipv4Addr::from(bytes).to_string()
}

/// Returns the netmask for a prefix length (`24` → `255.255.255.0`).
///
/// Lengths above 32 saturate to a full mask.
pub const fn prefix_len_to_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        u32::MAX
    } else {
        u32::MAX << (32 - prefix_len)
    }
}

/// Returns the prefix length of a contiguous netmask.
///
/// # Errors
///
/// Returns an error if the mask has a one bit after a zero bit.
pub fn mask_to_prefix_len(mask: u32) -> Result<u8, ParseError> {
    let len = mask.leading_ones();
    if mask.checked_shl(len).unwrap_or(0) != 0 {
        return Err(ParseError::InvalidNetmask(mask));
    }
    Ok(len as u8)
}

/// Returns true for RFC 1918 private addresses.
pub const fn is_private_ipv4(addr: u32) -> bool {
    (addr & 0xff00_0000) == 0x0a00_0000
        || (addr & 0xfff0_0000) == 0xac10_0000
        || (addr & 0xffff_0000) == 0xc0a8_0000
}

/// An IPv4 network in CIDR notation (e.g. `10.0.0.0/8`).
///
/// The stored address is normalized to the network address, so
/// `10.1.2.3/8` and `10.0.0.0/8` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: u32,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Creates a new CIDR block.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(addr: u32, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum 32",
                prefix_len
            )));
        }
        Ok(Ipv4Cidr {
            network: addr & prefix_len_to_mask(prefix_len),
            prefix_len,
        })
    }

    pub const fn network(&self) -> u32 {
        self.network
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn netmask(&self) -> u32 {
        prefix_len_to_mask(self.prefix_len)
    }

    /// Returns the broadcast (highest) address of the block.
    pub const fn broadcast(&self) -> u32 {
        self.network | !self.netmask()
    }

    /// Returns the first address of the block (the network address).
    pub const fn first(&self) -> u32 {
        self.network
    }

    /// Returns the last address of the block (the broadcast address).
    pub const fn last(&self) -> u32 {
        self.broadcast()
    }

    /// Returns the number of addresses covered by the block.
    pub const fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len as u32)
    }

    pub const fn contains(&self, addr: u32) -> bool {
        addr & self.netmask() == self.network
    }

    pub const fn to_range(&self) -> Ipv4Range {
        Ipv4Range {
            start: self.first(),
            end: self.last(),
        }
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.network), self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr_str, len_str) = match s.rsplit_once('/') {
            Some(parts) => parts,
            // A bare address is a host route.
            None => (s, "32"),
        };

        let addr = ipv4_to_u32(addr_str)?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Ipv4Cidr::new(addr, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> String {
        cidr.to_string()
    }
}

/// An inclusive range of IPv4 addresses (host-order integers).
///
/// Serialized as `a.b.c.d-e.f.g.h`; deserializing goes through [`FromStr`],
/// so reversed bounds are swapped like in [`Ipv4Range::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Range {
    start: u32,
    end: u32,
}

impl Ipv4Range {
    /// Creates a range, swapping the bounds if given in reverse order.
    pub const fn new(a: u32, b: u32) -> Self {
        if a <= b {
            Ipv4Range { start: a, end: b }
        } else {
            Ipv4Range { start: b, end: a }
        }
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    pub const fn end(&self) -> u32 {
        self.end
    }

    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Returns the number of addresses in the range.
    pub const fn len(&self) -> u64 {
        (self.end - self.start) as u64 + 1
    }

    /// Always false; an inclusive range holds at least one address.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Ipv4Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            Ipv4Addr::from(self.start),
            Ipv4Addr::from(self.end)
        )
    }
}

impl FromStr for Ipv4Range {
    type Err = ParseError;

    /// Accepts `a.b.c.d-e.f.g.h`, a CIDR block, or a single address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((lo, hi)) = s.split_once('-') {
            let lo = ipv4_to_u32(lo).map_err(|_| ParseError::InvalidIpRange(s.to_string()))?;
            let hi = ipv4_to_u32(hi).map_err(|_| ParseError::InvalidIpRange(s.to_string()))?;
            return Ok(Ipv4Range::new(lo, hi));
        }
        s.parse::<Ipv4Cidr>()
            .map(|cidr| cidr.to_range())
            .map_err(|_| ParseError::InvalidIpRange(s.to_string()))
    }
}

impl TryFrom<String> for Ipv4Range {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Range> for String {
    fn from(range: Ipv4Range) -> String {
        range.to_string()
    }
}

impl From<Ipv4Cidr> for Ipv4Range {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_range()
    }
}
