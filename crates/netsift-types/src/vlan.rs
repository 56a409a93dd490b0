//! 802.1Q tag control information.
//!
//! ```text
//!  15 14 13  12  11                              0
//! +--------+---+---------------------------------+
//! |  PCP   |DEI|               VID               |
//! +--------+---+---------------------------------+
//! ```

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A usable VLAN id (1-4094).
///
/// VID 0 marks a priority-only tag and 4095 is reserved; neither maps to a
/// `VlanId`.
///
/// ```
/// use netsift_types::VlanId;
///
/// // PCP 5, DEI 0, VID 100
/// let vlan = VlanId::from_tci(0xa064).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
/// assert!(VlanId::from_tci(0xa000).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    /// VID bits of a tag control information field.
    pub const TCI_MASK: u16 = 0x0fff;

    pub fn new(id: u16) -> Result<Self, ParseError> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            return Ok(VlanId(id));
        }
        Err(ParseError::InvalidVlanId(id))
    }

    /// VID of a raw tag control information field, if usable.
    pub fn from_tci(tci: u16) -> Option<Self> {
        VlanTag::from_tci(tci).vlan_id()
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(id: VlanId) -> Self {
        id.as_u16()
    }
}

/// Decoded tag control information of one 802.1Q tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VlanTag {
    /// Priority code point (0-7)
    pub pcp: u8,
    /// Drop eligible indicator
    pub dei: bool,
    /// Raw 12-bit VID, including the reserved values 0 and 4095
    pub vid: u16,
}

impl VlanTag {
    pub const fn from_tci(tci: u16) -> Self {
        VlanTag {
            pcp: (tci >> 13) as u8,
            dei: tci & 0x1000 != 0,
            vid: tci & VlanId::TCI_MASK,
        }
    }

    pub const fn to_tci(self) -> u16 {
        ((self.pcp as u16 & 0x7) << 13) | ((self.dei as u16) << 12) | (self.vid & VlanId::TCI_MASK)
    }

    /// True for a priority-only tag (VID 0).
    pub const fn is_priority_only(self) -> bool {
        self.vid == 0
    }

    pub fn vlan_id(self) -> Option<VlanId> {
        VlanId::new(self.vid).ok()
    }
}

impl fmt::Display for VlanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan={} pcp={}", self.vid, self.pcp)?;
        if self.dei {
            f.write_str(" dei")?;
        }
        Ok(())
    }
}
