//! Internet checksum (RFC 1071) shared by the IPv4, TCP and UDP overlays.
//!
//! The checksum is the ones-complement of the ones-complement sum of all
//! 16-bit big-endian words. An odd trailing byte is padded with a zero low
//! byte. TCP and UDP additionally fold in a pseudo header made of the IPv4
//! source and destination addresses, the protocol number and the segment
//! length.

/// Sums `data` as big-endian 16-bit words, skipping the 2-byte field that
/// starts at `skip` (relative to `data`).
pub fn sum_words(data: &[u8], skip: Option<usize>) -> u32 {
    let mut sum: u64 = 0;
    let mut chunks = data.chunks_exact(2);
    let mut offset = 0;
    for word in &mut chunks {
        if Some(offset) != skip {
            sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
        }
        offset += 2;
    }
    if let [last] = chunks.remainder() {
        if Some(offset) != skip {
            sum += u64::from(*last) << 8;
        }
    }
    fold64(sum)
}

/// Returns the pseudo header contribution for a TCP or UDP segment.
pub fn pseudo_header_sum(src: u32, dst: u32, protocol: u8, length: u16) -> u32 {
    (src >> 16) + (src & 0xffff) + (dst >> 16) + (dst & 0xffff) + u32::from(protocol)
        + u32::from(length)
}

/// Folds carries back into the low 16 bits until none remain.
pub fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Folds and complements a running sum into the final checksum value.
pub fn finish(sum: u32) -> u16 {
    !fold(sum)
}

/// Computes the checksum of `data` without any pseudo header.
pub fn internet_checksum(data: &[u8]) -> u16 {
    finish(sum_words(data, None))
}

/// Adds two partial sums without losing carries.
pub fn combine(a: u32, b: u32) -> u32 {
    fold64(u64::from(a) + u64::from(b))
}

fn fold64(mut sum: u64) -> u32 {
    while sum >> 32 != 0 {
        sum = (sum & 0xffff_ffff) + (sum >> 32);
    }
    sum as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Header from RFC 1071 examples / Wikipedia's IPv4 checksum walk-through.
    const IP_HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn test_known_ipv4_header() {
        assert_eq!(finish(sum_words(&IP_HEADER, Some(10))), 0xb861);
        assert_eq!(internet_checksum(&IP_HEADER), 0);
    }

    #[test]
    fn test_fold_carries() {
        assert_eq!(fold(0x0001_fffe), 0xffff);
        assert_eq!(fold(0x0002_0001), 0x0003);
        assert_eq!(fold(0xffff_ffff), 0xffff);
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        assert_eq!(sum_words(&[0x12, 0x34, 0x56], None), 0x1234 + 0x5600);
        assert_eq!(sum_words(&[0x12, 0x34, 0x56], Some(2)), 0x1234);
    }

    #[test]
    fn test_pseudo_header_sum() {
        let sum = pseudo_header_sum(0xc0a8_0001, 0xc0a8_00c7, 17, 8);
        assert_eq!(sum, 0xc0a8 + 0x0001 + 0xc0a8 + 0x00c7 + 17 + 8);
    }

    #[test]
    fn test_combine_keeps_carry() {
        assert_eq!(combine(0xffff_ffff, 1), 1);
        assert_eq!(fold(combine(0xffff, 0xffff)), 0xffff);
    }
}
