//! Big-endian (network byte order) conversions over raw buffers.
//!
//! The `read_*` / `write_*` functions expect the caller to have checked the
//! buffer length already (overlays validate their header ranges once at
//! construction) and panic on a short slice. The `get_*` variants are the
//! checked form for code that walks untrusted, length-prefixed records.

use byteorder::{BigEndian, ByteOrder};

/// Reads a big-endian `u16` at `offset`.
#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&buf[offset..offset + 2])
}

/// Reads a big-endian 24-bit integer at `offset`.
#[inline]
pub fn read_u24(buf: &[u8], offset: usize) -> u32 {
    BigEndian::read_u24(&buf[offset..offset + 3])
}

/// Reads a big-endian `u32` at `offset`.
#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&buf[offset..offset + 4])
}

/// Reads a big-endian `u64` at `offset`.
#[inline]
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    BigEndian::read_u64(&buf[offset..offset + 8])
}

/// Writes `value` big-endian at `offset`.
#[inline]
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    BigEndian::write_u16(&mut buf[offset..offset + 2], value);
}

/// Writes `value` big-endian at `offset`.
#[inline]
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    BigEndian::write_u32(&mut buf[offset..offset + 4], value);
}

/// Reads a big-endian `u16` at `offset`, or `None` if the buffer is too short.
#[inline]
pub fn get_u16(buf: &[u8], offset: usize) -> Option<u16> {
    buf.get(offset..offset.checked_add(2)?).map(BigEndian::read_u16)
}

/// Reads a big-endian 24-bit integer at `offset`, or `None` if the buffer is too short.
#[inline]
pub fn get_u24(buf: &[u8], offset: usize) -> Option<u32> {
    buf.get(offset..offset.checked_add(3)?).map(BigEndian::read_u24)
}

/// Reads a big-endian `u32` at `offset`, or `None` if the buffer is too short.
#[inline]
pub fn get_u32(buf: &[u8], offset: usize) -> Option<u32> {
    buf.get(offset..offset.checked_add(4)?).map(BigEndian::read_u32)
}

/// Reads a big-endian `u64` at `offset`, or `None` if the buffer is too short.
#[inline]
pub fn get_u64(buf: &[u8], offset: usize) -> Option<u64> {
    buf.get(offset..offset.checked_add(8)?).map(BigEndian::read_u64)
}

/// Returns the big-endian encoding of `value`.
#[inline]
pub const fn u16_to_bytes(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Returns the big-endian encoding of `value`.
#[inline]
pub const fn u32_to_bytes(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}
