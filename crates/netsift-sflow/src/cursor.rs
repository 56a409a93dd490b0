//! Bounds-checked XDR reader over a window of a datagram.

use crate::error::{Result, SflowError};
use netsift_types::bytes::get_u32;

/// Forward-only reader over `data[pos..end]`.
///
/// Every read checks the remaining length first, so a malformed length
/// field surfaces as an error instead of an out-of-bounds slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    /// Reader over `data[offset..offset + len]`.
    pub fn new(data: &'a [u8], offset: usize, len: usize) -> Result<Self> {
        let end = offset.checked_add(len).filter(|end| *end <= data.len()).ok_or(
            SflowError::Truncated {
                offset,
                needed: len,
                available: data.len().saturating_sub(offset),
            },
        )?;
        Ok(Cursor {
            data,
            pos: offset,
            end,
        })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(SflowError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let value = get_u32(&self.data[..self.end], self.pos).ok_or(SflowError::Truncated {
            offset: self.pos,
            needed: 4,
            available: self.remaining(),
        })?;
        self.pos += 4;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    /// Splits off a sub-reader for a block of `len` bytes declared by the
    /// encoding, advancing past it.
    pub fn block(&mut self, len: usize) -> Result<Cursor<'a>> {
        if len > self.remaining() {
            return Err(SflowError::LengthOverrun {
                declared: len,
                remaining: self.remaining(),
            });
        }
        let block = Cursor {
            data: self.data,
            pos: self.pos,
            end: self.pos + len,
        };
        self.pos += len;
        Ok(block)
    }

    /// Requires the reader to have consumed its window exactly.
    pub fn finish(&self) -> Result<()> {
        if self.pos != self.end {
            return Err(SflowError::LengthMismatch {
                cursor: self.pos,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Rounds `len` up to the 4-byte XDR boundary.
pub(crate) fn xdr_padded(len: usize) -> usize {
    len.saturating_add(3) & !3
}
