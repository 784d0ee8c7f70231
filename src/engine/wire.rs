//! Wire Primitives
//!
//! Bounds-checked reading and allocator-backed writing of the byte
//! format. All integers are little-endian.
//!
//! # Layout
//! ```text
//! Header:  [marker : u64]        first 8 bytes of producer signature
//!          [object_count : u32]
//! Record*: [type_id : u32]
//!          [field payload per descriptor layout, in order]
//! ```

use alloc::boxed::Box;

use crate::mem::{AllocError, Allocator, Block};
use crate::registry::ScalarWidth;

use super::DecodeError;

/// Serialized width of the header marker.
pub(crate) const MARKER_WIDTH: usize = 8;

/// Initial output block size for the writer.
const INITIAL_CAPACITY: usize = 64;

/// Growable output buffer over the allocator seam.
///
/// Grows by doubling; `finish` copies down into an exact-size block so
/// the returned bytes carry no slack.
pub(crate) struct ByteWriter<'a, A: Allocator> {
    block: Block,
    len: usize,
    alloc: &'a A,
}

impl<'a, A: Allocator> ByteWriter<'a, A> {
    pub(crate) fn new(alloc: &'a A) -> Result<Self, AllocError> {
        Ok(Self {
            block: alloc.allocate(INITIAL_CAPACITY)?,
            len: 0,
            alloc,
        })
    }

    fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self.len + additional;
        if needed <= self.block.len() {
            return Ok(());
        }
        let mut capacity = self.block.len().max(1);
        while capacity < needed {
            capacity *= 2;
        }
        let mut grown = self.alloc.allocate(capacity)?;
        grown.as_mut_slice()[..self.len].copy_from_slice(&self.block.as_slice()[..self.len]);
        self.block = grown;
        Ok(())
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), AllocError> {
        self.reserve(bytes.len())?;
        self.block.as_mut_slice()[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    #[inline]
    pub(crate) fn push_u32(&mut self, value: u32) -> Result<(), AllocError> {
        self.push_bytes(&value.to_le_bytes())
    }

    #[inline]
    pub(crate) fn push_u64(&mut self, value: u64) -> Result<(), AllocError> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Write the low `width` bytes of a scalar value.
    ///
    /// The caller has already checked that the value fits the width.
    #[inline]
    pub(crate) fn push_scalar(&mut self, value: u64, width: ScalarWidth) -> Result<(), AllocError> {
        self.push_bytes(&value.to_le_bytes()[..width.bytes()])
    }

    pub(crate) fn finish(self) -> Result<Box<[u8]>, AllocError> {
        let mut exact = self.alloc.allocate(self.len)?;
        exact
            .as_mut_slice()
            .copy_from_slice(&self.block.as_slice()[..self.len]);
        Ok(exact.into_boxed())
    }
}

/// Bounds-checked cursor over a byte sequence.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Current cursor position.
    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Slice of the underlying bytes by absolute positions.
    ///
    /// Both positions must have been previously reached by the cursor,
    /// so the range is in bounds by construction.
    #[inline]
    pub(crate) fn span(&self, start: usize, end: usize) -> &'a [u8] {
        &self.bytes[start..end]
    }

    pub(crate) fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Malformed("truncated payload"));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_exact(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_exact(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a scalar of the given width, zero-extended to 64 bits.
    pub(crate) fn read_scalar(&mut self, width: ScalarWidth) -> Result<u64, DecodeError> {
        let bytes = self.read_exact(width.bytes())?;
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}
