//! Block Allocator Interface
//!
//! The engine's only memory collaborator: it asks an allocator for byte
//! blocks of a given size and trusts the result.
//!
//! # Design
//! - `Allocator` is the substitution seam; the engine never names a
//!   concrete allocator
//! - `Block` is an owned, exclusively held byte region; no aliasing
//! - The default [`Heap`] delegates to the host heap; tests substitute
//!   an instrumented counting allocator

use alloc::boxed::Box;
use alloc::vec;
use core::fmt;

/// Allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator could not provide a block of the requested size.
    Exhausted {
        /// Requested size in bytes.
        requested: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { requested } => {
                write!(f, "allocator exhausted (requested {requested} bytes)")
            }
        }
    }
}

/// An owned block of bytes handed out by an [`Allocator`].
#[derive(Debug)]
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Wrap an owned byte region as a block.
    #[inline]
    pub fn from_boxed(data: Box<[u8]>) -> Self {
        Self { data }
    }

    /// Block size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the block contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write access to the block contents.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the block into its byte region.
    #[inline]
    pub fn into_boxed(self) -> Box<[u8]> {
        self.data
    }
}

/// Source of byte blocks for the engine.
///
/// Implementations decide policy (host heap, arena, instrumentation);
/// thread-safety of a shared allocator is the implementation's own
/// contract, which is why the methods take `&self`.
pub trait Allocator {
    /// Allocate a block of exactly `size` bytes with arbitrary contents.
    fn allocate(&self, size: usize) -> Result<Block, AllocError>;

    /// Allocate a block of exactly `size` bytes, zero-initialized.
    fn allocate_zeroed(&self, size: usize) -> Result<Block, AllocError> {
        let mut block = self.allocate(size)?;
        block.as_mut_slice().fill(0);
        Ok(block)
    }
}

/// Default allocator over the host heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct Heap;

impl Allocator for Heap {
    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        Ok(Block::from_boxed(vec![0u8; size].into_boxed_slice()))
    }
}

impl<A: Allocator + ?Sized> Allocator for &A {
    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        (**self).allocate(size)
    }

    fn allocate_zeroed(&self, size: usize) -> Result<Block, AllocError> {
        (**self).allocate_zeroed(size)
    }
}
