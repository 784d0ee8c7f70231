//! Capgraph - Capability-Gated Object-Graph Serialization
//!
//! A binary serialization engine for in-memory object graphs, including
//! cyclic and shared structures, gated by unforgeable capability tokens.
//!
//! # Design
//! - Type-tagged traversal with dense serial indices; cycles and diamond
//!   sharing encode as bare index references
//! - Two-pass decoding (allocate, then fix up) reconstructs reference
//!   identity exactly
//! - A 256-bit signature over the registered type layouts detects
//!   encoding-incompatible producer/consumer pairs
//! - Four zero-sized tokens partition the dangerous operations: encode,
//!   decode, inspect raw bytes, trust raw bytes
//!
//! # Security Model
//! The byte format is not self-describing and carries no integrity check
//! beyond structural bounds. Decoding is only meaningful for bytes
//! produced by a bit-identical build of the same program (or a peer whose
//! signature was independently confirmed). Foreign bytes decode into
//! garbage graphs at best; the capability split exists so that only
//! explicitly trusted components can ever present such bytes for
//! decoding.
//!
//! # Collaborators
//! Block storage goes through the [`mem::Allocator`] seam; node storage
//! and ownership belong to the host runtime (`Rc`). Transport and
//! persistence of [`Serialised`] values are the caller's concern.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod auth;
pub mod engine;
pub mod graph;
pub mod mem;
pub mod registry;
pub mod signature;

pub use auth::{AmbientAuth, DecodeAuth, EncodeAuth, InspectAuth, TrustAuth};
pub use engine::{
    decode, encode, inspect, inspect_marker, trust, DecodeError, EncodeError, Serialised,
};
pub use graph::{structurally_equal, FieldValue, Node, NodeRef};
pub use mem::{AllocError, Allocator, Block, Heap};
pub use registry::{
    FieldKind, LengthMode, RefTarget, Registry, RegistryBuilder, ScalarWidth, TypeDescriptor,
    TypeId,
};
pub use signature::{signature, Signature};
