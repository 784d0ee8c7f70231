//! Type Descriptor Table
//!
//! Maps each serializable type to a stable-within-this-binary id and a
//! declared field layout.
//!
//! # Design
//! - Dense `TypeId`s assigned in registration order (a pure function of
//!   the program's registration sequence, so bit-identical binaries
//!   agree on every id)
//! - Descriptors are immutable once a `Registry` is built; lookups are
//!   safe for unsynchronized concurrent reads
//! - An optional process-wide registry can be installed once, for hosts
//!   that want the global [`crate::signature::signature`] convenience
//!
//! Ids are only meaningful within one binary's lifetime. Recompiling may
//! reassign them; the [`crate::signature::Signature`] exists to detect
//! exactly that.

pub mod descriptor;
pub mod table;

pub use descriptor::{
    DescriptorFlags, FieldKind, LengthMode, RefTarget, ScalarWidth, TypeDescriptor, TypeId,
    LEN_PREFIX_WIDTH, REF_INDEX_WIDTH,
};
pub use table::{global, install, InstallError, Registry, RegistryBuilder};
