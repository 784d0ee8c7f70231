//! Type Descriptors and Field Layouts
//!
//! Type-safe building blocks for declaring how a type serializes.
//!
//! # Design
//! - `TypeId` is a newtype to prevent arbitrary integers posing as ids
//! - `FieldKind` is a closed variant set: scalars, references, inline
//!   arrays; nothing open-ended
//! - Flags and the fixed payload width are derived once at registration
//!   and never recomputed

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

/// Serialized width of a reference field (a serial index).
pub const REF_INDEX_WIDTH: usize = 4;

/// Serialized width of an array length prefix.
pub const LEN_PREFIX_WIDTH: usize = 4;

/// Identifier of a registered type, unique within one built registry.
///
/// Ids are dense, starting at 0, in registration order. They are not
/// stable across rebuilds; only bit-identical binaries agree on them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Create a type id from its raw value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte width of a scalar field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum ScalarWidth {
    /// 1 byte.
    W1 = 1,
    /// 2 bytes.
    W2 = 2,
    /// 4 bytes.
    W4 = 4,
    /// 8 bytes.
    W8 = 8,
}

impl ScalarWidth {
    /// Width in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Check that a value is representable in this width.
    #[inline]
    pub const fn fits(self, value: u64) -> bool {
        match self {
            Self::W8 => true,
            _ => value < 1u64 << (8 * self as u32),
        }
    }
}

/// Target constraint of an owned reference field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefTarget {
    /// The field must reference an instance of exactly this type.
    Exact(TypeId),
    /// The field may reference an instance of any registered type.
    Dynamic,
}

/// Length discipline of an inline array field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LengthMode {
    /// Exactly this many elements; no length prefix on the wire.
    Fixed(u32),
    /// Any element count, written as a length prefix.
    Prefixed,
}

/// Kind of one field in a declared layout.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FieldKind {
    /// Primitive scalar of the given width, written as raw bytes.
    Scalar(ScalarWidth),
    /// Owning reference to another node, written as a serial index.
    OwnedRef(RefTarget),
    /// Shared (non-owning in the declared layout) reference, written as
    /// a serial index.
    SharedRef,
    /// Inline array of a single element kind.
    InlineArray(Box<FieldKind>, LengthMode),
}

impl FieldKind {
    /// Whether this kind (or any nested element kind) is a reference.
    pub fn has_refs(&self) -> bool {
        match self {
            Self::Scalar(_) => false,
            Self::OwnedRef(_) | Self::SharedRef => true,
            Self::InlineArray(elem, _) => elem.has_refs(),
        }
    }

    /// Whether this kind (or any nested element kind) has a
    /// length-prefixed array.
    pub fn is_variable(&self) -> bool {
        match self {
            Self::Scalar(_) | Self::OwnedRef(_) | Self::SharedRef => false,
            Self::InlineArray(elem, mode) => {
                matches!(mode, LengthMode::Prefixed) || elem.is_variable()
            }
        }
    }

    /// Minimum serialized width of one field of this kind.
    ///
    /// Exact for non-variable kinds; for prefixed arrays this counts
    /// only the length prefix.
    pub fn min_size(&self) -> usize {
        match self {
            Self::Scalar(w) => w.bytes(),
            Self::OwnedRef(_) | Self::SharedRef => REF_INDEX_WIDTH,
            Self::InlineArray(elem, LengthMode::Fixed(n)) => *n as usize * elem.min_size(),
            Self::InlineArray(_, LengthMode::Prefixed) => LEN_PREFIX_WIDTH,
        }
    }

    /// Append a stable tag encoding of this kind for signature digests.
    ///
    /// The encoding must change whenever the wire meaning of the kind
    /// changes, and must never collide between distinct kinds.
    pub fn write_layout_tag(&self, out: &mut Vec<u8>) {
        match self {
            Self::Scalar(w) => {
                out.push(0x01);
                out.push(w.bytes() as u8);
            }
            Self::OwnedRef(RefTarget::Exact(id)) => {
                out.push(0x02);
                out.extend_from_slice(&id.as_u32().to_le_bytes());
            }
            Self::OwnedRef(RefTarget::Dynamic) => out.push(0x03),
            Self::SharedRef => out.push(0x04),
            Self::InlineArray(elem, LengthMode::Fixed(n)) => {
                out.push(0x05);
                out.extend_from_slice(&n.to_le_bytes());
                elem.write_layout_tag(out);
            }
            Self::InlineArray(elem, LengthMode::Prefixed) => {
                out.push(0x06);
                elem.write_layout_tag(out);
            }
        }
    }
}

bitflags! {
    /// Derived traits of a descriptor, computed once at registration.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct DescriptorFlags: u32 {
        /// At least one field (possibly nested) is a reference.
        const HAS_REFS = 1 << 0;
        /// At least one field is an inline array.
        const HAS_ARRAYS = 1 << 1;
        /// Serialized width varies per instance (prefixed arrays).
        const VARIABLE_SIZE = 1 << 2;
    }
}

/// Layout descriptor for one registered type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    type_id: TypeId,
    name: &'static str,
    fields: Vec<FieldKind>,
    flags: DescriptorFlags,
    size: usize,
}

impl TypeDescriptor {
    /// Build a descriptor, deriving flags and the fixed payload width.
    pub(crate) fn new(type_id: TypeId, name: &'static str, fields: Vec<FieldKind>) -> Self {
        let mut flags = DescriptorFlags::empty();
        let mut size = 0usize;
        for field in &fields {
            if field.has_refs() {
                flags |= DescriptorFlags::HAS_REFS;
            }
            if matches!(field, FieldKind::InlineArray(_, _)) {
                flags |= DescriptorFlags::HAS_ARRAYS;
            }
            if field.is_variable() {
                flags |= DescriptorFlags::VARIABLE_SIZE;
            }
            size += field.min_size();
        }
        Self {
            type_id,
            name,
            fields,
            flags,
            size,
        }
    }

    /// The id this descriptor was registered under.
    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The registered type name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared field layout, in serialization order.
    #[inline]
    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Derived descriptor traits.
    #[inline]
    pub const fn flags(&self) -> DescriptorFlags {
        self.flags
    }

    /// Serialized payload width of a non-variable instance.
    ///
    /// A lower bound when [`DescriptorFlags::VARIABLE_SIZE`] is set.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }
}
