//! Build Signature Unit
//!
//! Derives a fixed-size fingerprint of the compiled program's
//! serializable type layout, used to detect encoding-incompatible
//! producer/consumer pairs before any bytes are exchanged.
//!
//! # Design
//! - 256-bit blake3 digest over a domain prefix, the build identity
//!   (package name/version, pointer width, endianness), and the full
//!   ordered descriptor table
//! - Computed once per registry at build time and cached there; the
//!   free [`signature`] function reads the installed process registry
//! - Advisory only: equal signatures are necessary for safe exchange,
//!   never verified by the decoder itself (false negatives across
//!   rebuilds are accepted safety margin)

use core::fmt;

use alloc::vec::Vec;

use crate::registry::{self, TypeDescriptor};

/// Domain separation prefix; bump when the digest layout changes.
const SIGNATURE_DOMAIN: &[u8] = b"capgraph.signature.v1";

/// Fingerprint of one build's serializable type layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl Signature {
    /// Digest width in bytes.
    pub const LEN: usize = 32;

    /// Derive the signature of an ordered descriptor table.
    pub(crate) fn of_descriptors(descriptors: &[TypeDescriptor]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SIGNATURE_DOMAIN);

        // Build identity: same source on a different platform or word
        // size must not claim compatibility.
        hasher.update(env!("CARGO_PKG_NAME").as_bytes());
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        hasher.update(&[core::mem::size_of::<usize>() as u8]);
        hasher.update(&[cfg!(target_endian = "little") as u8]);

        hasher.update(&(descriptors.len() as u64).to_le_bytes());
        let mut tag = Vec::new();
        for desc in descriptors {
            tag.clear();
            tag.extend_from_slice(&desc.type_id().as_u32().to_le_bytes());
            tag.extend_from_slice(&(desc.name().len() as u32).to_le_bytes());
            tag.extend_from_slice(desc.name().as_bytes());
            tag.extend_from_slice(&desc.flags().bits().to_le_bytes());
            tag.extend_from_slice(&(desc.fields().len() as u32).to_le_bytes());
            for field in desc.fields() {
                field.write_layout_tag(&mut tag);
            }
            hasher.update(&tag);
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// The raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes of the digest, used as the wire-header marker.
    #[inline]
    pub fn marker(&self) -> u64 {
        let mut m = [0u8; 8];
        m.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(m)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// The process-wide signature.
///
/// Reads the installed global registry; before installation this is the
/// (deterministic) signature of the empty table. Takes no capability:
/// it reveals build identity, never object contents.
pub fn signature() -> Signature {
    match registry::global() {
        Some(r) => r.signature(),
        None => Signature::of_descriptors(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldKind, RegistryBuilder, ScalarWidth};
    use alloc::vec;

    fn registry_with(width: ScalarWidth) -> crate::registry::Registry {
        let mut b = RegistryBuilder::new();
        b.register("Node", vec![FieldKind::Scalar(width), FieldKind::SharedRef]);
        b.build()
    }

    #[test]
    fn test_signature_stable_for_same_layout() {
        let a = registry_with(ScalarWidth::W4);
        let b = registry_with(ScalarWidth::W4);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_changes_with_layout() {
        let a = registry_with(ScalarWidth::W4);
        let b = registry_with(ScalarWidth::W8);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_changes_with_name() {
        let mut b1 = RegistryBuilder::new();
        b1.register("Alpha", vec![]);
        let mut b2 = RegistryBuilder::new();
        b2.register("Beta", vec![]);
        assert_ne!(b1.build().signature(), b2.build().signature());
    }

    #[test]
    fn test_marker_is_digest_prefix() {
        let r = registry_with(ScalarWidth::W1);
        let sig = r.signature();
        let expected = u64::from_le_bytes(sig.as_bytes()[..8].try_into().unwrap());
        assert_eq!(sig.marker(), expected);
    }
}
