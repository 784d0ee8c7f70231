//! Serialization Engine
//!
//! The capability-gated public surface: encode, decode, inspect, trust.
//!
//! # Control Flow
//! ```text
//! EncodeAuth  + graph      --encode-->  Serialised
//! InspectAuth + Serialised --inspect--> raw bytes (read-only)
//! TrustAuth   + raw bytes  --trust--->  Serialised (unchecked)
//! DecodeAuth  + Serialised --decode-->  graph
//! ```
//!
//! Every operation is synchronous and non-blocking: it completes or
//! fails immediately, with no partial-progress state. Concurrent calls
//! share nothing but the read-only registry and the allocator, whose
//! thread-safety is its own contract.

mod decode;
mod encode;
pub(crate) mod wire;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::auth::{DecodeAuth, EncodeAuth, InspectAuth, TrustAuth};
use crate::graph::NodeRef;
use crate::mem::{AllocError, Allocator};
use crate::registry::{Registry, TypeId};

/// Failure to encode an object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// A reachable node's type has no descriptor in the registry.
    UnsupportedType(TypeId),
    /// A node's runtime fields do not match its declared layout.
    LayoutMismatch {
        /// Type of the offending node.
        type_id: TypeId,
        /// Index of the offending field in the declared layout.
        field: usize,
    },
    /// Object or array count exceeds the wire format's 32-bit range.
    GraphTooLarge,
    /// The allocator could not provide output storage.
    Alloc(AllocError),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(id) => write!(f, "no descriptor registered for type {id}"),
            Self::LayoutMismatch { type_id, field } => {
                write!(f, "field {field} of type {type_id} does not match its layout")
            }
            Self::GraphTooLarge => write!(f, "graph exceeds wire format limits"),
            Self::Alloc(e) => write!(f, "allocation failed: {e}"),
        }
    }
}

impl From<AllocError> for EncodeError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

/// Failure to decode a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A record's type id is absent from this binary's registry. The
    /// primary signal of a cross-binary mismatch.
    UnknownType(TypeId),
    /// Truncated, out-of-range, or structurally inconsistent payload.
    Malformed(&'static str),
    /// The allocator could not provide instance storage.
    Alloc(AllocError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(id) => write!(f, "unknown type id {id} in record"),
            Self::Malformed(what) => write!(f, "malformed input: {what}"),
            Self::Alloc(e) => write!(f, "allocation failed: {e}"),
        }
    }
}

impl From<AllocError> for DecodeError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

/// Immutable holder of an encoded byte sequence.
///
/// Produced by [`encode`] or vouched for via [`trust`]; consumed
/// read-only by [`decode`] and [`inspect`]. Never mutated after
/// construction, so sharing it is free of aliasing hazards.
#[derive(Debug, Clone)]
pub struct Serialised {
    bytes: Box<[u8]>,
}

impl Serialised {
    #[inline]
    pub(crate) fn from_boxed(bytes: Box<[u8]>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encode the object graph reachable from `root`.
///
/// Requires [`EncodeAuth`]. Cyclic and shared structure is preserved:
/// each distinct node is emitted once and back-references encode as
/// serial indices. The graph is never mutated; on error no output
/// escapes.
pub fn encode<A: Allocator>(
    _auth: EncodeAuth,
    registry: &Registry,
    root: &NodeRef,
    alloc: &A,
) -> Result<Serialised, EncodeError> {
    encode::encode_graph(registry, root, alloc)
}

/// Reconstruct an object graph from encoder output.
///
/// Requires [`DecodeAuth`]. Only bytes produced by a bit-identical
/// build (or a signature-confirmed peer) decode meaningfully; the
/// engine validates structure, not provenance. The header marker is
/// not compared against the local signature.
pub fn decode<A: Allocator>(
    _auth: DecodeAuth,
    registry: &Registry,
    data: &Serialised,
    alloc: &A,
) -> Result<NodeRef, DecodeError> {
    decode::decode_graph(registry, data, alloc)
}

/// Read the raw bytes of a `Serialised` value.
///
/// Requires [`InspectAuth`]. Borrowed, not copied; the holder must not
/// be mutated through other means (it has no mutating API).
#[inline]
pub fn inspect(_auth: InspectAuth, data: &Serialised) -> &[u8] {
    data.bytes()
}

/// Read the header marker of a `Serialised` value, for peer
/// pre-screening against [`crate::signature::Signature::marker`].
///
/// Requires [`InspectAuth`]. `None` when the value is shorter than a
/// header.
pub fn inspect_marker(_auth: InspectAuth, data: &Serialised) -> Option<u64> {
    let bytes = data.bytes().get(..wire::MARKER_WIDTH)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Wrap externally obtained bytes as a `Serialised` value, with no
/// validation of any kind.
///
/// Requires [`TrustAuth`]: this is a pure assertion that the bytes are
/// well-formed output of the same build, and a wrong assertion means
/// [`decode`] returns an error or a garbage graph.
#[inline]
pub fn trust(_auth: TrustAuth, bytes: Vec<u8>) -> Serialised {
    Serialised::from_boxed(bytes.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{structurally_equal, FieldValue, Node};
    use crate::mem::testalloc::CountingAllocator;
    use crate::mem::Heap;
    use crate::registry::{FieldKind, LengthMode, RefTarget, RegistryBuilder, ScalarWidth};
    use crate::testutil;
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::sync::atomic::Ordering;

    struct Fixture {
        registry: Registry,
        /// Two shared references.
        pair: TypeId,
        /// One 8-byte scalar.
        leaf: TypeId,
        /// One dynamic owned reference plus a 1-byte scalar.
        cell: TypeId,
        /// One prefixed array of 2-byte scalars.
        list: TypeId,
        /// One fixed array of exactly three 4-byte scalars.
        vec3: TypeId,
    }

    fn fixture() -> Fixture {
        let mut b = RegistryBuilder::new();
        let pair = b.register("Pair", vec![FieldKind::SharedRef, FieldKind::SharedRef]);
        let leaf = b.register("Leaf", vec![FieldKind::Scalar(ScalarWidth::W8)]);
        let cell = b.register(
            "Cell",
            vec![
                FieldKind::OwnedRef(RefTarget::Dynamic),
                FieldKind::Scalar(ScalarWidth::W1),
            ],
        );
        let list = b.register(
            "List",
            vec![FieldKind::InlineArray(
                Box::new(FieldKind::Scalar(ScalarWidth::W2)),
                LengthMode::Prefixed,
            )],
        );
        let vec3 = b.register(
            "Vec3",
            vec![FieldKind::InlineArray(
                Box::new(FieldKind::Scalar(ScalarWidth::W4)),
                LengthMode::Fixed(3),
            )],
        );
        Fixture {
            registry: b.build(),
            pair,
            leaf,
            cell,
            list,
            vec3,
        }
    }

    fn tokens() -> (EncodeAuth, DecodeAuth, InspectAuth, TrustAuth) {
        let root = testutil::ambient_root();
        (
            EncodeAuth::mint(root),
            DecodeAuth::mint(root),
            InspectAuth::mint(root),
            TrustAuth::mint(root),
        )
    }

    #[test]
    fn test_roundtrip_flat_node() {
        let fx = fixture();
        let (e, d, _, _) = tokens();
        let graph = Node::new(fx.leaf, vec![FieldValue::Scalar(0xDEAD_BEEF)]);
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        let back = decode(d, &fx.registry, &bytes, &Heap).unwrap();
        assert!(structurally_equal(&graph, &back));
        assert!(matches!(
            back.borrow().fields()[0],
            FieldValue::Scalar(0xDEAD_BEEF)
        ));
    }

    #[test]
    fn test_two_node_cycle_preserves_identity() {
        // a -> b -> a; decoding must close the loop onto the root itself.
        let fx = fixture();
        let (e, d, _, _) = tokens();
        let a = Node::new(fx.cell, vec![]);
        let b = Node::new(
            fx.cell,
            vec![FieldValue::Ref(a.clone()), FieldValue::Scalar(2)],
        );
        a.borrow_mut()
            .set_fields(vec![FieldValue::Ref(b.clone()), FieldValue::Scalar(1)]);

        let bytes = encode(e, &fx.registry, &a, &Heap).unwrap();
        let decoded_a = decode(d, &fx.registry, &bytes, &Heap).unwrap();

        let decoded_b = match &decoded_a.borrow().fields()[0] {
            FieldValue::Ref(n) => n.clone(),
            other => panic!("expected reference, got {other:?}"),
        };
        let back_to_a = match &decoded_b.borrow().fields()[0] {
            FieldValue::Ref(n) => n.clone(),
            other => panic!("expected reference, got {other:?}"),
        };
        assert!(Rc::ptr_eq(&back_to_a, &decoded_a));
        assert!(structurally_equal(&a, &decoded_a));
    }

    #[test]
    fn test_self_loop() {
        let fx = fixture();
        let (e, d, _, _) = tokens();
        let node = Node::new(fx.cell, vec![]);
        node.borrow_mut()
            .set_fields(vec![FieldValue::Ref(node.clone()), FieldValue::Scalar(9)]);

        let bytes = encode(e, &fx.registry, &node, &Heap).unwrap();
        let back = decode(d, &fx.registry, &bytes, &Heap).unwrap();
        match &back.borrow().fields()[0] {
            FieldValue::Ref(target) => assert!(Rc::ptr_eq(target, &back)),
            other => panic!("expected reference, got {other:?}"),
        };
    }

    #[test]
    fn test_diamond_sharing_preserved() {
        // Both fields of the pair alias one leaf; the decoded pair's
        // fields must be pointer-identical, and the shared leaf must be
        // emitted exactly once.
        let fx = fixture();
        let (e, d, i, _) = tokens();
        let leaf = Node::new(fx.leaf, vec![FieldValue::Scalar(5)]);
        let pair = Node::new(
            fx.pair,
            vec![FieldValue::Ref(leaf.clone()), FieldValue::Ref(leaf)],
        );

        let bytes = encode(e, &fx.registry, &pair, &Heap).unwrap();
        let raw = inspect(i, &bytes);
        let count = u32::from_le_bytes(raw[8..12].try_into().unwrap());
        assert_eq!(count, 2);

        let back = decode(d, &fx.registry, &bytes, &Heap).unwrap();
        let back = back.borrow();
        match (&back.fields()[0], &back.fields()[1]) {
            (FieldValue::Ref(x), FieldValue::Ref(y)) => assert!(Rc::ptr_eq(x, y)),
            other => panic!("expected two references, got {other:?}"),
        }
    }

    #[test]
    fn test_prefixed_array_roundtrip() {
        let fx = fixture();
        let (e, d, _, _) = tokens();
        let graph = Node::new(
            fx.list,
            vec![FieldValue::Array(vec![
                FieldValue::Scalar(10),
                FieldValue::Scalar(2000),
                FieldValue::Scalar(0xFFFF),
            ])],
        );
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        let back = decode(d, &fx.registry, &bytes, &Heap).unwrap();
        assert!(structurally_equal(&graph, &back));
    }

    #[test]
    fn test_fixed_array_roundtrip() {
        let fx = fixture();
        let (e, d, i, _) = tokens();
        let graph = Node::new(
            fx.vec3,
            vec![FieldValue::Array(vec![
                FieldValue::Scalar(1),
                FieldValue::Scalar(0xFFFF_FFFF),
                FieldValue::Scalar(3),
            ])],
        );
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        // Header + type id + three W4 elements; no length prefix.
        assert_eq!(inspect(i, &bytes).len(), 12 + 4 + 3 * 4);
        let back = decode(d, &fx.registry, &bytes, &Heap).unwrap();
        assert!(structurally_equal(&graph, &back));
    }

    #[test]
    fn test_fixed_array_wrong_length_rejected() {
        let fx = fixture();
        let (e, _, _, _) = tokens();
        let graph = Node::new(
            fx.vec3,
            vec![FieldValue::Array(vec![
                FieldValue::Scalar(1),
                FieldValue::Scalar(2),
            ])],
        );
        assert_eq!(
            encode(e, &fx.registry, &graph, &Heap).unwrap_err(),
            EncodeError::LayoutMismatch {
                type_id: fx.vec3,
                field: 0
            }
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let fx = fixture();
        let (e, _, i, _) = tokens();
        let leaf = Node::new(fx.leaf, vec![FieldValue::Scalar(1)]);
        let pair = Node::new(
            fx.pair,
            vec![FieldValue::Ref(leaf.clone()), FieldValue::Ref(leaf)],
        );
        let first = encode(e, &fx.registry, &pair, &Heap).unwrap();
        let second = encode(e, &fx.registry, &pair, &Heap).unwrap();
        assert_eq!(inspect(i, &first), inspect(i, &second));
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let fx = fixture();
        let (e, _, _, _) = tokens();
        let stray = TypeId::new(99);
        let graph = Node::new(stray, vec![]);
        assert_eq!(
            encode(e, &fx.registry, &graph, &Heap).unwrap_err(),
            EncodeError::UnsupportedType(stray)
        );
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let fx = fixture();
        let (e, _, _, _) = tokens();

        // Wrong arity.
        let bad_arity = Node::new(fx.leaf, vec![]);
        assert!(matches!(
            encode(e, &fx.registry, &bad_arity, &Heap).unwrap_err(),
            EncodeError::LayoutMismatch { .. }
        ));

        // Scalar wider than its declared width (Cell field 1 is W1).
        let target = Node::new(fx.leaf, vec![FieldValue::Scalar(0)]);
        let bad_scalar = Node::new(
            fx.cell,
            vec![FieldValue::Ref(target), FieldValue::Scalar(300)],
        );
        assert_eq!(
            encode(e, &fx.registry, &bad_scalar, &Heap).unwrap_err(),
            EncodeError::LayoutMismatch {
                type_id: fx.cell,
                field: 1
            }
        );

        // Variant mismatch: scalar where a reference is declared.
        let bad_kind = Node::new(
            fx.pair,
            vec![FieldValue::Scalar(0), FieldValue::Scalar(0)],
        );
        assert!(matches!(
            encode(e, &fx.registry, &bad_kind, &Heap).unwrap_err(),
            EncodeError::LayoutMismatch { .. }
        ));
    }

    #[test]
    fn test_exact_ref_target_enforced() {
        let mut b = RegistryBuilder::new();
        let leaf = b.register("Leaf", vec![FieldKind::Scalar(ScalarWidth::W8)]);
        let holder = b.register("Holder", vec![FieldKind::OwnedRef(RefTarget::Exact(leaf))]);
        let registry = b.build();
        let (e, _, _, _) = tokens();

        let wrong = Node::new(holder, vec![]);
        let graph = Node::new(holder, vec![FieldValue::Ref(wrong.clone())]);
        wrong.borrow_mut().set_fields(vec![FieldValue::Ref(graph.clone())]);
        assert!(matches!(
            encode(e, &registry, &graph, &Heap).unwrap_err(),
            EncodeError::LayoutMismatch { .. }
        ));
    }

    #[test]
    fn test_exact_ref_target_mismatch_rejected_on_decode() {
        // Two hand-crafted Holder records pointing at each other: the
        // Exact(leaf) constraint fails because each target is a Holder.
        let mut b = RegistryBuilder::new();
        let leaf = b.register("Leaf", vec![FieldKind::Scalar(ScalarWidth::W8)]);
        let holder = b.register("Holder", vec![FieldKind::OwnedRef(RefTarget::Exact(leaf))]);
        let registry = b.build();
        let (_, d, _, t) = tokens();

        let mut raw = Vec::new();
        raw.extend_from_slice(&registry.signature().marker().to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&holder.as_u32().to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&holder.as_u32().to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        let vouched = trust(t, raw);
        assert_eq!(
            decode(d, &registry, &vouched, &Heap).unwrap_err(),
            DecodeError::Malformed("reference target type mismatch")
        );
    }

    #[test]
    fn test_unknown_type_rejected_on_decode() {
        let fx = fixture();
        let (_, d, _, t) = tokens();
        let mut raw = Vec::new();
        raw.extend_from_slice(&fx.registry.signature().marker().to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&999u32.to_le_bytes());
        let vouched = trust(t, raw);
        assert_eq!(
            decode(d, &fx.registry, &vouched, &Heap).unwrap_err(),
            DecodeError::UnknownType(TypeId::new(999))
        );
    }

    #[test]
    fn test_truncation_rejected() {
        let fx = fixture();
        let (e, d, i, t) = tokens();
        let graph = Node::new(fx.leaf, vec![FieldValue::Scalar(7)]);
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        let raw = inspect(i, &bytes);
        let cut = trust(t, raw[..raw.len() - 1].to_vec());
        assert_eq!(
            decode(d, &fx.registry, &cut, &Heap).unwrap_err(),
            DecodeError::Malformed("truncated payload")
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let fx = fixture();
        let (e, d, i, t) = tokens();
        let graph = Node::new(fx.leaf, vec![FieldValue::Scalar(7)]);
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        let mut raw = inspect(i, &bytes).to_vec();
        raw.push(0);
        let padded = trust(t, raw);
        assert_eq!(
            decode(d, &fx.registry, &padded, &Heap).unwrap_err(),
            DecodeError::Malformed("trailing bytes")
        );
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let fx = fixture();
        let (_, d, _, t) = tokens();
        let mut raw = Vec::new();
        raw.extend_from_slice(&fx.registry.signature().marker().to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&fx.pair.as_u32().to_le_bytes());
        raw.extend_from_slice(&5u32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        let vouched = trust(t, raw);
        assert_eq!(
            decode(d, &fx.registry, &vouched, &Heap).unwrap_err(),
            DecodeError::Malformed("reference index out of range")
        );
    }

    #[test]
    fn test_oversized_array_length_rejected() {
        let fx = fixture();
        let (_, d, _, t) = tokens();
        let mut raw = Vec::new();
        raw.extend_from_slice(&fx.registry.signature().marker().to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&fx.list.as_u32().to_le_bytes());
        raw.extend_from_slice(&u32::MAX.to_le_bytes());
        let vouched = trust(t, raw);
        assert_eq!(
            decode(d, &fx.registry, &vouched, &Heap).unwrap_err(),
            DecodeError::Malformed("array length out of range")
        );
    }

    #[test]
    fn test_empty_object_table_rejected() {
        let fx = fixture();
        let (_, d, _, t) = tokens();
        let mut raw = Vec::new();
        raw.extend_from_slice(&fx.registry.signature().marker().to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        let vouched = trust(t, raw);
        assert_eq!(
            decode(d, &fx.registry, &vouched, &Heap).unwrap_err(),
            DecodeError::Malformed("empty object table")
        );
    }

    #[test]
    fn test_trust_and_inspect_are_inverse() {
        let (_, _, i, t) = tokens();
        let raw = vec![1u8, 2, 3, 4];
        let vouched = trust(t, raw.clone());
        assert_eq!(inspect(i, &vouched), raw.as_slice());
    }

    #[test]
    fn test_inspect_marker() {
        let fx = fixture();
        let (e, _, i, t) = tokens();
        let graph = Node::new(fx.leaf, vec![FieldValue::Scalar(0)]);
        let bytes = encode(e, &fx.registry, &graph, &Heap).unwrap();
        assert_eq!(
            inspect_marker(i, &bytes),
            Some(fx.registry.signature().marker())
        );
        let short = trust(t, vec![1, 2, 3]);
        assert_eq!(inspect_marker(i, &short), None);
    }

    #[test]
    fn test_allocator_substitution() {
        let fx = fixture();
        let (e, d, _, _) = tokens();
        let graph = Node::new(fx.leaf, vec![FieldValue::Scalar(11)]);

        let counting = CountingAllocator::new();
        let bytes = encode(e, &fx.registry, &graph, &counting).unwrap();
        assert!(counting.calls.load(Ordering::Relaxed) > 0);

        let back = decode(d, &fx.registry, &bytes, &counting).unwrap();
        assert!(structurally_equal(&graph, &back));

        // An exhausted allocator surfaces as an error, not a panic.
        let broke = CountingAllocator::with_budget(4);
        assert!(matches!(
            encode(e, &fx.registry, &graph, &broke).unwrap_err(),
            EncodeError::Alloc(_)
        ));
    }
}
