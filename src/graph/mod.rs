//! Object-Graph Value Model
//!
//! The dynamic node type the engine traverses and reconstructs: a closed
//! variant set over scalars, references, and inline arrays, tagged by a
//! registered [`TypeId`].
//!
//! # Design
//! - Node identity is `Rc` pointer identity; sharing and cycles are
//!   ordinary aliasing of `NodeRef`s
//! - Owned and shared reference fields both hold strong references at
//!   runtime; the owned/shared distinction lives in the declared layout
//! - Interior mutability (`RefCell`) exists for the decoder's fix-up
//!   pass; encoded graphs are only ever borrowed immutably

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use alloc::collections::BTreeSet;

use crate::registry::TypeId;

/// Shared handle to a node in an object graph.
pub type NodeRef = Rc<RefCell<Node>>;

/// Runtime value of one field, mirroring the declared [`FieldKind`]s.
///
/// [`FieldKind`]: crate::registry::FieldKind
#[derive(Clone, Debug)]
pub enum FieldValue {
    /// Scalar payload; the declared width bounds the meaningful bits.
    Scalar(u64),
    /// Reference to another node (owned or shared per the layout).
    Ref(NodeRef),
    /// Inline array of element values.
    Array(Vec<FieldValue>),
}

/// One object in a graph: a type tag plus field values in layout order.
#[derive(Debug)]
pub struct Node {
    type_id: TypeId,
    fields: Vec<FieldValue>,
}

impl Node {
    /// Create a node with the given fields.
    pub fn new(type_id: TypeId, fields: Vec<FieldValue>) -> NodeRef {
        Rc::new(RefCell::new(Self { type_id, fields }))
    }

    /// Create a zero-initialized node with no fields yet.
    ///
    /// This is the decoder's allocation-pass output; the fix-up pass
    /// fills in the fields.
    pub fn blank(type_id: TypeId) -> NodeRef {
        Self::new(type_id, Vec::new())
    }

    /// The node's registered type id.
    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Field values in layout order.
    #[inline]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Replace the node's fields (decoder fix-up).
    pub(crate) fn set_fields(&mut self, fields: Vec<FieldValue>) {
        self.fields = fields;
    }
}

/// Stable identity of a node for map keys.
#[inline]
pub(crate) fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as usize
}

/// Field-by-field structural equality of two graphs, cycle-safe.
///
/// Reference fields compare by the structure of their targets, so two
/// independently built graphs of the same shape are equal even though
/// no node is pointer-identical. A node pair already under comparison
/// is taken as equal, which terminates cyclic walks.
pub fn structurally_equal(a: &NodeRef, b: &NodeRef) -> bool {
    let mut in_progress = BTreeSet::new();
    nodes_equal(a, b, &mut in_progress)
}

fn nodes_equal(a: &NodeRef, b: &NodeRef, in_progress: &mut BTreeSet<(usize, usize)>) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let pair = (node_key(a), node_key(b));
    if !in_progress.insert(pair) {
        return true;
    }
    let a = a.borrow();
    let b = b.borrow();
    a.type_id() == b.type_id()
        && a.fields().len() == b.fields().len()
        && a.fields()
            .iter()
            .zip(b.fields())
            .all(|(fa, fb)| fields_equal(fa, fb, in_progress))
}

fn fields_equal(
    a: &FieldValue,
    b: &FieldValue,
    in_progress: &mut BTreeSet<(usize, usize)>,
) -> bool {
    match (a, b) {
        (FieldValue::Scalar(x), FieldValue::Scalar(y)) => x == y,
        (FieldValue::Ref(x), FieldValue::Ref(y)) => nodes_equal(x, y, in_progress),
        (FieldValue::Array(xs), FieldValue::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| fields_equal(x, y, in_progress))
        }
        _ => false,
    }
}
