//! Graph Encoder
//!
//! Walks the object graph reachable from a root, assigns dense serial
//! indices, and emits one type-tagged record per distinct object.
//!
//! # Design
//! - Iterative breadth-first traversal: no call stack proportional to
//!   graph depth, so arbitrarily long cycles are safe
//! - An identity map keyed on node addresses guarantees each object is
//!   emitted exactly once; a back-reference encodes as a bare index
//! - The source graph is only ever borrowed immutably

use alloc::collections::BTreeMap;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::graph::{node_key, FieldValue, NodeRef};
use crate::mem::Allocator;
use crate::registry::{FieldKind, LengthMode, RefTarget, Registry, TypeId};

use super::wire::ByteWriter;
use super::{EncodeError, Serialised};

pub(super) fn encode_graph<A: Allocator>(
    registry: &Registry,
    root: &NodeRef,
    alloc: &A,
) -> Result<Serialised, EncodeError> {
    let (index, order) = assign_indices(registry, root)?;
    debug!("encode: {} objects reachable from root", order.len());

    let mut writer = ByteWriter::new(alloc)?;
    writer.push_u64(registry.signature().marker())?;
    writer.push_u32(order.len() as u32)?;

    for (serial, node) in order.iter().enumerate() {
        let n = node.borrow();
        let type_id = n.type_id();
        // Present in the registry: traversal already looked it up.
        let desc = registry
            .lookup(type_id)
            .ok_or(EncodeError::UnsupportedType(type_id))?;
        trace!("encode: record {serial} type {type_id}");

        if n.fields().len() != desc.fields().len() {
            return Err(EncodeError::LayoutMismatch { type_id, field: 0 });
        }
        writer.push_u32(type_id.as_u32())?;
        for (field_idx, (value, kind)) in n.fields().iter().zip(desc.fields()).enumerate() {
            emit_field(&mut writer, value, kind, &index, type_id, field_idx)?;
        }
    }

    let bytes = writer.finish()?;
    debug!("encode: {} bytes emitted", bytes.len());
    Ok(Serialised::from_boxed(bytes))
}

/// Breadth-first discovery of every reachable node.
///
/// Returns the identity map (node address to serial index) and the
/// nodes in discovery order; the root is always index 0.
fn assign_indices(
    registry: &Registry,
    root: &NodeRef,
) -> Result<(BTreeMap<usize, u32>, Vec<NodeRef>), EncodeError> {
    let mut index = BTreeMap::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    intern(&mut index, &mut order, &mut queue, root)?;
    while let Some(node) = queue.pop_front() {
        let n = node.borrow();
        let type_id = n.type_id();
        if registry.lookup(type_id).is_none() {
            return Err(EncodeError::UnsupportedType(type_id));
        }
        for value in n.fields() {
            discover(&mut index, &mut order, &mut queue, value)?;
        }
    }
    Ok((index, order))
}

fn discover(
    index: &mut BTreeMap<usize, u32>,
    order: &mut Vec<NodeRef>,
    queue: &mut VecDeque<NodeRef>,
    value: &FieldValue,
) -> Result<(), EncodeError> {
    match value {
        FieldValue::Scalar(_) => Ok(()),
        FieldValue::Ref(target) => intern(index, order, queue, target),
        FieldValue::Array(items) => {
            for item in items {
                discover(index, order, queue, item)?;
            }
            Ok(())
        }
    }
}

fn intern(
    index: &mut BTreeMap<usize, u32>,
    order: &mut Vec<NodeRef>,
    queue: &mut VecDeque<NodeRef>,
    node: &NodeRef,
) -> Result<(), EncodeError> {
    let key = node_key(node);
    if index.contains_key(&key) {
        return Ok(());
    }
    if order.len() >= u32::MAX as usize {
        return Err(EncodeError::GraphTooLarge);
    }
    index.insert(key, order.len() as u32);
    order.push(node.clone());
    queue.push_back(node.clone());
    Ok(())
}

fn emit_field<A: Allocator>(
    writer: &mut ByteWriter<'_, A>,
    value: &FieldValue,
    kind: &FieldKind,
    index: &BTreeMap<usize, u32>,
    type_id: TypeId,
    field_idx: usize,
) -> Result<(), EncodeError> {
    let mismatch = EncodeError::LayoutMismatch {
        type_id,
        field: field_idx,
    };
    match (value, kind) {
        (FieldValue::Scalar(v), FieldKind::Scalar(width)) => {
            if !width.fits(*v) {
                return Err(mismatch);
            }
            writer.push_scalar(*v, *width)?;
        }
        (FieldValue::Ref(target), FieldKind::OwnedRef(ref_target)) => {
            if let RefTarget::Exact(expected) = ref_target {
                if target.borrow().type_id() != *expected {
                    return Err(mismatch);
                }
            }
            writer.push_u32(serial_of(index, target, mismatch)?)?;
        }
        (FieldValue::Ref(target), FieldKind::SharedRef) => {
            writer.push_u32(serial_of(index, target, mismatch)?)?;
        }
        (FieldValue::Array(items), FieldKind::InlineArray(elem, mode)) => {
            match mode {
                LengthMode::Fixed(expected) => {
                    if items.len() != *expected as usize {
                        return Err(mismatch);
                    }
                }
                LengthMode::Prefixed => {
                    let len = u32::try_from(items.len()).map_err(|_| EncodeError::GraphTooLarge)?;
                    writer.push_u32(len)?;
                }
            }
            for item in items {
                emit_field(writer, item, elem, index, type_id, field_idx)?;
            }
        }
        _ => return Err(mismatch),
    }
    Ok(())
}

/// Serial index of a previously interned node.
///
/// Every reference target is interned during traversal, so a miss can
/// only mean the graph changed between passes; degrade to an error
/// rather than panicking.
fn serial_of(
    index: &BTreeMap<usize, u32>,
    target: &NodeRef,
    missing: EncodeError,
) -> Result<u32, EncodeError> {
    index.get(&node_key(target)).copied().ok_or(missing)
}
