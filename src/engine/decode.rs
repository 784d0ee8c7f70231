//! Graph Decoder
//!
//! Reconstructs an object graph from encoder output in two passes:
//! allocate one blank node per record, then resolve reference fields
//! through the index table.
//!
//! # Design
//! - Pass 1 validates the structural shape of every record and copies
//!   each payload into a zero-initialized block of its exact size from
//!   the external allocator
//! - Pass 2 re-reads each payload image; two fields naming the same
//!   serial index resolve to the identical node, which is what
//!   reconstructs cycles and sharing
//! - The header marker is read and skipped, never compared: signature
//!   screening is the caller's advisory step, not a decode check

use alloc::vec::Vec;

use log::{debug, trace};

use crate::graph::{FieldValue, Node, NodeRef};
use crate::mem::{Allocator, Block};
use crate::registry::{FieldKind, LengthMode, RefTarget, Registry, TypeDescriptor, TypeId};

use super::wire::ByteReader;
use super::{DecodeError, Serialised};

pub(super) fn decode_graph<A: Allocator>(
    registry: &Registry,
    data: &Serialised,
    alloc: &A,
) -> Result<NodeRef, DecodeError> {
    let mut reader = ByteReader::new(data.bytes());
    let marker = reader.read_u64()?;
    let count = reader.read_u32()? as usize;
    trace!("decode: marker {marker:#018x}, {count} records");
    if count == 0 {
        return Err(DecodeError::Malformed("empty object table"));
    }

    // Allocation pass.
    let mut table: Vec<NodeRef> = Vec::with_capacity(count);
    let mut images: Vec<(&TypeDescriptor, Block)> = Vec::with_capacity(count);
    for serial in 0..count {
        let type_id = TypeId::new(reader.read_u32()?);
        let desc = registry
            .lookup(type_id)
            .ok_or(DecodeError::UnknownType(type_id))?;
        trace!("decode: record {serial} type {type_id}");

        let start = reader.position();
        skip_payload(desc.fields(), &mut reader)?;
        let payload = reader.span(start, reader.position());

        let mut image = alloc.allocate_zeroed(payload.len())?;
        image.as_mut_slice().copy_from_slice(payload);
        images.push((desc, image));
        table.push(Node::blank(type_id));
    }
    if reader.remaining() != 0 {
        return Err(DecodeError::Malformed("trailing bytes"));
    }

    // Fix-up pass.
    for (node, (desc, image)) in table.iter().zip(&images) {
        let mut payload = ByteReader::new(image.as_slice());
        let mut fields = Vec::with_capacity(desc.fields().len());
        for kind in desc.fields() {
            fields.push(read_field(kind, &mut payload, &table)?);
        }
        node.borrow_mut().set_fields(fields);
    }

    debug!("decode: reconstructed {count} objects");
    Ok(table[0].clone())
}

/// Structurally walk one payload, validating bounds and array lengths.
fn skip_payload(kinds: &[FieldKind], reader: &mut ByteReader<'_>) -> Result<(), DecodeError> {
    for kind in kinds {
        skip_field(kind, reader)?;
    }
    Ok(())
}

fn skip_field(kind: &FieldKind, reader: &mut ByteReader<'_>) -> Result<(), DecodeError> {
    match kind {
        FieldKind::Scalar(width) => {
            reader.read_exact(width.bytes())?;
        }
        FieldKind::OwnedRef(_) | FieldKind::SharedRef => {
            reader.read_u32()?;
        }
        FieldKind::InlineArray(elem, LengthMode::Fixed(len)) => {
            for _ in 0..*len {
                skip_field(elem, reader)?;
            }
        }
        FieldKind::InlineArray(elem, LengthMode::Prefixed) => {
            let len = reader.read_u32()? as usize;
            // A length no payload of the remaining size could satisfy is
            // structurally inconsistent, not merely truncated.
            let floor = elem.min_size().max(1);
            if len.checked_mul(floor).map_or(true, |n| n > reader.remaining()) {
                return Err(DecodeError::Malformed("array length out of range"));
            }
            for _ in 0..len {
                skip_field(elem, reader)?;
            }
        }
    }
    Ok(())
}

/// Materialize one field from a validated payload image.
fn read_field(
    kind: &FieldKind,
    payload: &mut ByteReader<'_>,
    table: &[NodeRef],
) -> Result<FieldValue, DecodeError> {
    match kind {
        FieldKind::Scalar(width) => Ok(FieldValue::Scalar(payload.read_scalar(*width)?)),
        FieldKind::OwnedRef(ref_target) => {
            let target = resolve_index(payload, table)?;
            if let RefTarget::Exact(expected) = ref_target {
                if target.borrow().type_id() != *expected {
                    return Err(DecodeError::Malformed("reference target type mismatch"));
                }
            }
            Ok(FieldValue::Ref(target))
        }
        FieldKind::SharedRef => Ok(FieldValue::Ref(resolve_index(payload, table)?)),
        FieldKind::InlineArray(elem, mode) => {
            let len = match mode {
                LengthMode::Fixed(len) => *len as usize,
                LengthMode::Prefixed => payload.read_u32()? as usize,
            };
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(read_field(elem, payload, table)?);
            }
            Ok(FieldValue::Array(items))
        }
    }
}

fn resolve_index(
    payload: &mut ByteReader<'_>,
    table: &[NodeRef],
) -> Result<NodeRef, DecodeError> {
    let serial = payload.read_u32()? as usize;
    table
        .get(serial)
        .cloned()
        .ok_or(DecodeError::Malformed("reference index out of range"))
}
