//! The recursive struct codec and its byte-level entry points.
//!
//! Schema fields drive both directions: each descriptor field is matched
//! to a host field by name (exact first, then with the generated-name
//! suffix stripped from the host name) and handed to the kind visitors.
//! Unmatched schema fields are skipped with a warning, never an error.

use std::sync::Arc;

use log::{trace, warn};
use protoflect_core::{StructTy, StructValue};
use protoflect_wire::{decode_message, encode_message, DescriptorSet, MessageDef, WireMessage};

use crate::pool::{normalize_generated_name, DescriptorPoolRegistry, PoolId};
use crate::view::{FieldReader, FieldWriter};
use crate::visit;

fn match_host_field(ty: &StructTy, schema_name: &str) -> Option<usize> {
    ty.field_index(schema_name).or_else(|| {
        ty.fields
            .iter()
            .position(|f| normalize_generated_name(&f.name) == schema_name)
    })
}

/// Encodes a host struct into a wire message tree.
///
/// Returns the number of host fields written, counting nested recursion.
pub fn encode_struct(value: &StructValue, desc: MessageDef<'_>, out: &mut WireMessage) -> usize {
    let ty = value.ty();
    let mut matched = 0;
    for field in desc.fields() {
        let Some(index) = match_host_field(ty, field.name()) else {
            warn!(
                "schema field {} of {} has no host counterpart; skipped",
                field.name(),
                desc.full_name()
            );
            continue;
        };
        let kind = &ty.fields[index].kind;
        let mut writer = FieldWriter::new(field, out);
        matched += visit::write_value(&mut writer, kind, value.value_at(index));
    }
    matched
}

/// Decodes a wire message tree into a host struct.
///
/// Returns the number of host fields read, counting nested recursion.
pub fn decode_struct(msg: &WireMessage, desc: MessageDef<'_>, value: &mut StructValue) -> usize {
    decode_struct_inner(msg, desc, value, None)
}

/// `snapshot`, when present, is the owning `Arc` of `desc`'s set; it is
/// handed to deferred boxes so they outlive pool mutation. Without it a
/// box clones the set for itself.
pub(crate) fn decode_struct_inner(
    msg: &WireMessage,
    desc: MessageDef<'_>,
    value: &mut StructValue,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    let ty = Arc::clone(value.ty());
    let mut matched = 0;
    for field in desc.fields() {
        let Some(index) = match_host_field(&ty, field.name()) else {
            warn!(
                "schema field {} of {} has no host counterpart; skipped",
                field.name(),
                desc.full_name()
            );
            continue;
        };
        let kind = &ty.fields[index].kind;
        let reader = FieldReader::new(field, msg);
        matched += visit::read_value(reader, kind, value.value_at_mut(index), snapshot);
    }
    matched
}

/// Serializes a host struct to protobuf bytes using the schema
/// registered for `type_name`. `None` when no schema resolves or the
/// wire encode fails.
pub fn encode_struct_to_bytes(
    registry: &DescriptorPoolRegistry,
    type_name: &str,
    value: &StructValue,
    pool: PoolId,
) -> Option<Vec<u8>> {
    let Some(desc) = registry.resolve(pool, type_name) else {
        warn!("no schema for type {type_name} in pool {}", pool.0);
        return None;
    };
    let mut msg = WireMessage::new();
    let matched = encode_struct(value, desc, &mut msg);
    trace!("encoded {matched} host fields of {type_name}");
    match encode_message(desc, &msg) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!("wire encode failed for {type_name}: {err}");
            None
        }
    }
}

/// Parses protobuf bytes into a host struct using the schema registered
/// for `type_name`.
///
/// False when no schema resolves or the bytes do not parse; in both
/// cases the host struct is untouched. Schema fields without a host
/// counterpart (and vice versa) are tolerated.
pub fn decode_struct_from_bytes(
    registry: &DescriptorPoolRegistry,
    bytes: &[u8],
    type_name: &str,
    value: &mut StructValue,
    pool: PoolId,
) -> bool {
    let Some(desc) = registry.resolve(pool, type_name) else {
        warn!("no schema for type {type_name} in pool {}", pool.0);
        return false;
    };
    let msg = match decode_message(desc, bytes) {
        Ok(msg) => msg,
        Err(err) => {
            warn!("wire decode failed for {type_name}: {err}");
            return false;
        }
    };
    let matched = decode_struct_inner(&msg, desc, value, registry.pool(pool));
    trace!("decoded {matched} host fields of {type_name}");
    true
}
