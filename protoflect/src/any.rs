//! The deferred sub-message box.
//!
//! When a wire message lands in a host field whose kind is the
//! polymorphic placeholder, its subtree is boxed here together with a
//! snapshot of the descriptor set that describes it. The caller later
//! coerces the box into a concrete struct, or enumerates its fields by
//! schema number, long after the pools may have changed.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

use log::{trace, warn};
use protoflect_core::{AnyPayload, AnyValue, StructValue, Value};
use protoflect_wire::{
    DescriptorSet, FieldDef, MessageDef, MessageId, WireKind, WireMessage, WireValue,
};

use crate::codec::decode_struct_inner;

/// Payload of a deferred sub-message: the subtree plus the descriptor
/// snapshot that keeps its field numbers meaningful.
pub(crate) struct MessageHolder {
    set: Arc<DescriptorSet>,
    message: MessageId,
    msg: WireMessage,
}

impl MessageHolder {
    pub(crate) fn new(set: Arc<DescriptorSet>, message: MessageId, msg: WireMessage) -> Self {
        Self { set, message, msg }
    }

    /// Descriptor of the boxed message.
    pub(crate) fn desc(&self) -> MessageDef<'_> {
        self.set.message(self.message)
    }

    /// The boxed subtree.
    pub(crate) fn message(&self) -> &WireMessage {
        &self.msg
    }
}

impl AnyPayload for MessageHolder {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for MessageHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHolder")
            .field("message", &self.desc().full_name())
            .field("fields", &self.msg.len())
            .finish()
    }
}

/// The boxed payload of a deferred value, when it holds one of ours.
pub(crate) fn holder_of(any: &AnyValue) -> Option<&MessageHolder> {
    any.payload()?.as_any().downcast_ref::<MessageHolder>()
}

fn kinds_compatible(a: WireKind, b: WireKind) -> bool {
    use WireKind::*;
    a == b
        || matches!(
            (a, b),
            (Int32 | UInt32 | Enum, Int32 | UInt32 | Enum)
                | (Int64 | UInt64, Int64 | UInt64)
                | (String | Bytes, String | Bytes)
        )
}

/// Every populated field of the boxed payload must exist in the target
/// descriptor under a compatible kind.
fn covers(target: MessageDef<'_>, source: MessageDef<'_>, msg: &WireMessage) -> bool {
    msg.field_numbers().all(|number| {
        let Some(t) = target.find_field_by_number(number) else {
            return false;
        };
        let Some(s) = source.find_field_by_number(number) else {
            return false;
        };
        kinds_compatible(t.kind(), s.kind())
    })
}

/// Resolves a deferred value into a concrete struct.
///
/// False on an empty box, and false when the target descriptor does not
/// structurally cover the boxed payload; the output struct is untouched
/// in both cases. On success the whole payload is committed at once.
pub fn coerce(any: &AnyValue, desc: MessageDef<'_>, out: &mut StructValue) -> bool {
    let Some(holder) = holder_of(any) else {
        trace!("coerce on an empty deferred value");
        return false;
    };
    if !covers(desc, holder.desc(), holder.message()) {
        warn!(
            "deferred message {} does not fit target type {}",
            holder.desc().full_name(),
            desc.full_name()
        );
        return false;
    }
    let mut scratch = out.clone();
    decode_struct_inner(holder.message(), desc, &mut scratch, None);
    *out = scratch;
    true
}

/// Reads one field of a deferred value by schema field number, without
/// coercing the whole box. Returns the field's schema name and its
/// converted value; message fields come back as nested deferred values.
pub fn enumerate(any: &AnyValue, number: u32) -> Option<(String, Value)> {
    let holder = holder_of(any)?;
    let field = holder.desc().find_field_by_number(number)?;
    let raw = holder.message().get(number)?;
    Some((
        field.name().to_string(),
        wire_to_value(field, raw, &holder.set),
    ))
}

fn wire_to_value(field: FieldDef<'_>, raw: &WireValue, set: &Arc<DescriptorSet>) -> Value {
    match raw {
        WireValue::Bool(v) => Value::Bool(*v),
        WireValue::I32(v) => {
            if field.kind() == WireKind::Enum {
                Value::Enum(i64::from(*v))
            } else {
                Value::I32(*v)
            }
        }
        WireValue::U32(v) => Value::U32(*v),
        WireValue::I64(v) => Value::I64(*v),
        WireValue::U64(v) => Value::U64(*v),
        WireValue::F32(v) => Value::F32(*v),
        WireValue::F64(v) => Value::F64(*v),
        WireValue::Str(s) => Value::Str(s.clone()),
        WireValue::Bytes(b) => Value::Array(b.iter().map(|byte| Value::U8(*byte)).collect()),
        WireValue::Message(m) => match field.message_subdef() {
            Some(subdef) => {
                let mut nested = AnyValue::default();
                nested.set(Arc::new(MessageHolder::new(
                    Arc::clone(set),
                    subdef.id(),
                    m.clone(),
                )));
                Value::Any(nested)
            }
            None => Value::Any(AnyValue::default()),
        },
        WireValue::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| wire_to_value(field, item, set))
                .collect(),
        ),
        WireValue::Map(entries) => {
            let (Some(key_def), Some(value_def)) = (field.map_key_def(), field.map_value_def())
            else {
                return Value::Map(Vec::new());
            };
            Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| {
                        (
                            wire_to_value(key_def, k, set),
                            wire_to_value(value_def, v, set),
                        )
                    })
                    .collect(),
            )
        }
    }
}
