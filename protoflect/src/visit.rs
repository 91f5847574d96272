//! Kind dispatch between host values and wire locations.
//!
//! One visitor per direction: [`write_value`] moves a host [`Value`]
//! into a [`FieldWriter`], [`read_value`] fills a host [`Value`] from a
//! [`FieldReader`]. Both take the host [`FieldKind`] so containers know
//! their element kinds and enums keep their symbol tables.

use std::sync::Arc;

use log::{trace, warn};
use protoflect_core::{AnyValue, FieldKind, StructValue, Value};
use protoflect_wire::{DescriptorSet, WireKind, WireMessage, WireValue};

use crate::any::{holder_of, MessageHolder};
use crate::codec::{decode_struct_inner, encode_struct};
use crate::view::{FieldReader, FieldWriter, ReadValue, WireScalar};

/// Writes one host value into the writer's location. Returns the number
/// of host fields written, counting nested struct recursion; 0 means the
/// value was skipped.
pub(crate) fn write_value(
    writer: &mut FieldWriter<'_, '_>,
    kind: &FieldKind,
    value: &Value,
) -> usize {
    // A lone host value feeding a repeated wire field becomes element 0.
    if writer.slot().is_none()
        && writer.field().is_repeated()
        && !writer.field().is_map()
        && !matches!(
            kind,
            FieldKind::Array(_) | FieldKind::Set(_) | FieldKind::Map(_, _)
        )
    {
        let mut element = writer.array_element_writer(0);
        return write_value(&mut element, kind, value);
    }
    // Only a map host value may land in a map field; anything else would
    // clobber the entry list or address it like an array.
    if writer.field().is_map() && !matches!(kind, FieldKind::Map(_, _)) {
        warn!(
            "host value of kind {kind:?} cannot feed map field {}; skipped",
            writer.field().name()
        );
        return 0;
    }
    match (kind, value) {
        (FieldKind::Bool, Value::Bool(v)) => {
            if writer.kind() == WireKind::String {
                writer.set_str(if *v { "true" } else { "false" });
                1
            } else {
                write_int(writer, i64::from(*v))
            }
        }
        (FieldKind::I8, Value::I8(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::U8, Value::U8(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::I16, Value::I16(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::U16, Value::U16(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::I32, Value::I32(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::U32, Value::U32(v)) => write_int(writer, i64::from(*v)),
        (FieldKind::I64, Value::I64(v)) => write_int(writer, *v),
        (FieldKind::U64, Value::U64(v)) => write_uint(writer, *v),
        (FieldKind::F32, Value::F32(v)) => write_float(writer, f64::from(*v)),
        (FieldKind::F64, Value::F64(v)) => write_float(writer, *v),
        (
            FieldKind::Str | FieldKind::Name | FieldKind::Text | FieldKind::SoftPath,
            Value::Str(s) | Value::Name(s) | Value::Text(s) | Value::SoftPath(s),
        ) => write_text(writer, s),
        (FieldKind::Enum(ty), Value::Enum(v)) => {
            if writer.kind() == WireKind::String {
                match ty.name_by_value(*v) {
                    Some(name) => writer.set_str(name),
                    None => writer.set_str(&v.to_string()),
                }
                1
            } else {
                write_int(writer, *v)
            }
        }
        (FieldKind::Struct(_), Value::Struct(sv)) => write_struct(writer, sv),
        (FieldKind::Array(elem), Value::Array(items))
        | (FieldKind::Set(elem), Value::Set(items)) => write_sequence(writer, elem, items),
        (FieldKind::Map(key_kind, value_kind), Value::Map(entries)) => {
            write_map(writer, key_kind, value_kind, entries)
        }
        (FieldKind::Any, Value::Any(any)) => write_any(writer, any),
        (kind, value) => {
            warn!("host value {value:?} does not match field kind {kind:?}; skipped");
            0
        }
    }
}

fn write_int(writer: &mut FieldWriter<'_, '_>, v: i64) -> usize {
    match writer.kind() {
        WireKind::Bool => writer.set_scalar(v != 0),
        WireKind::Int32 | WireKind::Enum => writer.set_scalar(v as i32),
        WireKind::UInt32 => writer.set_scalar(v as u32),
        WireKind::Int64 => writer.set_scalar(v),
        WireKind::UInt64 => writer.set_scalar(v as u64),
        WireKind::Float => writer.set_scalar(v as f32),
        WireKind::Double => writer.set_scalar(v as f64),
        WireKind::String => writer.set_str(&v.to_string()),
        other => {
            warn!(
                "integer host value cannot feed wire kind {other:?} (field {})",
                writer.field().name()
            );
            return 0;
        }
    }
    1
}

fn write_uint(writer: &mut FieldWriter<'_, '_>, v: u64) -> usize {
    match writer.kind() {
        WireKind::UInt64 => {
            writer.set_scalar(v);
            1
        }
        WireKind::Int64 => {
            writer.set_scalar(v as i64);
            1
        }
        _ => write_int(writer, v as i64),
    }
}

fn write_float(writer: &mut FieldWriter<'_, '_>, v: f64) -> usize {
    match writer.kind() {
        WireKind::Float => writer.set_scalar(v as f32),
        WireKind::Double => writer.set_scalar(v),
        WireKind::String => writer.set_str(&v.to_string()),
        WireKind::Int32 => writer.set_scalar(v as i32),
        WireKind::Int64 => writer.set_scalar(v as i64),
        other => {
            warn!(
                "float host value cannot feed wire kind {other:?} (field {})",
                writer.field().name()
            );
            return 0;
        }
    }
    1
}

fn write_text(writer: &mut FieldWriter<'_, '_>, text: &str) -> usize {
    match writer.kind() {
        WireKind::String => {
            writer.set_str(text);
            1
        }
        WireKind::Bytes => {
            writer.set_bytes(text.as_bytes());
            1
        }
        WireKind::Enum => {
            // symbolic first, then a plain number
            let number = writer
                .field()
                .enum_subdef()
                .and_then(|e| e.number_by_name(text))
                .or_else(|| text.parse().ok());
            match number {
                Some(n) => {
                    writer.set_scalar(n);
                    1
                }
                None => {
                    warn!(
                        "no enum value named {text:?} for field {}",
                        writer.field().name()
                    );
                    0
                }
            }
        }
        WireKind::Bool => write_parsed::<bool>(writer, text),
        WireKind::Int32 => write_parsed::<i32>(writer, text),
        WireKind::UInt32 => write_parsed::<u32>(writer, text),
        WireKind::Int64 => write_parsed::<i64>(writer, text),
        WireKind::UInt64 => write_parsed::<u64>(writer, text),
        WireKind::Float => write_parsed::<f32>(writer, text),
        WireKind::Double => write_parsed::<f64>(writer, text),
        WireKind::Message => {
            warn!(
                "text host value cannot feed message field {}",
                writer.field().name()
            );
            0
        }
    }
}

fn write_parsed<T: WireScalar + core::str::FromStr>(
    writer: &mut FieldWriter<'_, '_>,
    text: &str,
) -> usize {
    match text.parse::<T>() {
        Ok(v) => {
            writer.set_scalar(v);
            1
        }
        Err(_) => {
            warn!(
                "could not parse {text:?} for field {}",
                writer.field().name()
            );
            0
        }
    }
}

fn write_struct(writer: &mut FieldWriter<'_, '_>, value: &StructValue) -> usize {
    let Some(subdef) = writer.field().message_subdef() else {
        warn!(
            "field {} is not a message; struct value skipped",
            writer.field().name()
        );
        return 0;
    };
    let mut sub = WireMessage::new();
    let nested = encode_struct(value, subdef, &mut sub);
    writer.set_message(sub);
    1 + nested
}

fn write_sequence(writer: &mut FieldWriter<'_, '_>, elem: &FieldKind, items: &[Value]) -> usize {
    // Byte blobs travel as one bytes field, not element by element.
    if writer.kind() == WireKind::Bytes && matches!(elem, FieldKind::U8 | FieldKind::I8) {
        let bytes: Vec<u8> = items
            .iter()
            .map(|v| match v {
                Value::U8(b) => *b,
                Value::I8(b) => *b as u8,
                _ => 0,
            })
            .collect();
        if writer.field().is_repeated() && writer.slot().is_none() {
            writer.array_element_writer(0).set_bytes(&bytes);
        } else {
            writer.set_bytes(&bytes);
        }
        return 1;
    }
    if !writer.field().is_repeated() {
        // singular wire field: first element only
        return match items.first() {
            Some(first) => write_value(writer, elem, first),
            None => 0,
        };
    }
    if items.is_empty() {
        return 0;
    }
    writer.ensure_array_len(items.len());
    let mut n = 1;
    for (i, item) in items.iter().enumerate() {
        let mut element = writer.array_element_writer(i);
        n += write_value(&mut element, elem, item);
    }
    n
}

fn write_map(
    writer: &mut FieldWriter<'_, '_>,
    key_kind: &FieldKind,
    value_kind: &FieldKind,
    entries: &[(Value, Value)],
) -> usize {
    let (Some(key_def), Some(value_def)) =
        (writer.field().map_key_def(), writer.field().map_value_def())
    else {
        warn!(
            "field {} is not a map; map value skipped",
            writer.field().name()
        );
        return 0;
    };
    let mut n = 1;
    for (key, value) in entries {
        let mut key_slot = WireValue::default_for(key_def.kind());
        let mut key_writer = FieldWriter::immediate(key_def, &mut key_slot);
        if write_value(&mut key_writer, key_kind, key) == 0 {
            continue;
        }
        let mut value_slot = WireValue::default_for(value_def.kind());
        let mut value_writer = FieldWriter::immediate(value_def, &mut value_slot);
        if write_value(&mut value_writer, value_kind, value) == 0 {
            continue;
        }
        if writer.map_insert(key_slot, value_slot) {
            n += 1;
        }
    }
    n
}

fn write_any(writer: &mut FieldWriter<'_, '_>, any: &AnyValue) -> usize {
    let Some(holder) = holder_of(any) else {
        trace!(
            "empty deferred value for field {}; nothing written",
            writer.field().name()
        );
        return 0;
    };
    let Some(subdef) = writer.field().message_subdef() else {
        warn!(
            "field {} is not a message; deferred value skipped",
            writer.field().name()
        );
        return 0;
    };
    if holder.desc().full_name() != subdef.full_name() {
        warn!(
            "deferred message {} cannot feed field {} of type {}",
            holder.desc().full_name(),
            writer.field().name(),
            subdef.full_name()
        );
        return 0;
    }
    writer.set_message(holder.message().clone());
    1
}

/// Fills one host value from the reader's location. Returns the number
/// of host fields read, counting nested struct recursion; 0 means the
/// location was absent or could not land in this kind.
pub(crate) fn read_value(
    reader: FieldReader<'_>,
    kind: &FieldKind,
    value: &mut Value,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    match kind {
        FieldKind::Struct(_) => read_struct(reader, value, snapshot),
        FieldKind::Array(elem) => read_sequence(reader, elem, value, false, snapshot),
        FieldKind::Set(elem) => read_sequence(reader, elem, value, true, snapshot),
        FieldKind::Map(key_kind, value_kind) => {
            read_map(reader, key_kind, value_kind, value, snapshot)
        }
        FieldKind::Any => read_any(reader, value, snapshot),
        _ => read_scalar(reader, kind, value),
    }
}

fn read_scalar(reader: FieldReader<'_>, kind: &FieldKind, value: &mut Value) -> usize {
    // A repeated wire field lands in a scalar host field via element 0.
    if let Some(WireValue::Array(items)) = reader.raw_value() {
        if items.is_empty() {
            return 0;
        }
        return read_scalar(reader.array_element(0), kind, value);
    }
    match reader.dispatch() {
        ReadValue::Absent => 0,
        ReadValue::Str(text) => {
            if let FieldKind::Enum(ty) = kind {
                if let Some(n) = ty.value_by_name(text) {
                    *value = Value::Enum(n);
                    return 1;
                }
            }
            if value.import_text(text) {
                1
            } else {
                warn!("could not import text {text:?} into {kind:?}");
                0
            }
        }
        ReadValue::Bytes(bytes) => match value {
            Value::Str(s) | Value::Name(s) | Value::Text(s) | Value::SoftPath(s) => {
                *s = String::from_utf8_lossy(bytes).into_owned();
                1
            }
            _ => {
                warn!("bytes value cannot land in {kind:?}");
                0
            }
        },
        ReadValue::Container(_) => {
            warn!("message value cannot land in scalar kind {kind:?}");
            0
        }
        rv => assign_numeric(rv, kind, value),
    }
}

fn rv_as_i64(rv: ReadValue<'_>) -> i64 {
    match rv {
        ReadValue::Bool(v) => i64::from(v),
        ReadValue::I32(v) => i64::from(v),
        ReadValue::U32(v) => i64::from(v),
        ReadValue::I64(v) => v,
        ReadValue::U64(v) => v as i64,
        ReadValue::F32(v) => v as i64,
        ReadValue::F64(v) => v as i64,
        _ => 0,
    }
}

fn rv_as_f64(rv: ReadValue<'_>) -> f64 {
    match rv {
        ReadValue::F32(v) => f64::from(v),
        ReadValue::F64(v) => v,
        ReadValue::U64(v) => v as f64,
        other => rv_as_i64(other) as f64,
    }
}

fn rv_to_text(rv: ReadValue<'_>) -> String {
    match rv {
        ReadValue::Bool(v) => v.to_string(),
        ReadValue::I32(v) => v.to_string(),
        ReadValue::U32(v) => v.to_string(),
        ReadValue::I64(v) => v.to_string(),
        ReadValue::U64(v) => v.to_string(),
        ReadValue::F32(v) => v.to_string(),
        ReadValue::F64(v) => v.to_string(),
        _ => String::new(),
    }
}

fn assign_numeric(rv: ReadValue<'_>, kind: &FieldKind, value: &mut Value) -> usize {
    match value {
        Value::Bool(x) => *x = rv_as_i64(rv) != 0,
        Value::I8(x) => *x = rv_as_i64(rv) as i8,
        Value::U8(x) => *x = rv_as_i64(rv) as u8,
        Value::I16(x) => *x = rv_as_i64(rv) as i16,
        Value::U16(x) => *x = rv_as_i64(rv) as u16,
        Value::I32(x) => *x = rv_as_i64(rv) as i32,
        Value::U32(x) => *x = rv_as_i64(rv) as u32,
        Value::I64(x) => *x = rv_as_i64(rv),
        Value::U64(x) => {
            *x = match rv {
                ReadValue::U64(v) => v,
                other => rv_as_i64(other) as u64,
            }
        }
        Value::F32(x) => *x = rv_as_f64(rv) as f32,
        Value::F64(x) => *x = rv_as_f64(rv),
        Value::Str(s) | Value::Name(s) | Value::Text(s) | Value::SoftPath(s) => {
            *s = rv_to_text(rv);
        }
        Value::Enum(e) => {
            let n = rv_as_i64(rv);
            if let FieldKind::Enum(ty) = kind {
                if ty.name_by_value(n).is_none() {
                    trace!("enum {} has no symbol for {n}", ty.name);
                }
            }
            *e = n;
        }
        other => {
            warn!("numeric value cannot land in {other:?}");
            return 0;
        }
    }
    1
}

fn read_struct(
    reader: FieldReader<'_>,
    value: &mut Value,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    let Value::Struct(sv) = value else {
        warn!("struct kind holds non-struct value {value:?}");
        return 0;
    };
    let Some(subdef) = reader.field().message_subdef() else {
        warn!(
            "field {} is not a message; struct left untouched",
            reader.field().name()
        );
        return 0;
    };
    match reader.raw_value() {
        Some(WireValue::Message(m)) => 1 + decode_struct_inner(m, subdef, sv, snapshot),
        // repeated wire into a singular struct: element 0
        Some(WireValue::Array(items)) => match items.first() {
            Some(WireValue::Message(m)) => 1 + decode_struct_inner(m, subdef, sv, snapshot),
            _ => 0,
        },
        _ => 0,
    }
}

fn read_sequence(
    reader: FieldReader<'_>,
    elem: &FieldKind,
    value: &mut Value,
    is_set: bool,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    let items = match value {
        Value::Array(items) | Value::Set(items) => items,
        other => {
            warn!("sequence kind holds non-sequence value {other:?}");
            return 0;
        }
    };
    match reader.raw_value() {
        None => 0,
        Some(WireValue::Bytes(_) | WireValue::Str(_))
            if matches!(elem, FieldKind::U8 | FieldKind::I8) =>
        {
            let bytes = reader.get_bytes();
            *items = bytes
                .iter()
                .map(|b| {
                    if matches!(elem, FieldKind::I8) {
                        Value::I8(*b as i8)
                    } else {
                        Value::U8(*b)
                    }
                })
                .collect();
            1
        }
        // a blob stored as element 0 of a repeated bytes field
        Some(WireValue::Array(elems))
            if matches!(elem, FieldKind::U8 | FieldKind::I8)
                && matches!(
                    elems.first(),
                    Some(WireValue::Bytes(_) | WireValue::Str(_))
                ) =>
        {
            let bytes = reader.array_element(0).get_bytes();
            *items = bytes
                .iter()
                .map(|b| {
                    if matches!(elem, FieldKind::I8) {
                        Value::I8(*b as i8)
                    } else {
                        Value::U8(*b)
                    }
                })
                .collect();
            1
        }
        Some(WireValue::Array(_)) => {
            let n = reader.array_len();
            let mut out = Vec::with_capacity(n);
            let mut count = 1;
            for i in 0..n {
                let mut v = Value::default_for(elem);
                let got = read_value(reader.array_element(i), elem, &mut v, snapshot);
                if got == 0 {
                    continue;
                }
                count += got;
                if is_set && out.contains(&v) {
                    continue;
                }
                out.push(v);
            }
            *items = out;
            count
        }
        Some(_) => {
            // singular wire value: one-element host sequence
            let mut v = Value::default_for(elem);
            let got = read_value(reader.array_element(0), elem, &mut v, snapshot);
            if got == 0 {
                return 0;
            }
            *items = vec![v];
            got
        }
    }
}

fn read_map(
    reader: FieldReader<'_>,
    key_kind: &FieldKind,
    value_kind: &FieldKind,
    value: &mut Value,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    let Value::Map(entries) = value else {
        warn!("map kind holds non-map value {value:?}");
        return 0;
    };
    if reader.raw_value().is_none() {
        return 0;
    }
    let mut out = Vec::new();
    let mut count = 1;
    for (key_reader, value_reader) in reader.map_entries() {
        let mut k = Value::default_for(key_kind);
        if read_value(key_reader, key_kind, &mut k, snapshot) == 0 {
            continue;
        }
        let mut v = Value::default_for(value_kind);
        count += read_value(value_reader, value_kind, &mut v, snapshot);
        out.push((k, v));
    }
    *entries = out;
    count
}

fn read_any(
    reader: FieldReader<'_>,
    value: &mut Value,
    snapshot: Option<&Arc<DescriptorSet>>,
) -> usize {
    let Value::Any(any) = value else {
        warn!("deferred kind holds non-deferred value {value:?}");
        return 0;
    };
    let Some(subdef) = reader.field().message_subdef() else {
        warn!(
            "field {} is not a message; nothing to defer",
            reader.field().name()
        );
        return 0;
    };
    let msg = match reader.raw_value() {
        Some(WireValue::Message(m)) => m,
        Some(WireValue::Array(items)) => match items.first() {
            Some(WireValue::Message(m)) => m,
            _ => return 0,
        },
        _ => return 0,
    };
    let set = match snapshot {
        Some(arc) => {
            debug_assert!(core::ptr::eq::<DescriptorSet>(&**arc, subdef.set()));
            Arc::clone(arc)
        }
        // no owning snapshot available: give the box its own copy
        None => Arc::new(subdef.set().clone()),
    };
    any.set(Arc::new(MessageHolder::new(set, subdef.id(), msg.clone())));
    1
}
