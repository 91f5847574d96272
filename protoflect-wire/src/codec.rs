//! Byte-level encode/decode between a [`WireMessage`] tree and the
//! Protocol-Buffers framing, driven entirely by a message descriptor.

use log::debug;

use crate::descriptor::{FieldDef, MessageDef, WireKind};
use crate::message::{WireMessage, WireValue};
use crate::varint::{
    put_len_delimited, put_tag, put_varint, ByteReader, WT_FIXED32, WT_FIXED64, WT_LEN, WT_VARINT,
};
use crate::WireError;

/// Nesting bound shared by encode and decode.
const MAX_DEPTH: usize = 100;

/// Serializes a message tree to bytes.
///
/// Fields are emitted in schema order; repeated scalar kinds are packed,
/// maps become repeated entry sub-messages.
pub fn encode_message(desc: MessageDef<'_>, msg: &WireMessage) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    encode_into(desc, msg, &mut out, 0)?;
    Ok(out)
}

fn encode_into(
    desc: MessageDef<'_>,
    msg: &WireMessage,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::DepthLimitExceeded);
    }
    for field in desc.fields() {
        let Some(value) = msg.get(field.number()) else {
            continue;
        };
        if field.is_map() {
            let WireValue::Map(entries) = value else {
                debug_assert!(false, "map field {} holds non-map value", field.name());
                continue;
            };
            let key_def = field.map_key_def().ok_or_else(|| bad_entry(field))?;
            let value_def = field.map_value_def().ok_or_else(|| bad_entry(field))?;
            for (key, val) in entries {
                let mut entry = Vec::new();
                encode_single(key_def, key, &mut entry, depth + 1)?;
                encode_single(value_def, val, &mut entry, depth + 1)?;
                put_tag(out, field.number(), WT_LEN);
                put_len_delimited(out, &entry);
            }
        } else if field.is_repeated() {
            let WireValue::Array(items) = value else {
                debug_assert!(false, "repeated field {} holds non-array value", field.name());
                continue;
            };
            if wire_type_for(field.kind()) == WT_LEN {
                for item in items {
                    encode_single(field, item, out, depth + 1)?;
                }
            } else if !items.is_empty() {
                // Packed: one length-delimited run of scalar payloads.
                let mut payload = Vec::new();
                for item in items {
                    encode_scalar_payload(field, item, &mut payload);
                }
                put_tag(out, field.number(), WT_LEN);
                put_len_delimited(out, &payload);
            }
        } else {
            encode_single(field, value, out, depth + 1)?;
        }
    }
    Ok(())
}

/// Emits tag + payload for one element of `field`.
fn encode_single(
    field: FieldDef<'_>,
    value: &WireValue,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), WireError> {
    match field.kind() {
        WireKind::Message => {
            let WireValue::Message(sub) = value else {
                debug_assert!(false, "message field {} holds non-message", field.name());
                return Ok(());
            };
            let subdef = field.message_subdef().ok_or_else(|| bad_entry(field))?;
            let mut payload = Vec::new();
            encode_into(subdef, sub, &mut payload, depth)?;
            put_tag(out, field.number(), WT_LEN);
            put_len_delimited(out, &payload);
        }
        WireKind::String => {
            let text: &str = match value {
                WireValue::Str(s) => s,
                _ => {
                    debug_assert!(false, "string field {} holds non-string", field.name());
                    return Ok(());
                }
            };
            put_tag(out, field.number(), WT_LEN);
            put_len_delimited(out, text.as_bytes());
        }
        WireKind::Bytes => {
            let bytes: &[u8] = match value {
                WireValue::Bytes(b) => b,
                WireValue::Str(s) => s.as_bytes(),
                _ => {
                    debug_assert!(false, "bytes field {} holds non-bytes", field.name());
                    return Ok(());
                }
            };
            put_tag(out, field.number(), WT_LEN);
            put_len_delimited(out, bytes);
        }
        _ => {
            put_tag(out, field.number(), wire_type_for(field.kind()));
            encode_scalar_payload(field, value, out);
        }
    }
    Ok(())
}

/// Payload-only scalar emission. A variant mismatch is a writer bug;
/// release builds emit the kind's zero value instead of corrupting the
/// stream.
fn encode_scalar_payload(field: FieldDef<'_>, value: &WireValue, out: &mut Vec<u8>) {
    match (field.kind(), value) {
        (WireKind::Bool, WireValue::Bool(v)) => put_varint(out, u64::from(*v)),
        (WireKind::Int32 | WireKind::Enum, WireValue::I32(v)) => {
            put_varint(out, *v as i64 as u64)
        }
        (WireKind::UInt32, WireValue::U32(v)) => put_varint(out, u64::from(*v)),
        (WireKind::Int64, WireValue::I64(v)) => put_varint(out, *v as u64),
        (WireKind::UInt64, WireValue::U64(v)) => put_varint(out, *v),
        (WireKind::Float, WireValue::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (WireKind::Double, WireValue::F64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (kind, other) => {
            debug_assert!(
                false,
                "field {} ({kind:?}) holds mismatched value {other:?}",
                field.name()
            );
            encode_scalar_payload(field, &WireValue::default_for(field.kind()), out);
        }
    }
}

/// Parses bytes into a message tree.
///
/// Unknown field numbers are skipped by wire type; repeated scalar
/// fields accept both packed and expanded encodings; a later singular
/// occurrence overwrites an earlier one; map entries merge by key.
pub fn decode_message(desc: MessageDef<'_>, bytes: &[u8]) -> Result<WireMessage, WireError> {
    decode_into(desc, bytes, 0)
}

fn decode_into(desc: MessageDef<'_>, bytes: &[u8], depth: usize) -> Result<WireMessage, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::DepthLimitExceeded);
    }
    let mut msg = WireMessage::new();
    let mut reader = ByteReader::new(bytes);
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        let Some(field) = desc.find_field_by_number(number) else {
            debug!(
                "ignoring unknown field {number} while decoding {}",
                desc.full_name()
            );
            reader.skip(wire_type)?;
            continue;
        };
        if field.is_map() {
            expect_wire_type(field, wire_type, WT_LEN)?;
            let entry_bytes = reader.read_len_delimited()?;
            let entry_desc = field.map_entry_subdef().ok_or_else(|| bad_entry(field))?;
            let key_def = field.map_key_def().ok_or_else(|| bad_entry(field))?;
            let value_def = field.map_value_def().ok_or_else(|| bad_entry(field))?;
            let entry = decode_into(entry_desc, entry_bytes, depth + 1)?;
            let key = entry
                .get(1)
                .cloned()
                .unwrap_or_else(|| key_def.default_value());
            let val = entry
                .get(2)
                .cloned()
                .unwrap_or_else(|| value_def.default_value());
            let slot = msg.get_or_insert(number, WireValue::Map(Vec::new()));
            if let WireValue::Map(entries) = slot {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(existing) => existing.1 = val,
                    None => entries.push((key, val)),
                }
            }
        } else if field.is_repeated() {
            let element_wt = wire_type_for(field.kind());
            if wire_type == WT_LEN && element_wt != WT_LEN {
                // Packed run.
                let payload = reader.read_len_delimited()?;
                let mut packed = ByteReader::new(payload);
                let slot = msg.get_or_insert(number, WireValue::Array(Vec::new()));
                if let WireValue::Array(items) = slot {
                    while !packed.is_empty() {
                        items.push(decode_scalar(field, &mut packed)?);
                    }
                }
            } else {
                expect_wire_type(field, wire_type, element_wt)?;
                let item = decode_element(field, &mut reader, depth)?;
                let slot = msg.get_or_insert(number, WireValue::Array(Vec::new()));
                if let WireValue::Array(items) = slot {
                    items.push(item);
                }
            }
        } else {
            expect_wire_type(field, wire_type, wire_type_for(field.kind()))?;
            let value = decode_element(field, &mut reader, depth)?;
            msg.set(number, value);
        }
    }
    Ok(msg)
}

fn decode_element(
    field: FieldDef<'_>,
    reader: &mut ByteReader<'_>,
    depth: usize,
) -> Result<WireValue, WireError> {
    match field.kind() {
        WireKind::Message => {
            let payload = reader.read_len_delimited()?;
            let subdef = field.message_subdef().ok_or_else(|| bad_entry(field))?;
            Ok(WireValue::Message(decode_into(subdef, payload, depth + 1)?))
        }
        WireKind::String => {
            let payload = reader.read_len_delimited()?;
            core::str::from_utf8(payload)
                .map(|s| WireValue::Str(s.to_string()))
                .map_err(|_| WireError::InvalidUtf8)
        }
        WireKind::Bytes => Ok(WireValue::Bytes(reader.read_len_delimited()?.to_vec())),
        _ => decode_scalar(field, reader),
    }
}

fn decode_scalar(field: FieldDef<'_>, reader: &mut ByteReader<'_>) -> Result<WireValue, WireError> {
    Ok(match field.kind() {
        WireKind::Bool => WireValue::Bool(reader.read_varint()? != 0),
        WireKind::Int32 | WireKind::Enum => WireValue::I32(reader.read_varint()? as i32),
        WireKind::UInt32 => WireValue::U32(reader.read_varint()? as u32),
        WireKind::Int64 => WireValue::I64(reader.read_varint()? as i64),
        WireKind::UInt64 => WireValue::U64(reader.read_varint()?),
        WireKind::Float => WireValue::F32(f32::from_le_bytes(reader.read_fixed32()?)),
        WireKind::Double => WireValue::F64(f64::from_le_bytes(reader.read_fixed64()?)),
        WireKind::String | WireKind::Bytes | WireKind::Message => {
            unreachable!("length-delimited kinds handled by decode_element")
        }
    })
}

fn expect_wire_type(field: FieldDef<'_>, found: u8, expected: u8) -> Result<(), WireError> {
    if found == expected {
        Ok(())
    } else {
        Err(WireError::WireTypeMismatch {
            field: field.number(),
            found,
        })
    }
}

fn wire_type_for(kind: WireKind) -> u8 {
    match kind {
        WireKind::Bool
        | WireKind::Int32
        | WireKind::UInt32
        | WireKind::Int64
        | WireKind::UInt64
        | WireKind::Enum => WT_VARINT,
        WireKind::Float => WT_FIXED32,
        WireKind::Double => WT_FIXED64,
        WireKind::String | WireKind::Bytes | WireKind::Message => WT_LEN,
    }
}

fn bad_entry(field: FieldDef<'_>) -> WireError {
    WireError::BadDescriptor(format!("field {} is missing its sub-descriptor", field.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DescriptorSet;
    use protoflect_testhelpers::schema::{FieldProto, FileProto, MessageProto};

    fn message_set() -> DescriptorSet {
        let file = FileProto::new("t.proto").package("t").message(
            MessageProto::new("Sample")
                .field(FieldProto::string("name", 1))
                .field(FieldProto::int32("values", 2).repeated()),
        );
        let mut set = DescriptorSet::new();
        set.add_file(&file.encode()).unwrap();
        set
    }

    #[test]
    fn concrete_bytes_for_reference_message() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        let mut msg = WireMessage::new();
        msg.set(1, WireValue::Str("a".into()));
        msg.set(
            2,
            WireValue::Array(vec![
                WireValue::I32(1),
                WireValue::I32(2),
                WireValue::I32(3),
            ]),
        );

        let bytes = encode_message(desc, &msg).unwrap();
        // field 1: tag 0x0a, len 1, 'a'; field 2 packed: tag 0x12, len 3, 1 2 3
        assert_eq!(bytes, vec![0x0a, 0x01, b'a', 0x12, 0x03, 0x01, 0x02, 0x03]);

        let back = decode_message(desc, &bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn negative_int32_roundtrips() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        let mut msg = WireMessage::new();
        msg.set(2, WireValue::Array(vec![WireValue::I32(-1)]));
        let bytes = encode_message(desc, &msg).unwrap();
        let back = decode_message(desc, &bytes).unwrap();
        assert_eq!(back.get(2), Some(&WireValue::Array(vec![WireValue::I32(-1)])));
    }

    #[test]
    fn expanded_repeated_encoding_is_accepted() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        // field 2 as three separate varint occurrences
        let bytes = vec![0x10, 0x05, 0x10, 0x06, 0x10, 0x07];
        let msg = decode_message(desc, &bytes).unwrap();
        assert_eq!(
            msg.get(2),
            Some(&WireValue::Array(vec![
                WireValue::I32(5),
                WireValue::I32(6),
                WireValue::I32(7),
            ]))
        );
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        // field 9 (varint) then field 1
        let bytes = vec![0x48, 0x2a, 0x0a, 0x01, b'x'];
        let msg = decode_message(desc, &bytes).unwrap();
        assert_eq!(msg.get(1), Some(&WireValue::Str("x".into())));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn truncated_input_reports_eof() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        let bytes = vec![0x0a, 0x05, b'a'];
        assert_eq!(decode_message(desc, &bytes), Err(WireError::UnexpectedEof));
    }

    #[test]
    fn later_singular_occurrence_wins() {
        let set = message_set();
        let desc = set.find_message("t.Sample").unwrap();
        let bytes = vec![0x0a, 0x01, b'a', 0x0a, 0x01, b'b'];
        let msg = decode_message(desc, &bytes).unwrap();
        assert_eq!(msg.get(1), Some(&WireValue::Str("b".into())));
    }

    #[test]
    fn map_entries_roundtrip_and_merge() {
        let file = FileProto::new("m.proto").package("m").message(
            MessageProto::new("Holder")
                .field(FieldProto::message("tags", 1, ".m.Holder.TagsEntry").repeated())
                .nested(
                    MessageProto::new("TagsEntry")
                        .map_entry()
                        .field(FieldProto::string("key", 1))
                        .field(FieldProto::int32("value", 2)),
                ),
        );
        let mut set = DescriptorSet::new();
        set.add_file(&file.encode()).unwrap();
        let desc = set.find_message("m.Holder").unwrap();

        let mut msg = WireMessage::new();
        msg.set(
            1,
            WireValue::Map(vec![
                (WireValue::Str("a".into()), WireValue::I32(1)),
                (WireValue::Str("b".into()), WireValue::I32(2)),
            ]),
        );
        let bytes = encode_message(desc, &msg).unwrap();
        let back = decode_message(desc, &bytes).unwrap();
        assert_eq!(back, msg);

        // Same key twice: the later entry wins.
        let mut doubled = bytes.clone();
        doubled.extend_from_slice(&bytes);
        let merged = decode_message(desc, &doubled).unwrap();
        match merged.get(1) {
            Some(WireValue::Map(entries)) => assert_eq!(entries.len(), 2),
            other => panic!("expected map, got {other:?}"),
        }
    }
}
