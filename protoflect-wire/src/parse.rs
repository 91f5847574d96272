//! Parsing of serialized `FileDescriptorProto` / `FileDescriptorSet`
//! bytes into a [`DescriptorSet`].
//!
//! Only the descriptor fields the codec needs are read; everything else
//! is skipped by wire type. Registration is all-or-nothing per file: the
//! new descriptors are built and linked against a candidate copy of the
//! set, which replaces the live one only on success.

use std::collections::HashMap;

use log::warn;

use crate::descriptor::{
    Cardinality, DescriptorSet, EnumDescriptor, EnumId, FieldDescriptor, MessageDescriptor,
    MessageId, WireKind,
};
use crate::varint::{ByteReader, WT_LEN, WT_VARINT};
use crate::WireError;

// FieldDescriptorProto.label
const LABEL_REPEATED: u64 = 3;

struct RawField {
    name: String,
    number: u32,
    label: u64,
    proto_type: u64,
    type_name: Option<String>,
    default_text: Option<String>,
}

struct RawMessage {
    name: String,
    fields: Vec<RawField>,
    nested: Vec<RawMessage>,
    enums: Vec<RawEnum>,
    map_entry: bool,
}

struct RawEnum {
    name: String,
    values: Vec<(String, i32)>,
}

struct RawFile {
    package: Option<String>,
    messages: Vec<RawMessage>,
    enums: Vec<RawEnum>,
}

/// Splits a serialized `FileDescriptorSet` into its per-file slices.
///
/// Each returned slice is one `FileDescriptorProto`, ready for
/// [`DescriptorSet::add_file`]. Parsing of the individual files is left
/// to the caller so a batch can continue past bad entries.
pub fn split_file_set(bytes: &[u8]) -> Result<Vec<&[u8]>, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut files = Vec::new();
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        if number == 1 && wire_type == WT_LEN {
            files.push(reader.read_len_delimited()?);
        } else {
            reader.skip(wire_type)?;
        }
    }
    Ok(files)
}

impl DescriptorSet {
    /// Parses one serialized `FileDescriptorProto` and registers all of
    /// its message and enum types, nested ones included.
    ///
    /// On any parse or link failure the set is left exactly as it was.
    pub fn add_file(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let raw = parse_file(bytes)?;
        let mut candidate = self.clone();
        let first_new = candidate.messages.len();

        let prefix = raw.package.clone().unwrap_or_default();
        for message in &raw.messages {
            register_message(&mut candidate, &prefix, message, true)?;
        }
        for enumeration in &raw.enums {
            register_enum(&mut candidate, &prefix, enumeration);
        }

        link_messages(&mut candidate, first_new, &prefix)?;
        *self = candidate;
        Ok(())
    }
}

fn register_message(
    set: &mut DescriptorSet,
    prefix: &str,
    raw: &RawMessage,
    top_level: bool,
) -> Result<MessageId, WireError> {
    let full_name = if prefix.is_empty() {
        raw.name.clone()
    } else {
        format!("{prefix}.{}", raw.name)
    };

    let mut fields = Vec::new();
    let mut by_field_name = HashMap::new();
    let mut by_field_number = HashMap::new();
    for raw_field in &raw.fields {
        let Some(kind) = wire_kind_for(raw_field.proto_type) else {
            warn!(
                "dropping field {}.{}: unsupported descriptor type {}",
                full_name, raw_field.name, raw_field.proto_type
            );
            continue;
        };
        if matches!(kind, WireKind::Message | WireKind::Enum) && raw_field.type_name.is_none() {
            return Err(WireError::BadDescriptor(format!(
                "field {}.{} has no type name",
                full_name, raw_field.name
            )));
        }
        let index = fields.len();
        if by_field_name
            .insert(raw_field.name.clone(), index)
            .is_some()
            || by_field_number.insert(raw_field.number, index).is_some()
        {
            return Err(WireError::BadDescriptor(format!(
                "duplicate field {}.{} ({})",
                full_name, raw_field.name, raw_field.number
            )));
        }
        fields.push(FieldDescriptor {
            name: raw_field.name.clone(),
            number: raw_field.number,
            kind,
            cardinality: if raw_field.label == LABEL_REPEATED {
                Cardinality::Repeated
            } else {
                Cardinality::Singular
            },
            type_name: raw_field.type_name.clone(),
            message: None,
            enumeration: None,
            default_text: raw_field.default_text.clone(),
        });
    }

    let id = MessageId(set.messages.len() as u32);
    set.messages.push(MessageDescriptor {
        full_name: full_name.clone(),
        short_name: raw.name.clone(),
        fields,
        by_field_name,
        by_field_number,
        map_entry: raw.map_entry,
    });
    set.by_name.insert(full_name.clone(), id);
    if top_level {
        // Bare names let host struct types match without a package prefix.
        set.by_name.insert(raw.name.clone(), id);
    }

    for nested in &raw.nested {
        register_message(set, &full_name, nested, false)?;
    }
    for enumeration in &raw.enums {
        register_enum(set, &full_name, enumeration);
    }
    Ok(id)
}

fn register_enum(set: &mut DescriptorSet, prefix: &str, raw: &RawEnum) {
    let full_name = if prefix.is_empty() {
        raw.name.clone()
    } else {
        format!("{prefix}.{}", raw.name)
    };
    let id = EnumId(set.enums.len() as u32);
    set.enums.push(EnumDescriptor {
        full_name: full_name.clone(),
        values: raw.values.clone(),
    });
    set.enums_by_name.insert(full_name, id);
}

/// Resolves `type_name` references of all messages registered at or
/// after `first_new`.
fn link_messages(
    set: &mut DescriptorSet,
    first_new: usize,
    package: &str,
) -> Result<(), WireError> {
    for msg_index in first_new..set.messages.len() {
        for field_index in 0..set.messages[msg_index].fields.len() {
            let (kind, type_name) = {
                let field = &set.messages[msg_index].fields[field_index];
                (field.kind, field.type_name.clone())
            };
            match kind {
                WireKind::Message => {
                    let name = type_name.expect("checked at registration");
                    let target = resolve_name(&set.by_name, &name, package)
                        .ok_or_else(|| WireError::UnknownTypeName(name.clone()))?;
                    set.messages[msg_index].fields[field_index].message = Some(target);
                }
                WireKind::Enum => {
                    let name = type_name.expect("checked at registration");
                    let target = resolve_name(&set.enums_by_name, &name, package)
                        .ok_or_else(|| WireError::UnknownTypeName(name.clone()))?;
                    set.messages[msg_index].fields[field_index].enumeration = Some(target);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Type references are usually absolute (`.pkg.Msg`); relative ones are
/// tried against the file's package before giving up.
fn resolve_name<T: Copy>(index: &HashMap<String, T>, name: &str, package: &str) -> Option<T> {
    let stripped = name.strip_prefix('.').unwrap_or(name);
    if let Some(id) = index.get(stripped) {
        return Some(*id);
    }
    if !package.is_empty() {
        if let Some(id) = index.get(&format!("{package}.{stripped}")) {
            return Some(*id);
        }
    }
    None
}

fn wire_kind_for(proto_type: u64) -> Option<WireKind> {
    // FieldDescriptorProto.Type numbers. fixed/sfixed/sint/group fall
    // outside the supported kind set and are dropped at load time.
    match proto_type {
        1 => Some(WireKind::Double),
        2 => Some(WireKind::Float),
        3 => Some(WireKind::Int64),
        4 => Some(WireKind::UInt64),
        5 => Some(WireKind::Int32),
        8 => Some(WireKind::Bool),
        9 => Some(WireKind::String),
        11 => Some(WireKind::Message),
        12 => Some(WireKind::Bytes),
        13 => Some(WireKind::UInt32),
        14 => Some(WireKind::Enum),
        _ => None,
    }
}

fn parse_file(bytes: &[u8]) -> Result<RawFile, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut file = RawFile {
        package: None,
        messages: Vec::new(),
        enums: Vec::new(),
    };
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        match (number, wire_type) {
            (2, WT_LEN) => file.package = Some(read_string(&mut reader)?),
            (4, WT_LEN) => file
                .messages
                .push(parse_message(reader.read_len_delimited()?)?),
            (5, WT_LEN) => file.enums.push(parse_enum(reader.read_len_delimited()?)?),
            _ => reader.skip(wire_type)?,
        }
    }
    Ok(file)
}

fn parse_message(bytes: &[u8]) -> Result<RawMessage, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut message = RawMessage {
        name: String::new(),
        fields: Vec::new(),
        nested: Vec::new(),
        enums: Vec::new(),
        map_entry: false,
    };
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        match (number, wire_type) {
            (1, WT_LEN) => message.name = read_string(&mut reader)?,
            (2, WT_LEN) => message
                .fields
                .push(parse_field(reader.read_len_delimited()?)?),
            (3, WT_LEN) => message
                .nested
                .push(parse_message(reader.read_len_delimited()?)?),
            (4, WT_LEN) => message
                .enums
                .push(parse_enum(reader.read_len_delimited()?)?),
            (7, WT_LEN) => message.map_entry = parse_map_entry_option(reader.read_len_delimited()?)?,
            _ => reader.skip(wire_type)?,
        }
    }
    if message.name.is_empty() {
        return Err(WireError::BadDescriptor("message without a name".into()));
    }
    Ok(message)
}

fn parse_field(bytes: &[u8]) -> Result<RawField, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut field = RawField {
        name: String::new(),
        number: 0,
        label: 0,
        proto_type: 0,
        type_name: None,
        default_text: None,
    };
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        match (number, wire_type) {
            (1, WT_LEN) => field.name = read_string(&mut reader)?,
            (3, WT_VARINT) => field.number = reader.read_varint()? as u32,
            (4, WT_VARINT) => field.label = reader.read_varint()?,
            (5, WT_VARINT) => field.proto_type = reader.read_varint()?,
            (6, WT_LEN) => field.type_name = Some(read_string(&mut reader)?),
            (7, WT_LEN) => field.default_text = Some(read_string(&mut reader)?),
            _ => reader.skip(wire_type)?,
        }
    }
    if field.name.is_empty() || field.number == 0 {
        return Err(WireError::BadDescriptor(
            "field without a name or number".into(),
        ));
    }
    Ok(field)
}

fn parse_enum(bytes: &[u8]) -> Result<RawEnum, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut enumeration = RawEnum {
        name: String::new(),
        values: Vec::new(),
    };
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        match (number, wire_type) {
            (1, WT_LEN) => enumeration.name = read_string(&mut reader)?,
            (2, WT_LEN) => {
                enumeration
                    .values
                    .push(parse_enum_value(reader.read_len_delimited()?)?);
            }
            _ => reader.skip(wire_type)?,
        }
    }
    if enumeration.name.is_empty() {
        return Err(WireError::BadDescriptor("enum without a name".into()));
    }
    Ok(enumeration)
}

fn parse_enum_value(bytes: &[u8]) -> Result<(String, i32), WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut name = String::new();
    let mut value = 0i32;
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        match (number, wire_type) {
            (1, WT_LEN) => name = read_string(&mut reader)?,
            (2, WT_VARINT) => value = reader.read_varint()? as i32,
            _ => reader.skip(wire_type)?,
        }
    }
    Ok((name, value))
}

/// MessageOptions: only `map_entry` (field 7) matters here.
fn parse_map_entry_option(bytes: &[u8]) -> Result<bool, WireError> {
    let mut reader = ByteReader::new(bytes);
    let mut map_entry = false;
    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        if number == 7 && wire_type == WT_VARINT {
            map_entry = reader.read_varint()? != 0;
        } else {
            reader.skip(wire_type)?;
        }
    }
    Ok(map_entry)
}

fn read_string(reader: &mut ByteReader<'_>) -> Result<String, WireError> {
    let bytes = reader.read_len_delimited()?;
    core::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| WireError::InvalidUtf8)
}
