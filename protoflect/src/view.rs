//! Field-addressed readers and writers over the wire tree.
//!
//! A reader or writer pairs one [`FieldDef`] with a location: either a
//! borrowed message (field addressing by number) or a borrowed immediate
//! value (map keys/values and other standalone slots). An optional array
//! slot index narrows the location to one repeated element.

use log::warn;
use protoflect_wire::{FieldDef, WireKind, WireMessage, WireValue};

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for i64 {}
    impl Sealed for u64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Host scalar types the reader/writer can move through a wire field.
///
/// Each implementation carries its compatible-kind predicate: 32-bit
/// signed, unsigned and enum fields interoperate, as do the 64-bit pair.
pub trait WireScalar: sealed::Sealed + Copy + Default + core::fmt::Debug {
    /// True when this type may populate a field of the given kind.
    fn compatible(kind: WireKind) -> bool;
    #[doc(hidden)]
    fn from_wire(value: &WireValue) -> Option<Self>;
    #[doc(hidden)]
    fn to_wire(self, kind: WireKind) -> WireValue;
}

impl WireScalar for bool {
    fn compatible(kind: WireKind) -> bool {
        kind == WireKind::Bool
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
    fn to_wire(self, _kind: WireKind) -> WireValue {
        WireValue::Bool(self)
    }
}

impl WireScalar for i32 {
    fn compatible(kind: WireKind) -> bool {
        matches!(kind, WireKind::Int32 | WireKind::UInt32 | WireKind::Enum)
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::I32(v) => Some(*v),
            WireValue::U32(v) => Some(*v as i32),
            _ => None,
        }
    }
    fn to_wire(self, kind: WireKind) -> WireValue {
        if kind == WireKind::UInt32 {
            WireValue::U32(self as u32)
        } else {
            WireValue::I32(self)
        }
    }
}

impl WireScalar for u32 {
    fn compatible(kind: WireKind) -> bool {
        matches!(kind, WireKind::Int32 | WireKind::UInt32 | WireKind::Enum)
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::U32(v) => Some(*v),
            WireValue::I32(v) => Some(*v as u32),
            _ => None,
        }
    }
    fn to_wire(self, kind: WireKind) -> WireValue {
        if kind == WireKind::UInt32 {
            WireValue::U32(self)
        } else {
            WireValue::I32(self as i32)
        }
    }
}

impl WireScalar for i64 {
    fn compatible(kind: WireKind) -> bool {
        matches!(kind, WireKind::Int64 | WireKind::UInt64)
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::I64(v) => Some(*v),
            WireValue::U64(v) => Some(*v as i64),
            _ => None,
        }
    }
    fn to_wire(self, kind: WireKind) -> WireValue {
        if kind == WireKind::UInt64 {
            WireValue::U64(self as u64)
        } else {
            WireValue::I64(self)
        }
    }
}

impl WireScalar for u64 {
    fn compatible(kind: WireKind) -> bool {
        matches!(kind, WireKind::Int64 | WireKind::UInt64)
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::U64(v) => Some(*v),
            WireValue::I64(v) => Some(*v as u64),
            _ => None,
        }
    }
    fn to_wire(self, kind: WireKind) -> WireValue {
        if kind == WireKind::Int64 {
            WireValue::I64(self as i64)
        } else {
            WireValue::U64(self)
        }
    }
}

impl WireScalar for f32 {
    fn compatible(kind: WireKind) -> bool {
        kind == WireKind::Float
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::F32(v) => Some(*v),
            _ => None,
        }
    }
    fn to_wire(self, _kind: WireKind) -> WireValue {
        WireValue::F32(self)
    }
}

impl WireScalar for f64 {
    fn compatible(kind: WireKind) -> bool {
        kind == WireKind::Double
    }
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::F64(v) => Some(*v),
            _ => None,
        }
    }
    fn to_wire(self, _kind: WireKind) -> WireValue {
        WireValue::F64(self)
    }
}

#[derive(Copy, Clone, Debug)]
enum Slot<'p> {
    Message(&'p WireMessage),
    Value(&'p WireValue),
}

/// Read access to one field location.
#[derive(Copy, Clone, Debug)]
pub struct FieldReader<'p> {
    field: FieldDef<'p>,
    slot: Slot<'p>,
    index: Option<usize>,
}

/// What one read location holds, after slot resolution.
#[derive(Copy, Clone, Debug)]
pub enum ReadValue<'p> {
    /// Nothing populated at this location.
    Absent,
    /// Bool scalar.
    Bool(bool),
    /// Signed 32-bit scalar.
    I32(i32),
    /// Unsigned 32-bit scalar.
    U32(u32),
    /// Signed 64-bit scalar.
    I64(i64),
    /// Unsigned 64-bit scalar.
    U64(u64),
    /// Single-precision float.
    F32(f32),
    /// Double-precision float.
    F64(f64),
    /// UTF-8 text.
    Str(&'p str),
    /// Raw bytes.
    Bytes(&'p [u8]),
    /// A sub-message, whole repeated field, or map; hand the reader back
    /// to the caller to walk into it.
    Container(FieldReader<'p>),
}

impl<'p> FieldReader<'p> {
    /// Reader over a message field, addressed by the field's number.
    pub fn new(field: FieldDef<'p>, msg: &'p WireMessage) -> Self {
        Self {
            field,
            slot: Slot::Message(msg),
            index: None,
        }
    }

    /// Reader over one standalone value (a map key or value).
    pub fn immediate(field: FieldDef<'p>, value: &'p WireValue) -> Self {
        Self {
            field,
            slot: Slot::Value(value),
            index: None,
        }
    }

    /// The field being read.
    pub fn field(&self) -> FieldDef<'p> {
        self.field
    }

    pub(crate) fn raw_value(&self) -> Option<&'p WireValue> {
        let base = match self.slot {
            Slot::Message(msg) => msg.get(self.field.number())?,
            Slot::Value(value) => value,
        };
        match self.index {
            None => Some(base),
            Some(i) => match base {
                WireValue::Array(items) => items.get(i),
                // Slot 0 of a singular value is the value itself.
                _ if i == 0 => Some(base),
                _ => None,
            },
        }
    }

    /// Scalar at this location; the kind's zero value when absent or
    /// mismatched.
    pub fn get_scalar<T: WireScalar>(&self) -> T {
        debug_assert!(
            T::compatible(self.field.kind()),
            "field {} ({:?}) read with incompatible scalar type",
            self.field.name(),
            self.field.kind()
        );
        match self.raw_value() {
            Some(value) => T::from_wire(value).unwrap_or_else(|| {
                warn!(
                    "field {} holds {value:?}; scalar read defaulted",
                    self.field.name()
                );
                T::default()
            }),
            None => T::default(),
        }
    }

    /// Text at this location; empty when absent or non-text.
    pub fn get_str(&self) -> &'p str {
        match self.raw_value() {
            Some(WireValue::Str(s)) => s,
            _ => "",
        }
    }

    /// Bytes at this location. Text fields read as their UTF-8 bytes.
    pub fn get_bytes(&self) -> &'p [u8] {
        match self.raw_value() {
            Some(WireValue::Bytes(b)) => b,
            Some(WireValue::Str(s)) => s.as_bytes(),
            _ => &[],
        }
    }

    /// Element count: array length, 0 when absent, 1 for a populated
    /// singular value.
    pub fn array_len(&self) -> usize {
        match self.raw_value() {
            Some(WireValue::Array(items)) => items.len(),
            Some(_) => 1,
            None => 0,
        }
    }

    /// Reader narrowed to one repeated element.
    pub fn array_element(&self, index: usize) -> FieldReader<'p> {
        FieldReader {
            field: self.field,
            slot: self.slot,
            index: Some(index),
        }
    }

    /// Entry count of a map field; 0 otherwise.
    pub fn map_len(&self) -> usize {
        match self.raw_value() {
            Some(WireValue::Map(entries)) => entries.len(),
            _ => 0,
        }
    }

    /// Key/value reader pairs for a map field, in entry order.
    pub fn map_entries(&self) -> Vec<(FieldReader<'p>, FieldReader<'p>)> {
        let (Some(key_def), Some(value_def)) =
            (self.field.map_key_def(), self.field.map_value_def())
        else {
            return Vec::new();
        };
        match self.raw_value() {
            Some(WireValue::Map(entries)) => entries
                .iter()
                .map(|(k, v)| {
                    (
                        FieldReader::immediate(key_def, k),
                        FieldReader::immediate(value_def, v),
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The sub-message at this location, if one is populated.
    pub fn sub_message(&self) -> Option<&'p WireMessage> {
        match self.raw_value() {
            Some(WireValue::Message(m)) => Some(m),
            _ => None,
        }
    }

    /// Resolves the location into a tagged value for kind dispatch.
    ///
    /// A whole repeated field (no slot index) always comes back as
    /// [`ReadValue::Container`], even when its elements are scalars.
    pub fn dispatch(&self) -> ReadValue<'p> {
        match self.raw_value() {
            None => ReadValue::Absent,
            Some(WireValue::Bool(v)) => ReadValue::Bool(*v),
            Some(WireValue::I32(v)) => ReadValue::I32(*v),
            Some(WireValue::U32(v)) => ReadValue::U32(*v),
            Some(WireValue::I64(v)) => ReadValue::I64(*v),
            Some(WireValue::U64(v)) => ReadValue::U64(*v),
            Some(WireValue::F32(v)) => ReadValue::F32(*v),
            Some(WireValue::F64(v)) => ReadValue::F64(*v),
            Some(WireValue::Str(s)) => ReadValue::Str(s),
            Some(WireValue::Bytes(b)) => ReadValue::Bytes(b),
            Some(WireValue::Message(_) | WireValue::Array(_) | WireValue::Map(_)) => {
                ReadValue::Container(*self)
            }
        }
    }
}

enum SlotMut<'m> {
    Message(&'m mut WireMessage),
    Value(&'m mut WireValue),
}

/// Write access to one field location.
pub struct FieldWriter<'p, 'm> {
    field: FieldDef<'p>,
    slot: SlotMut<'m>,
    index: Option<usize>,
}

impl<'p, 'm> FieldWriter<'p, 'm> {
    /// Writer into a message field, addressed by the field's number.
    pub fn new(field: FieldDef<'p>, msg: &'m mut WireMessage) -> Self {
        Self {
            field,
            slot: SlotMut::Message(msg),
            index: None,
        }
    }

    /// Writer into one standalone value slot (a map key or value).
    pub fn immediate(field: FieldDef<'p>, value: &'m mut WireValue) -> Self {
        Self {
            field,
            slot: SlotMut::Value(value),
            index: None,
        }
    }

    /// The field being written.
    pub fn field(&self) -> FieldDef<'p> {
        self.field
    }

    /// Shorthand for the field's wire kind.
    pub fn kind(&self) -> WireKind {
        self.field.kind()
    }

    pub(crate) fn slot(&self) -> Option<usize> {
        self.index
    }

    fn initial_value(&self) -> WireValue {
        if self.field.is_map() {
            WireValue::Map(Vec::new())
        } else if self.field.is_repeated() {
            WireValue::Array(Vec::new())
        } else {
            WireValue::default_for(self.field.kind())
        }
    }

    /// Resolves the target value, creating the field when absent.
    ///
    /// Panics when the slot index lies beyond the backing array; growing
    /// goes through [`Self::ensure_array_len`].
    fn target(&mut self) -> &mut WireValue {
        let initial = self.initial_value();
        let name = self.field.name();
        let number = self.field.number();
        let base: &mut WireValue = match &mut self.slot {
            SlotMut::Message(msg) => msg.get_or_insert(number, initial),
            SlotMut::Value(value) => value,
        };
        match self.index {
            None => base,
            Some(i) => match base {
                WireValue::Array(items) => {
                    let len = items.len();
                    items
                        .get_mut(i)
                        .unwrap_or_else(|| panic!("slot {i} out of bounds (len {len}) in field {name}"))
                }
                _ => panic!("slot addressing on non-array field {name}"),
            },
        }
    }

    /// Writes a scalar, converted to the field's wire kind.
    pub fn set_scalar<T: WireScalar>(&mut self, value: T) {
        debug_assert!(
            T::compatible(self.field.kind()),
            "field {} ({:?}) written with incompatible scalar type",
            self.field.name(),
            self.field.kind()
        );
        let kind = self.field.kind();
        *self.target() = value.to_wire(kind);
    }

    /// Writes text. A bytes-kind field receives the UTF-8 bytes.
    pub fn set_str(&mut self, text: &str) {
        let value = if self.field.kind() == WireKind::Bytes {
            WireValue::Bytes(text.as_bytes().to_vec())
        } else {
            WireValue::Str(text.to_string())
        };
        *self.target() = value;
    }

    /// Writes raw bytes.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        *self.target() = WireValue::Bytes(bytes.to_vec());
    }

    /// Grows the backing array to at least `len` default elements.
    /// Never shrinks.
    pub fn ensure_array_len(&mut self, len: usize) {
        let default = WireValue::default_for(self.field.kind());
        if let WireValue::Array(items) = self.target() {
            while items.len() < len {
                items.push(default.clone());
            }
        }
    }

    /// Writer narrowed to one repeated element, growing the array to
    /// reach it.
    pub fn array_element_writer(&mut self, index: usize) -> FieldWriter<'p, '_> {
        self.ensure_array_len(index + 1);
        FieldWriter {
            field: self.field,
            slot: match &mut self.slot {
                SlotMut::Message(msg) => SlotMut::Message(&mut **msg),
                SlotMut::Value(value) => SlotMut::Value(&mut **value),
            },
            index: Some(index),
        }
    }

    /// Replaces the location with a nested message.
    pub fn set_message(&mut self, msg: WireMessage) {
        *self.target() = WireValue::Message(msg);
    }

    /// Inserts one map entry, replacing an entry with an equal key.
    ///
    /// The key and value are tag-checked against the entry descriptor;
    /// a mismatch is rejected with a warning, never a panic.
    pub fn map_insert(&mut self, key: WireValue, value: WireValue) -> bool {
        let (Some(key_def), Some(value_def)) =
            (self.field.map_key_def(), self.field.map_value_def())
        else {
            warn!("map insert on non-map field {}", self.field.name());
            return false;
        };
        if !key.matches_kind(key_def.kind()) || !value.matches_kind(value_def.kind()) {
            warn!(
                "map insert rejected for field {}: entry kind mismatch",
                self.field.name()
            );
            return false;
        }
        match self.target() {
            WireValue::Map(entries) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoflect_testhelpers::schema::{FieldProto, FileProto, MessageProto};
    use protoflect_wire::DescriptorSet;

    fn sample_set() -> DescriptorSet {
        let file = FileProto::new("v.proto").package("v").message(
            MessageProto::new("Row")
                .field(FieldProto::string("label", 1))
                .field(FieldProto::int32("nums", 2).repeated())
                .field(FieldProto::message("tags", 3, ".v.Row.TagsEntry").repeated())
                .nested(
                    MessageProto::new("TagsEntry")
                        .map_entry()
                        .field(FieldProto::string("key", 1))
                        .field(FieldProto::int32("value", 2)),
                ),
        );
        let mut set = DescriptorSet::new();
        set.add_file(&file.encode()).unwrap();
        set
    }

    #[test]
    fn writer_then_reader() {
        let set = sample_set();
        let desc = set.find_message("v.Row").unwrap();
        let mut msg = WireMessage::new();

        let label = desc.find_field_by_name("label").unwrap();
        FieldWriter::new(label, &mut msg).set_str("hi");

        let nums = desc.find_field_by_name("nums").unwrap();
        let mut w = FieldWriter::new(nums, &mut msg);
        for (i, v) in [4i32, 5, 6].iter().enumerate() {
            w.array_element_writer(i).set_scalar(*v);
        }

        assert_eq!(FieldReader::new(label, &msg).get_str(), "hi");
        let r = FieldReader::new(nums, &msg);
        assert_eq!(r.array_len(), 3);
        assert_eq!(r.array_element(1).get_scalar::<i32>(), 5);
        assert!(matches!(r.dispatch(), ReadValue::Container(_)));
        assert!(matches!(r.array_element(0).dispatch(), ReadValue::I32(4)));
    }

    #[test]
    fn absent_reads_default() {
        let set = sample_set();
        let desc = set.find_message("v.Row").unwrap();
        let msg = WireMessage::new();
        let nums = desc.find_field_by_name("nums").unwrap();
        let r = FieldReader::new(nums, &msg);
        assert!(matches!(r.dispatch(), ReadValue::Absent));
        assert_eq!(r.array_len(), 0);
        assert_eq!(r.get_scalar::<i32>(), 0);
    }

    #[test]
    fn map_insert_checks_entry_kinds() {
        let set = sample_set();
        let desc = set.find_message("v.Row").unwrap();
        let mut msg = WireMessage::new();
        let tags = desc.find_field_by_name("tags").unwrap();
        let mut w = FieldWriter::new(tags, &mut msg);

        assert!(w.map_insert(WireValue::Str("a".into()), WireValue::I32(1)));
        // wrong key kind
        assert!(!w.map_insert(WireValue::I32(9), WireValue::I32(1)));
        // replacing an existing key keeps one entry
        assert!(w.map_insert(WireValue::Str("a".into()), WireValue::I32(2)));

        let r = FieldReader::new(tags, &msg);
        assert_eq!(r.map_len(), 1);
        let entries = r.map_entries();
        assert_eq!(entries[0].1.get_scalar::<i32>(), 2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slot_write_past_length_panics() {
        let set = sample_set();
        let desc = set.find_message("v.Row").unwrap();
        let mut msg = WireMessage::new();
        let nums = desc.find_field_by_name("nums").unwrap();
        FieldWriter::new(nums, &mut msg).ensure_array_len(1);
        // address slot 5 directly, bypassing the growing helper
        let mut bad = FieldWriter {
            field: nums,
            slot: SlotMut::Message(&mut msg),
            index: Some(5),
        };
        bad.set_scalar(1i32);
    }
}
