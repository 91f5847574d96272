//! Parsed schema descriptors and the cheap handle types the codec walks.
//!
//! All descriptors of one pool live in flat vectors inside a
//! [`DescriptorSet`]; cross references are typed indices, so recursive
//! message types need no reference cycles and dropping the set frees
//! everything at once. [`MessageDef`], [`FieldDef`] and [`EnumDef`] are
//! `Copy` views pairing the set with an index.

use std::collections::HashMap;

use crate::message::WireValue;

/// Scalar/category tag of one wire field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireKind {
    /// Varint-encoded bool.
    Bool,
    /// Varint-encoded signed 32-bit.
    Int32,
    /// Varint-encoded unsigned 32-bit.
    UInt32,
    /// Varint-encoded signed 64-bit.
    Int64,
    /// Varint-encoded unsigned 64-bit.
    UInt64,
    /// 32-bit fixed float.
    Float,
    /// 64-bit fixed double.
    Double,
    /// Varint-encoded enum, carried as int32.
    Enum,
    /// Length-delimited UTF-8 text.
    String,
    /// Length-delimited raw bytes.
    Bytes,
    /// Length-delimited nested message.
    Message,
}

/// Whether a field holds one value or a sequence.
///
/// Maps are not a separate cardinality on the wire: a map field is a
/// repeated field whose sub-message is a synthetic `map_entry` pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value.
    Singular,
    /// Zero or more values.
    Repeated,
}

/// Index of a message descriptor within its [`DescriptorSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub(crate) u32);

/// Index of an enum descriptor within its [`DescriptorSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumId(pub(crate) u32);

#[derive(Clone, Debug)]
pub(crate) struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) number: u32,
    pub(crate) kind: WireKind,
    pub(crate) cardinality: Cardinality,
    /// Raw type reference from the descriptor, kept for linking.
    pub(crate) type_name: Option<String>,
    /// Set iff `kind == Message`.
    pub(crate) message: Option<MessageId>,
    /// Set iff `kind == Enum`.
    pub(crate) enumeration: Option<EnumId>,
    /// Raw `default_value` text from the descriptor, if present.
    pub(crate) default_text: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct MessageDescriptor {
    pub(crate) full_name: String,
    pub(crate) short_name: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) by_field_name: HashMap<String, usize>,
    pub(crate) by_field_number: HashMap<u32, usize>,
    pub(crate) map_entry: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct EnumDescriptor {
    pub(crate) full_name: String,
    pub(crate) values: Vec<(String, i32)>,
}

/// One pool's worth of parsed schema descriptors.
#[derive(Clone, Debug, Default)]
pub struct DescriptorSet {
    pub(crate) messages: Vec<MessageDescriptor>,
    pub(crate) enums: Vec<EnumDescriptor>,
    /// Full names for every message, plus bare short names for top-level
    /// messages so host type names can match without a package prefix.
    pub(crate) by_name: HashMap<String, MessageId>,
    pub(crate) enums_by_name: HashMap<String, EnumId>,
}

impl DescriptorSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered message descriptors.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Looks up a message by registered name (full, or top-level short).
    pub fn find_message(&self, name: &str) -> Option<MessageDef<'_>> {
        self.by_name.get(name).map(|id| self.message(*id))
    }

    /// Looks up an enum by full name.
    pub fn find_enum(&self, name: &str) -> Option<EnumDef<'_>> {
        self.enums_by_name.get(name).map(|id| EnumDef {
            set: self,
            id: *id,
        })
    }

    /// Handle for a known message id.
    pub fn message(&self, id: MessageId) -> MessageDef<'_> {
        debug_assert!((id.0 as usize) < self.messages.len());
        MessageDef { set: self, id }
    }

    pub(crate) fn message_desc(&self, id: MessageId) -> &MessageDescriptor {
        &self.messages[id.0 as usize]
    }
}

/// `Copy` view of one message descriptor.
#[derive(Copy, Clone)]
pub struct MessageDef<'p> {
    set: &'p DescriptorSet,
    id: MessageId,
}

impl<'p> MessageDef<'p> {
    fn desc(&self) -> &'p MessageDescriptor {
        self.set.message_desc(self.id)
    }

    /// The owning descriptor set.
    pub fn set(&self) -> &'p DescriptorSet {
        self.set
    }

    /// This message's id within its set.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Fully qualified dotted name.
    pub fn full_name(&self) -> &'p str {
        &self.desc().full_name
    }

    /// Last segment of the dotted name.
    pub fn name(&self) -> &'p str {
        &self.desc().short_name
    }

    /// True for the synthetic key/value pair type backing a map field.
    pub fn is_map_entry(&self) -> bool {
        self.desc().map_entry
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.desc().fields.len()
    }

    /// Field by positional index (schema order).
    pub fn field(&self, index: usize) -> FieldDef<'p> {
        debug_assert!(index < self.field_count());
        FieldDef {
            set: self.set,
            msg: self.id,
            index,
        }
    }

    /// Fields in schema order.
    pub fn fields(&self) -> impl Iterator<Item = FieldDef<'p>> + use<'p> {
        let set = self.set;
        let id = self.id;
        (0..self.field_count()).map(move |index| FieldDef {
            set,
            msg: id,
            index,
        })
    }

    /// Field by name (exact).
    pub fn find_field_by_name(&self, name: &str) -> Option<FieldDef<'p>> {
        self.desc().by_field_name.get(name).map(|i| self.field(*i))
    }

    /// Field by schema field number.
    pub fn find_field_by_number(&self, number: u32) -> Option<FieldDef<'p>> {
        self.desc()
            .by_field_number
            .get(&number)
            .map(|i| self.field(*i))
    }
}

impl core::fmt::Debug for MessageDef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageDef")
            .field("full_name", &self.full_name())
            .field("fields", &self.field_count())
            .finish()
    }
}

/// `Copy` view of one field descriptor.
#[derive(Copy, Clone)]
pub struct FieldDef<'p> {
    set: &'p DescriptorSet,
    msg: MessageId,
    index: usize,
}

impl<'p> FieldDef<'p> {
    fn desc(&self) -> &'p FieldDescriptor {
        &self.set.message_desc(self.msg).fields[self.index]
    }

    /// Field name as declared in the schema.
    pub fn name(&self) -> &'p str {
        &self.desc().name
    }

    /// Schema field number.
    pub fn number(&self) -> u32 {
        self.desc().number
    }

    /// Scalar/category tag.
    pub fn kind(&self) -> WireKind {
        self.desc().kind
    }

    /// The message this field belongs to.
    pub fn containing(&self) -> MessageDef<'p> {
        self.set.message(self.msg)
    }

    /// True for repeated fields, including maps.
    pub fn is_repeated(&self) -> bool {
        self.desc().cardinality == Cardinality::Repeated
    }

    /// True when this field is a nested message (maps included).
    pub fn is_message(&self) -> bool {
        self.desc().kind == WireKind::Message
    }

    /// True when this field is a map: repeated with a map-entry sub-message.
    pub fn is_map(&self) -> bool {
        self.is_repeated()
            && self
                .message_subdef()
                .is_some_and(|m| m.is_map_entry())
    }

    /// Sub-message descriptor, present iff `kind() == Message`.
    pub fn message_subdef(&self) -> Option<MessageDef<'p>> {
        self.desc().message.map(|id| self.set.message(id))
    }

    /// Sub-enum descriptor, present iff `kind() == Enum`.
    pub fn enum_subdef(&self) -> Option<EnumDef<'p>> {
        self.desc().enumeration.map(|id| EnumDef { set: self.set, id })
    }

    /// The synthetic entry descriptor of a map field.
    pub fn map_entry_subdef(&self) -> Option<MessageDef<'p>> {
        if self.is_map() { self.message_subdef() } else { None }
    }

    /// Key field (number 1) of a map field's entry descriptor.
    pub fn map_key_def(&self) -> Option<FieldDef<'p>> {
        self.map_entry_subdef()?.find_field_by_number(1)
    }

    /// Value field (number 2) of a map field's entry descriptor.
    pub fn map_value_def(&self) -> Option<FieldDef<'p>> {
        self.map_entry_subdef()?.find_field_by_number(2)
    }

    /// Default value for an absent singular field.
    ///
    /// Parses the descriptor's `default_value` text when present, else
    /// the kind's zero value.
    pub fn default_value(&self) -> WireValue {
        let kind = self.kind();
        if let Some(text) = &self.desc().default_text {
            if let Some(v) = parse_default(kind, text) {
                return v;
            }
        }
        WireValue::default_for(kind)
    }
}

impl core::fmt::Debug for FieldDef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name())
            .field("number", &self.number())
            .field("kind", &self.kind())
            .finish()
    }
}

/// `Copy` view of one enum descriptor.
#[derive(Copy, Clone)]
pub struct EnumDef<'p> {
    set: &'p DescriptorSet,
    id: EnumId,
}

impl<'p> EnumDef<'p> {
    fn desc(&self) -> &'p EnumDescriptor {
        &self.set.enums[self.id.0 as usize]
    }

    /// Fully qualified dotted name.
    pub fn full_name(&self) -> &'p str {
        &self.desc().full_name
    }

    /// `(symbol, number)` entries in declaration order.
    pub fn values(&self) -> &'p [(String, i32)] {
        &self.desc().values
    }

    /// Number of the entry with this symbol.
    pub fn number_by_name(&self, name: &str) -> Option<i32> {
        self.desc()
            .values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl core::fmt::Debug for EnumDef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnumDef")
            .field("full_name", &self.full_name())
            .finish()
    }
}

fn parse_default(kind: WireKind, text: &str) -> Option<WireValue> {
    match kind {
        WireKind::Bool => match text {
            "true" => Some(WireValue::Bool(true)),
            "false" => Some(WireValue::Bool(false)),
            _ => None,
        },
        WireKind::Int32 => text.parse().ok().map(WireValue::I32),
        WireKind::UInt32 => text.parse().ok().map(WireValue::U32),
        WireKind::Int64 => text.parse().ok().map(WireValue::I64),
        WireKind::UInt64 => text.parse().ok().map(WireValue::U64),
        WireKind::Float => text.parse().ok().map(WireValue::F32),
        WireKind::Double => text.parse().ok().map(WireValue::F64),
        WireKind::Enum => text.parse().ok().map(WireValue::I32),
        WireKind::String => Some(WireValue::Str(text.to_string())),
        WireKind::Bytes => Some(WireValue::Bytes(text.as_bytes().to_vec())),
        WireKind::Message => None,
    }
}
