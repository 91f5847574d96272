//! The mutable in-memory message tree.
//!
//! A [`WireMessage`] owns its whole subtree; cloning one is the deep
//! clone the codec relies on for deferred sub-messages. Field presence
//! is simply key presence in the field map.

use std::collections::BTreeMap;

use crate::WireKind;

/// One field value inside a [`WireMessage`].
#[derive(Clone, Debug, PartialEq)]
pub enum WireValue {
    /// Bool scalar.
    Bool(bool),
    /// Signed 32-bit scalar. Enum values are carried here too.
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
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Nested message.
    Message(WireMessage),
    /// Repeated field backing array.
    Array(Vec<WireValue>),
    /// Map field entries in insertion order.
    Map(Vec<(WireValue, WireValue)>),
}

impl WireValue {
    /// The zero value for a singular field of the given kind.
    pub fn default_for(kind: WireKind) -> WireValue {
        match kind {
            WireKind::Bool => WireValue::Bool(false),
            WireKind::Int32 | WireKind::Enum => WireValue::I32(0),
            WireKind::UInt32 => WireValue::U32(0),
            WireKind::Int64 => WireValue::I64(0),
            WireKind::UInt64 => WireValue::U64(0),
            WireKind::Float => WireValue::F32(0.0),
            WireKind::Double => WireValue::F64(0.0),
            WireKind::String => WireValue::Str(String::new()),
            WireKind::Bytes => WireValue::Bytes(Vec::new()),
            WireKind::Message => WireValue::Message(WireMessage::new()),
        }
    }

    /// True when this variant can legally populate a singular field of
    /// the given kind. Used by tag-checked map insertion.
    pub fn matches_kind(&self, kind: WireKind) -> bool {
        matches!(
            (self, kind),
            (WireValue::Bool(_), WireKind::Bool)
                | (WireValue::I32(_), WireKind::Int32)
                | (WireValue::I32(_), WireKind::Enum)
                | (WireValue::I32(_), WireKind::UInt32)
                | (WireValue::U32(_), WireKind::UInt32)
                | (WireValue::U32(_), WireKind::Int32)
                | (WireValue::I64(_), WireKind::Int64)
                | (WireValue::I64(_), WireKind::UInt64)
                | (WireValue::U64(_), WireKind::UInt64)
                | (WireValue::U64(_), WireKind::Int64)
                | (WireValue::F32(_), WireKind::Float)
                | (WireValue::F64(_), WireKind::Double)
                | (WireValue::Str(_), WireKind::String)
                | (WireValue::Str(_), WireKind::Bytes)
                | (WireValue::Bytes(_), WireKind::Bytes)
                | (WireValue::Bytes(_), WireKind::String)
                | (WireValue::Message(_), WireKind::Message)
        )
    }
}

/// One message instance: a sparse map from field number to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireMessage {
    fields: BTreeMap<u32, WireValue>,
}

impl WireMessage {
    /// An empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Value of a field, if populated.
    pub fn get(&self, number: u32) -> Option<&WireValue> {
        self.fields.get(&number)
    }

    /// Mutable value of a field, if populated.
    pub fn get_mut(&mut self, number: u32) -> Option<&mut WireValue> {
        self.fields.get_mut(&number)
    }

    /// Populates a field, replacing any previous value.
    pub fn set(&mut self, number: u32, value: WireValue) {
        self.fields.insert(number, value);
    }

    /// Mutable value of a field, inserting the given value when absent.
    pub fn get_or_insert(&mut self, number: u32, value: WireValue) -> &mut WireValue {
        self.fields.entry(number).or_insert(value)
    }

    /// Removes a field.
    pub fn clear_field(&mut self, number: u32) -> Option<WireValue> {
        self.fields.remove(&number)
    }

    /// Populated field numbers in ascending order.
    pub fn field_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }
}
