use std::sync::Arc;

use crate::{AnyValue, FieldKind, StructTy};

/// One owned structured value, tagged with the same kinds as [`FieldKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `bool`.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Single-precision float.
    F32(f32),
    /// Double-precision float.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Identifier.
    Name(String),
    /// Localizable text, carried as its source string.
    Text(String),
    /// Soft reference path.
    SoftPath(String),
    /// Enum value as its underlying integer.
    Enum(i64),
    /// Nested struct instance.
    Struct(StructValue),
    /// Dynamic array.
    Array(Vec<Value>),
    /// Set, kept in insertion order.
    Set(Vec<Value>),
    /// Map, kept in insertion order.
    Map(Vec<(Value, Value)>),
    /// Deferred sub-message payload.
    Any(AnyValue),
}

impl Value {
    /// The default value for a field of the given kind.
    pub fn default_for(kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::I8 => Value::I8(0),
            FieldKind::U8 => Value::U8(0),
            FieldKind::I16 => Value::I16(0),
            FieldKind::U16 => Value::U16(0),
            FieldKind::I32 => Value::I32(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::U64 => Value::U64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Str => Value::Str(String::new()),
            FieldKind::Name => Value::Name(String::new()),
            FieldKind::Text => Value::Text(String::new()),
            FieldKind::SoftPath => Value::SoftPath(String::new()),
            FieldKind::Enum(_) => Value::Enum(0),
            FieldKind::Struct(ty) => Value::Struct(ty.instantiate()),
            FieldKind::Array(_) => Value::Array(Vec::new()),
            FieldKind::Set(_) => Value::Set(Vec::new()),
            FieldKind::Map(_, _) => Value::Map(Vec::new()),
            FieldKind::Any => Value::Any(AnyValue::default()),
        }
    }

    /// Renders a scalar value as text. `None` for container kinds.
    ///
    /// This is the textual export half of the reflection contract; the
    /// codec uses it when a numeric host field must feed a string-typed
    /// wire field.
    pub fn export_text(&self) -> Option<String> {
        match self {
            Value::Bool(v) => Some(if *v { "true".into() } else { "false".into() }),
            Value::I8(v) => Some(v.to_string()),
            Value::U8(v) => Some(v.to_string()),
            Value::I16(v) => Some(v.to_string()),
            Value::U16(v) => Some(v.to_string()),
            Value::I32(v) => Some(v.to_string()),
            Value::U32(v) => Some(v.to_string()),
            Value::I64(v) => Some(v.to_string()),
            Value::U64(v) => Some(v.to_string()),
            Value::F32(v) => Some(v.to_string()),
            Value::F64(v) => Some(v.to_string()),
            Value::Str(s) | Value::Name(s) | Value::Text(s) | Value::SoftPath(s) => {
                Some(s.clone())
            }
            Value::Enum(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Parses text into this value in place, keeping the current variant.
    ///
    /// The textual import half of the reflection contract: the codec uses
    /// it when a string-typed wire field lands in a numeric host field
    /// (a value serialized as a quoted literal). Returns false when the
    /// text does not parse or the variant is a container.
    pub fn import_text(&mut self, text: &str) -> bool {
        match self {
            Value::Bool(v) => {
                let parsed = match text {
                    "true" | "True" | "TRUE" | "1" => Some(true),
                    "false" | "False" | "FALSE" | "0" => Some(false),
                    _ => None,
                };
                match parsed {
                    Some(b) => {
                        *v = b;
                        true
                    }
                    None => false,
                }
            }
            Value::I8(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::U8(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::I16(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::U16(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::I32(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::U32(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::I64(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::U64(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::F32(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::F64(v) => text.parse().map(|p| *v = p).is_ok(),
            Value::Str(s) | Value::Name(s) | Value::Text(s) | Value::SoftPath(s) => {
                *s = text.to_string();
                true
            }
            Value::Enum(v) => text.parse().map(|p| *v = p).is_ok(),
            _ => false,
        }
    }
}

/// One instance of a [`StructTy`]: the type plus one value per field.
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    ty: Arc<StructTy>,
    values: Vec<Value>,
}

impl StructValue {
    /// Creates an instance with all fields defaulted.
    pub fn new(ty: Arc<StructTy>) -> Self {
        let values = ty
            .fields
            .iter()
            .map(|f| Value::default_for(&f.kind))
            .collect();
        Self { ty, values }
    }

    /// The struct type.
    pub fn ty(&self) -> &Arc<StructTy> {
        &self.ty
    }

    /// Field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.field_index(name).map(|i| &self.values[i])
    }

    /// Mutable field value by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.ty.field_index(name).map(|i| &mut self.values[i])
    }

    /// Field value by index.
    pub fn value_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Mutable field value by index.
    pub fn value_at_mut(&mut self, index: usize) -> &mut Value {
        &mut self.values[index]
    }

    /// Replaces a field value by name. Returns false if the field does
    /// not exist; the value's variant is not checked against the field
    /// kind here.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.ty.field_index(name) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }
}
