use std::sync::Arc;

/// The kind of one structured-value field.
///
/// This is a closed set: every field a [`StructTy`] can describe carries
/// exactly one of these tags, and the codec dispatches over it with an
/// exhaustive `match`.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// `bool`.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer (also the element type of byte blobs).
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// Single-precision float.
    F32,
    /// Double-precision float.
    F64,
    /// UTF-8 string.
    Str,
    /// An interned identifier. Carried as text on the wire.
    Name,
    /// Localizable display text. Carried as its source string on the wire.
    Text,
    /// A soft reference to another object, stored as a path string.
    SoftPath,
    /// An enumeration value, with its symbol table for textual lookup.
    Enum(Arc<EnumTy>),
    /// A nested struct.
    Struct(Arc<StructTy>),
    /// A dynamically sized array of one element kind.
    Array(Box<FieldKind>),
    /// An unordered set of one element kind.
    Set(Box<FieldKind>),
    /// A map from one key kind to one value kind.
    Map(Box<FieldKind>, Box<FieldKind>),
    /// A polymorphic placeholder whose concrete struct type is chosen by
    /// the caller after decode. Decoding into this kind produces a boxed,
    /// deferred sub-message instead of recursing.
    Any,
}

/// One named field of a [`StructTy`].
#[derive(Clone, Debug, PartialEq)]
pub struct FieldTy {
    /// Field name, matched against wire schema field names.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldTy {
    /// Shorthand constructor.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Runtime description of a struct type: a name plus an ordered field list.
#[derive(Clone, Debug, PartialEq)]
pub struct StructTy {
    /// Type name, matched against wire schema message names.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldTy>,
}

impl StructTy {
    /// Builds a struct type from a name and its fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldTy>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    /// Index of the field with this exact name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Creates an instance with every field at its default value.
    pub fn instantiate(self: &Arc<Self>) -> crate::StructValue {
        crate::StructValue::new(Arc::clone(self))
    }
}

/// Runtime description of an enum type: symbolic names and their values.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumTy {
    /// Type name.
    pub name: String,
    /// `(symbol, value)` entries in declaration order.
    pub entries: Vec<(String, i64)>,
}

impl EnumTy {
    /// Builds an enum type.
    pub fn new(name: impl Into<String>, entries: Vec<(&str, i64)>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        })
    }

    /// Value of the entry with this symbol, if any.
    pub fn value_by_name(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Symbol of the entry with this value, if any.
    pub fn name_by_value(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}
