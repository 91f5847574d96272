#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub use color_eyre::eyre;

use std::io::Write;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};
use owo_colors::{OwoColorize, Style};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let level_style = match record.level() {
            Level::Error => Style::new().fg_rgb::<243, 139, 168>(),
            Level::Warn => Style::new().fg_rgb::<249, 226, 175>(),
            Level::Info => Style::new().fg_rgb::<166, 227, 161>(),
            Level::Debug => Style::new().fg_rgb::<137, 180, 250>(),
            Level::Trace => Style::new().fg_rgb::<148, 226, 213>(),
        };

        eprintln!(
            "{} - {}: {}",
            record.level().style(level_style),
            record
                .target()
                .style(Style::new().fg_rgb::<137, 180, 250>()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs color-eyre and a simple stderr logger.
///
/// Safe to call from every test; only the first call in a process takes
/// effect.
pub fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        #[cfg(not(miri))]
        {
            let _ = color_eyre::install();
        }
        if log::set_boxed_logger(Box::new(SimpleLogger)).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Hand-rolled `FileDescriptorProto` builders.
///
/// Tests author their schemas with these instead of depending on a
/// `protoc` binary. Only the descriptor fields the parser consumes are
/// emitted.
pub mod schema {
    /// `FieldDescriptorProto.Type` for fixed32, which the parser rejects.
    pub const TYPE_FIXED32: i32 = 7;

    const TYPE_DOUBLE: i32 = 1;
    const TYPE_FLOAT: i32 = 2;
    const TYPE_INT64: i32 = 3;
    const TYPE_UINT64: i32 = 4;
    const TYPE_INT32: i32 = 5;
    const TYPE_BOOL: i32 = 8;
    const TYPE_STRING: i32 = 9;
    const TYPE_MESSAGE: i32 = 11;
    const TYPE_BYTES: i32 = 12;
    const TYPE_UINT32: i32 = 13;
    const TYPE_ENUM: i32 = 14;

    const LABEL_OPTIONAL: i32 = 1;
    const LABEL_REPEATED: i32 = 3;

    /// Builder for one `FileDescriptorProto`.
    #[derive(Clone, Debug, Default)]
    pub struct FileProto {
        name: String,
        package: Option<String>,
        messages: Vec<MessageProto>,
        enums: Vec<(String, Vec<(String, i32)>)>,
    }

    impl FileProto {
        /// A file descriptor with the given file name.
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Self::default()
            }
        }

        /// Sets the proto package.
        pub fn package(mut self, package: &str) -> Self {
            self.package = Some(package.to_string());
            self
        }

        /// Adds a top-level message.
        pub fn message(mut self, message: MessageProto) -> Self {
            self.messages.push(message);
            self
        }

        /// Adds a top-level enum with `(symbol, number)` entries.
        pub fn enumeration(mut self, name: &str, entries: &[(&str, i32)]) -> Self {
            self.enums.push((
                name.to_string(),
                entries
                    .iter()
                    .map(|(n, v)| (n.to_string(), *v))
                    .collect(),
            ));
            self
        }

        /// Serializes to `FileDescriptorProto` bytes.
        pub fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            put_str(&mut out, 1, &self.name);
            if let Some(package) = &self.package {
                put_str(&mut out, 2, package);
            }
            for message in &self.messages {
                put_bytes(&mut out, 4, &message.encode());
            }
            for (name, entries) in &self.enums {
                put_bytes(&mut out, 5, &encode_enum(name, entries));
            }
            out
        }
    }

    /// Builder for one `DescriptorProto`.
    #[derive(Clone, Debug)]
    pub struct MessageProto {
        name: String,
        fields: Vec<FieldProto>,
        nested: Vec<MessageProto>,
        map_entry: bool,
    }

    impl MessageProto {
        /// A message descriptor with the given short name.
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                fields: Vec::new(),
                nested: Vec::new(),
                map_entry: false,
            }
        }

        /// Adds a field.
        pub fn field(mut self, field: FieldProto) -> Self {
            self.fields.push(field);
            self
        }

        /// Adds a nested message.
        pub fn nested(mut self, message: MessageProto) -> Self {
            self.nested.push(message);
            self
        }

        /// Marks this message as a synthetic map entry
        /// (`MessageOptions.map_entry = true`).
        pub fn map_entry(mut self) -> Self {
            self.map_entry = true;
            self
        }

        fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            put_str(&mut out, 1, &self.name);
            for field in &self.fields {
                put_bytes(&mut out, 2, &field.encode());
            }
            for nested in &self.nested {
                put_bytes(&mut out, 3, &nested.encode());
            }
            if self.map_entry {
                // MessageOptions with map_entry (field 7) set.
                let mut options = Vec::new();
                put_tag(&mut options, 7, 0);
                put_varint(&mut options, 1);
                put_bytes(&mut out, 7, &options);
            }
            out
        }
    }

    /// Builder for one `FieldDescriptorProto`.
    #[derive(Clone, Debug)]
    pub struct FieldProto {
        name: String,
        number: i32,
        label: i32,
        type_: i32,
        type_name: Option<String>,
    }

    impl FieldProto {
        fn scalar_of(name: &str, number: i32, type_: i32) -> Self {
            Self {
                name: name.to_string(),
                number,
                label: LABEL_OPTIONAL,
                type_,
                type_name: None,
            }
        }

        /// An arbitrary scalar field with an explicit descriptor type
        /// number. Useful for exercising unsupported types.
        pub fn scalar(name: &str, number: i32, type_: i32) -> Self {
            Self::scalar_of(name, number, type_)
        }

        /// A `bool` field.
        pub fn bool(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_BOOL)
        }

        /// An `int32` field.
        pub fn int32(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_INT32)
        }

        /// A `uint32` field.
        pub fn uint32(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_UINT32)
        }

        /// An `int64` field.
        pub fn int64(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_INT64)
        }

        /// A `uint64` field.
        pub fn uint64(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_UINT64)
        }

        /// A `float` field.
        pub fn float(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_FLOAT)
        }

        /// A `double` field.
        pub fn double(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_DOUBLE)
        }

        /// A `string` field.
        pub fn string(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_STRING)
        }

        /// A `bytes` field.
        pub fn bytes(name: &str, number: i32) -> Self {
            Self::scalar_of(name, number, TYPE_BYTES)
        }

        /// A message field referencing `type_name` (leading dot for a
        /// fully qualified reference).
        pub fn message(name: &str, number: i32, type_name: &str) -> Self {
            let mut field = Self::scalar_of(name, number, TYPE_MESSAGE);
            field.type_name = Some(type_name.to_string());
            field
        }

        /// An enum field referencing `type_name`.
        pub fn enumeration(name: &str, number: i32, type_name: &str) -> Self {
            let mut field = Self::scalar_of(name, number, TYPE_ENUM);
            field.type_name = Some(type_name.to_string());
            field
        }

        /// Marks the field repeated.
        pub fn repeated(mut self) -> Self {
            self.label = LABEL_REPEATED;
            self
        }

        fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            put_str(&mut out, 1, &self.name);
            put_tag(&mut out, 3, 0);
            put_varint(&mut out, self.number as u64);
            put_tag(&mut out, 4, 0);
            put_varint(&mut out, self.label as u64);
            put_tag(&mut out, 5, 0);
            put_varint(&mut out, self.type_ as u64);
            if let Some(type_name) = &self.type_name {
                put_str(&mut out, 6, type_name);
            }
            out
        }
    }

    /// Wraps already-encoded `FileDescriptorProto`s into one
    /// `FileDescriptorSet`.
    pub fn file_set(files: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for file in files {
            put_bytes(&mut out, 1, file);
        }
        out
    }

    fn encode_enum(name: &str, entries: &[(String, i32)]) -> Vec<u8> {
        let mut out = Vec::new();
        put_str(&mut out, 1, name);
        for (symbol, number) in entries {
            let mut value = Vec::new();
            put_str(&mut value, 1, symbol);
            put_tag(&mut value, 2, 0);
            put_varint(&mut value, *number as u64);
            put_bytes(&mut out, 2, &value);
        }
        out
    }

    fn put_varint(out: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    fn put_tag(out: &mut Vec<u8>, field: u32, wire_type: u8) {
        put_varint(out, (u64::from(field) << 3) | u64::from(wire_type));
    }

    fn put_bytes(out: &mut Vec<u8>, field: u32, payload: &[u8]) {
        put_tag(out, field, 2);
        put_varint(out, payload.len() as u64);
        out.extend_from_slice(payload);
    }

    fn put_str(out: &mut Vec<u8>, field: u32, text: &str) {
        put_bytes(out, field, text.as_bytes());
    }
}
