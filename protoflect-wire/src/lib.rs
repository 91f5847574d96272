#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod codec;
mod descriptor;
mod errors;
mod message;
mod parse;
mod varint;

pub use codec::{decode_message, encode_message};
pub use descriptor::{
    Cardinality, DescriptorSet, EnumDef, EnumId, FieldDef, MessageDef, MessageId, WireKind,
};
pub use errors::WireError;
pub use message::{WireMessage, WireValue};
pub use parse::split_file_set;
