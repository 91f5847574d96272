#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod any;
mod codec;
mod pool;
mod view;
mod visit;

pub use any::{coerce, enumerate};
pub use codec::{decode_struct, decode_struct_from_bytes, encode_struct, encode_struct_to_bytes};
pub use pool::{normalize_generated_name, DescriptorPoolRegistry, PoolId};
pub use view::{FieldReader, FieldWriter, ReadValue, WireScalar};

pub use protoflect_core::{
    AnyPayload, AnyValue, EnumTy, FieldKind, FieldTy, StructTy, StructValue, Value,
};
pub use protoflect_wire::{DescriptorSet, MessageDef, WireMessage, WireValue};
