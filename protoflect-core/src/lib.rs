#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod any;
mod types;
mod value;

pub use any::{AnyPayload, AnyValue};
pub use types::{EnumTy, FieldKind, FieldTy, StructTy};
pub use value::{StructValue, Value};
