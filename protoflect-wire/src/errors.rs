use core::fmt;

/// Errors produced while parsing descriptor bytes or wire payloads.
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum WireError {
    /// Input ended in the middle of a value.
    UnexpectedEof,
    /// A field tag was zero or otherwise malformed.
    InvalidTag,
    /// A known field arrived with the wrong wire type.
    WireTypeMismatch {
        /// Field number carrying the mismatch.
        field: u32,
        /// Wire type found on the wire.
        found: u8,
    },
    /// A string field held non-UTF-8 bytes.
    InvalidUtf8,
    /// A schema descriptor was structurally invalid.
    BadDescriptor(String),
    /// A descriptor referenced a type name not present in the pool.
    UnknownTypeName(String),
    /// Message nesting exceeded the fixed recursion bound.
    DepthLimitExceeded,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnexpectedEof => write!(f, "unexpected end of input"),
            WireError::InvalidTag => write!(f, "invalid field tag"),
            WireError::WireTypeMismatch { field, found } => {
                write!(f, "field {field} carried unexpected wire type {found}")
            }
            WireError::InvalidUtf8 => write!(f, "string field held invalid UTF-8"),
            WireError::BadDescriptor(what) => write!(f, "bad descriptor: {what}"),
            WireError::UnknownTypeName(name) => write!(f, "unknown type name: {name}"),
            WireError::DepthLimitExceeded => write!(f, "message nesting too deep"),
        }
    }
}

impl std::error::Error for WireError {}
