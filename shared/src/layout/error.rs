use thiserror::Error;

/// Errors raised while compiling a type description into a layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Two commands at the same nesting level hashed to the same checksum
    #[error("Properties `{first}` and `{second}` share compatible checksum {checksum:#010x}")]
    ChecksumCollision {
        first: String,
        second: String,
        checksum: u32,
    },

    /// A dynamic array whose element has no replicated bytes
    #[error("Dynamic array `{name}` has a zero-sized element")]
    ZeroSizeElement { name: String },

    /// Only one of the Role / RemoteRole pair is present
    #[error("Role fields must come in pairs (role: {has_role}, remote role: {has_remote_role})")]
    RolePairMismatch {
        has_role: bool,
        has_remote_role: bool,
    },

    /// A role field must be a single scalar property
    #[error("Role field `{name}` must be a scalar property with an array dimension of 1")]
    InvalidRoleField { name: String },

    /// A flattened struct or fast array item declared no fields
    #[error("Struct `{name}` has no fields")]
    EmptyStruct { name: String },

    /// A field declared a static array dimension of zero
    #[error("Field `{name}` has a static array dimension of 0")]
    ZeroArrayDim { name: String },

    /// A fast array appeared somewhere other than a top-level field
    #[error("Fast array `{name}` must be a top-level field")]
    NestedCustomDelta { name: String },

    /// An enum property declared a width outside 1..=8 bits
    #[error("Enum property `{name}` declares {bits} bit(s), expected 1 to 8")]
    InvalidEnumBits { name: String, bits: u8 },

    /// The layout would need more handles than fit in 16 bits
    #[error("Layout for `{name}` needs more than 65535 handles")]
    TooManyHandles { name: String },
}
