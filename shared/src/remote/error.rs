use thiserror::Error;

use replica_serde::SerdeErr;

/// Errors raised while applying received state. Any of these leaves the
/// stream position undefined, so the rest of the payload must be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("Failed to read from stream: {0}")]
    Serde(#[from] SerdeErr),

    /// An array count above the configured element bound
    #[error("Array `{name}` received {count} elements, the limit is {max}")]
    ArrayTooLarge { name: String, count: u32, max: u32 },

    /// An array count whose memory footprint is above the configured bound
    #[error("Array `{name}` would need {bytes} bytes, the limit is {max}")]
    ArrayMemoryExceeded { name: String, bytes: u64, max: u32 },

    /// Element records of an array were not closed by a `0` handle
    #[error("Array `{name}` element records ended with handle {handle} instead of 0")]
    InvalidArrayTerminator { name: String, handle: u16 },

    /// A handle that matches no command of the layout
    #[error("Handle {handle} does not match any property")]
    UnknownHandle { handle: u16 },

    /// The local data has no slot for a command of the layout
    #[error("Object data has no slot for `{name}`")]
    MissingSlot { name: String },

    /// A backward-compatible record named an export that was never received
    #[error("Field export {handle} is unknown")]
    UnknownExport { handle: u32 },

    /// The authority refuses records it cannot map to a local property
    #[error("Property `{name}` ({checksum:#010x}) does not match the local layout")]
    IncompatibleProperty { name: String, checksum: u32 },

    /// A record's payload was not consumed exactly
    #[error("Record for `{name}` left {bits_left} bit(s) unread")]
    PayloadSizeMismatch { name: String, bits_left: u32 },

    /// A trailing array terminator that does not describe a shrink
    #[error("Array `{name}` has an invalid shrink terminator")]
    InvalidShrinkTerminator { name: String },

    /// A backward-compatible record addressed an element past the array's length
    #[error("Array `{name}` has {count} elements, record addressed index {index}")]
    ArrayIndexOutOfBounds { name: String, index: u32, count: u32 },

    /// A fast array delta naming more items than allowed
    #[error("Fast array delta names {count} items, the limit is {max}")]
    FastArrayTooLarge { count: u32, max: u32 },

    /// A custom-delta header named a field that is not a fast array
    #[error("Parent {parent_index} is not a custom-delta field")]
    UnknownCustomDeltaField { parent_index: u32 },
}
