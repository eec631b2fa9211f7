use thiserror::Error;

/// Errors raised while writing replicated state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// A slot held a value of a different shape than its property kind
    #[error("Expected a `{expected}` value but found `{found}`")]
    ValueMismatch {
        expected: String,
        found: &'static str,
    },

    /// An enum value does not fit its declared bit width
    #[error("Enum value {value} does not fit in {bits} bit(s)")]
    EnumOutOfRange { value: u8, bits: u8 },

    /// A dynamic array is longer than its 16-bit count can express
    #[error("Array `{name}` has {len} elements, more than a 16-bit count allows")]
    ArrayTooLong { name: String, len: usize },

    /// A custom codec failed to encode its value
    #[error("Codec `{type_name}` failed: {detail}")]
    Codec { type_name: String, detail: String },

    #[error(transparent)]
    Retirement(#[from] RetirementError),
}

/// Errors raised by the custom-delta retirement arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RetirementError {
    /// The handle's slot was freed or reused since the handle was issued
    #[error("Retirement handle into slot {slot} is stale")]
    StaleHandle { slot: u32 },
}
