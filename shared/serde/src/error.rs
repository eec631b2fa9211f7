use thiserror::Error;

/// Errors that can occur while reading from a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The reader ran past the end of its bit budget.
    #[error("Attempted to read {requested} bit(s) with only {remaining} remaining")]
    OutOfBits { requested: u32, remaining: u32 },

    /// A value read from the stream cannot be represented by the target type.
    #[error("Invalid {type_name} value read from stream: {detail}")]
    InvalidValue {
        type_name: &'static str,
        detail: String,
    },

    /// An integer was constructed outside the range its bit width allows.
    #[error("Integer {value} does not fit in {bits} bit(s) (signed: {signed})")]
    IntegerOutOfRange { value: i128, bits: u8, signed: bool },
}
