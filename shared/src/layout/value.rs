use crate::{fast_array::FastArrayValue, types::ObjectId};

/// The slot vector backing one object (or one array element, or one fast
/// array item). Slot `n` holds the value of the command whose `slot` is `n`.
pub type ObjectData = Vec<Value>;

/// A single replicated value.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Object(Option<ObjectId>),
    /// Fields of a natively serialized struct, in declaration order
    Struct(Vec<Value>),
    /// Opaque payload produced by a custom codec
    Bytes(Vec<u8>),
    /// Dynamic array, one slot vector per element
    Array(Vec<ObjectData>),
    FastArray(FastArrayValue),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Struct(_) => "struct",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::FastArray(_) => "fast array",
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ObjectData>> {
        match self {
            Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<ObjectData>> {
        match self {
            Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_fast_array(&self) -> Option<&FastArrayValue> {
        match self {
            Value::FastArray(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_fast_array_mut(&mut self) -> Option<&mut FastArrayValue> {
        match self {
            Value::FastArray(array) => Some(array),
            _ => None,
        }
    }

    /// Borrows the elements of an array slot, treating anything else as empty.
    pub(crate) fn array_elements(&self) -> &[ObjectData] {
        match self {
            Value::Array(elements) => elements,
            _ => &[],
        }
    }

    /// Mutable access to an array slot, replacing a mismatched value with an
    /// empty array first.
    pub(crate) fn ensure_array(&mut self) -> &mut Vec<ObjectData> {
        if !matches!(self, Value::Array(_)) {
            *self = Value::Array(Vec::new());
        }
        match self {
            Value::Array(elements) => elements,
            _ => unreachable!(),
        }
    }
}

// Floats compare by bit pattern so NaN payloads and signed zeroes count as
// changes.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::FastArray(a), Value::FastArray(b)) => a == b,
            _ => false,
        }
    }
}

/// Walks a slot path (`slot`, then `element`, `slot` pairs for each array
/// level, then field indices inside natively serialized structs). Fast
/// array items are addressed by item id instead of element index.
pub fn value_at_mut<'a>(data: &'a mut [Value], path: &[usize]) -> Option<&'a mut Value> {
    let (first, mut rest) = path.split_first()?;
    let mut current = data.get_mut(*first)?;
    while let Some((index, tail)) = rest.split_first() {
        current = match current {
            Value::Array(elements) => {
                let (slot, tail_after) = tail.split_first()?;
                rest = tail_after;
                elements.get_mut(*index)?.get_mut(*slot)?
            }
            Value::FastArray(array) => {
                let (slot, tail_after) = tail.split_first()?;
                rest = tail_after;
                array
                    .items
                    .iter_mut()
                    .find(|item| usize::try_from(item.id).ok() == Some(*index))?
                    .data
                    .get_mut(*slot)?
            }
            Value::Struct(fields) => {
                rest = tail;
                fields.get_mut(*index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
