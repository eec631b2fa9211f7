use std::{fmt::Debug, sync::Arc};

use replica_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{
    host::SendError,
    layout::value::Value,
    types::{NetGuid, ReferenceResolver, Resolved},
};

/// Extension point for property types the built-in kinds do not cover.
pub trait Codec: Send + Sync + Debug {
    fn type_name(&self) -> &str;
    fn default_value(&self) -> Value;
    fn identical(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
    fn write(&self, value: &Value, writer: &mut dyn BitWrite) -> Result<(), SendError>;
    fn read(&self, reader: &mut BitReader) -> Result<Value, SerdeErr>;
    /// Whether one encoding of a value may be reused for every connection.
    fn is_shareable(&self) -> bool {
        true
    }
    /// Nominal in-memory size, used when bounding array memory.
    fn byte_size(&self) -> u32 {
        8
    }
}

/// A natively serialized struct: one command, fields written in order.
#[derive(Debug)]
pub struct NetStructDescriptor {
    pub name: String,
    pub fields: Vec<(String, PropertyKind)>,
}

impl NetStructDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, kind: PropertyKind) -> Self {
        self.fields.push((name.to_string(), kind));
        self
    }
}

/// How a single leaf property is compared and put on the wire.
#[derive(Clone, Debug)]
pub enum PropertyKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Variable-length unsigned integer carried in a `Value::U32`
    PackedInt,
    /// Enumeration carried in a `Value::U8`, written with `bits` bits
    Enum { bits: u8 },
    Str,
    ObjectRef,
    NetStruct(Arc<NetStructDescriptor>),
    Custom(Arc<dyn Codec>),
}

/// State threaded through a read so unresolved references can be recorded.
pub struct ReadContext<'r> {
    pub resolver: &'r dyn ReferenceResolver,
    /// Tokens that resolved to `Pending`, with the field path inside the
    /// value being read.
    pub unmapped: Vec<(Vec<usize>, NetGuid)>,
    field_path: Vec<usize>,
}

impl<'r> ReadContext<'r> {
    pub fn new(resolver: &'r dyn ReferenceResolver) -> Self {
        Self {
            resolver,
            unmapped: Vec::new(),
            field_path: Vec::new(),
        }
    }
}

impl PropertyKind {
    pub fn type_name(&self) -> &str {
        match self {
            PropertyKind::Bool => "bool",
            PropertyKind::U8 => "u8",
            PropertyKind::U16 => "u16",
            PropertyKind::U32 => "u32",
            PropertyKind::U64 => "u64",
            PropertyKind::I8 => "i8",
            PropertyKind::I16 => "i16",
            PropertyKind::I32 => "i32",
            PropertyKind::I64 => "i64",
            PropertyKind::F32 => "f32",
            PropertyKind::F64 => "f64",
            PropertyKind::PackedInt => "packed_int",
            PropertyKind::Enum { .. } => "enum",
            PropertyKind::Str => "string",
            PropertyKind::ObjectRef => "object",
            PropertyKind::NetStruct(descriptor) => &descriptor.name,
            PropertyKind::Custom(codec) => codec.type_name(),
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            PropertyKind::Bool => Value::Bool(false),
            PropertyKind::U8 | PropertyKind::Enum { .. } => Value::U8(0),
            PropertyKind::U16 => Value::U16(0),
            PropertyKind::U32 | PropertyKind::PackedInt => Value::U32(0),
            PropertyKind::U64 => Value::U64(0),
            PropertyKind::I8 => Value::I8(0),
            PropertyKind::I16 => Value::I16(0),
            PropertyKind::I32 => Value::I32(0),
            PropertyKind::I64 => Value::I64(0),
            PropertyKind::F32 => Value::F32(0.0),
            PropertyKind::F64 => Value::F64(0.0),
            PropertyKind::Str => Value::Str(String::new()),
            PropertyKind::ObjectRef => Value::Object(None),
            PropertyKind::NetStruct(descriptor) => Value::Struct(
                descriptor
                    .fields
                    .iter()
                    .map(|(_, kind)| kind.default_value())
                    .collect(),
            ),
            PropertyKind::Custom(codec) => codec.default_value(),
        }
    }

    pub fn byte_size(&self) -> u32 {
        match self {
            PropertyKind::Bool
            | PropertyKind::U8
            | PropertyKind::I8
            | PropertyKind::Enum { .. } => 1,
            PropertyKind::U16 | PropertyKind::I16 => 2,
            PropertyKind::U32
            | PropertyKind::I32
            | PropertyKind::F32
            | PropertyKind::PackedInt
            | PropertyKind::ObjectRef => 4,
            PropertyKind::U64 | PropertyKind::I64 | PropertyKind::F64 => 8,
            PropertyKind::Str => 16,
            PropertyKind::NetStruct(descriptor) => descriptor
                .fields
                .iter()
                .map(|(_, kind)| kind.byte_size())
                .sum(),
            PropertyKind::Custom(codec) => codec.byte_size(),
        }
    }

    pub fn is_shareable(&self) -> bool {
        match self {
            PropertyKind::ObjectRef => false,
            PropertyKind::NetStruct(descriptor) => {
                descriptor.fields.iter().all(|(_, kind)| kind.is_shareable())
            }
            PropertyKind::Custom(codec) => codec.is_shareable(),
            _ => true,
        }
    }

    pub fn has_object_references(&self) -> bool {
        match self {
            PropertyKind::ObjectRef => true,
            PropertyKind::NetStruct(descriptor) => descriptor
                .fields
                .iter()
                .any(|(_, kind)| kind.has_object_references()),
            _ => false,
        }
    }

    pub fn identical(&self, a: &Value, b: &Value) -> bool {
        match self {
            PropertyKind::Custom(codec) => codec.identical(a, b),
            _ => a == b,
        }
    }

    pub fn write(
        &self,
        value: &Value,
        writer: &mut dyn BitWrite,
        resolver: &dyn ReferenceResolver,
    ) -> Result<(), SendError> {
        match (self, value) {
            (PropertyKind::Bool, Value::Bool(v)) => v.ser(writer),
            (PropertyKind::U8, Value::U8(v)) => v.ser(writer),
            (PropertyKind::U16, Value::U16(v)) => v.ser(writer),
            (PropertyKind::U32, Value::U32(v)) => v.ser(writer),
            (PropertyKind::U64, Value::U64(v)) => v.ser(writer),
            (PropertyKind::I8, Value::I8(v)) => v.ser(writer),
            (PropertyKind::I16, Value::I16(v)) => v.ser(writer),
            (PropertyKind::I32, Value::I32(v)) => v.ser(writer),
            (PropertyKind::I64, Value::I64(v)) => v.ser(writer),
            (PropertyKind::F32, Value::F32(v)) => v.ser(writer),
            (PropertyKind::F64, Value::F64(v)) => v.ser(writer),
            (PropertyKind::PackedInt, Value::U32(v)) => {
                UnsignedVariableInteger::<7>::new(*v).ser(writer)
            }
            (PropertyKind::Enum { bits }, Value::U8(v)) => {
                if *bits < 8 && (*v >> *bits) != 0 {
                    return Err(SendError::EnumOutOfRange {
                        value: *v,
                        bits: *bits,
                    });
                }
                for bit in 0..*bits {
                    writer.write_bit((*v >> bit) & 1 != 0);
                }
            }
            (PropertyKind::Str, Value::Str(v)) => v.ser(writer),
            (PropertyKind::ObjectRef, Value::Object(object)) => {
                let token = object
                    .map(|object| resolver.object_to_token(object))
                    .unwrap_or(NetGuid::NULL);
                write_varint(writer, token.0);
            }
            (PropertyKind::NetStruct(descriptor), Value::Struct(fields))
                if fields.len() == descriptor.fields.len() =>
            {
                for ((_, kind), field) in descriptor.fields.iter().zip(fields.iter()) {
                    kind.write(field, writer, resolver)?;
                }
            }
            (PropertyKind::Custom(codec), value) => codec.write(value, writer)?,
            (kind, value) => {
                return Err(SendError::ValueMismatch {
                    expected: kind.type_name().to_string(),
                    found: value.type_name(),
                })
            }
        }
        Ok(())
    }

    pub fn read(
        &self,
        reader: &mut BitReader,
        context: &mut ReadContext,
    ) -> Result<Value, SerdeErr> {
        let value = match self {
            PropertyKind::Bool => Value::Bool(bool::de(reader)?),
            PropertyKind::U8 => Value::U8(u8::de(reader)?),
            PropertyKind::U16 => Value::U16(u16::de(reader)?),
            PropertyKind::U32 => Value::U32(u32::de(reader)?),
            PropertyKind::U64 => Value::U64(u64::de(reader)?),
            PropertyKind::I8 => Value::I8(i8::de(reader)?),
            PropertyKind::I16 => Value::I16(i16::de(reader)?),
            PropertyKind::I32 => Value::I32(i32::de(reader)?),
            PropertyKind::I64 => Value::I64(i64::de(reader)?),
            PropertyKind::F32 => Value::F32(f32::de(reader)?),
            PropertyKind::F64 => Value::F64(f64::de(reader)?),
            PropertyKind::PackedInt => Value::U32(read_varint(reader)?),
            PropertyKind::Enum { bits } => {
                let mut value: u8 = 0;
                for bit in 0..*bits {
                    if reader.read_bit()? {
                        value |= 1 << bit;
                    }
                }
                Value::U8(value)
            }
            PropertyKind::Str => Value::Str(String::de(reader)?),
            PropertyKind::ObjectRef => {
                let token = NetGuid(read_varint(reader)?);
                match context.resolver.token_to_object(token) {
                    Resolved::Null => Value::Object(None),
                    Resolved::Mapped(object) => Value::Object(Some(object)),
                    Resolved::Pending => {
                        context.unmapped.push((context.field_path.clone(), token));
                        Value::Object(None)
                    }
                }
            }
            PropertyKind::NetStruct(descriptor) => {
                let mut fields = Vec::with_capacity(descriptor.fields.len());
                for (index, (_, kind)) in descriptor.fields.iter().enumerate() {
                    context.field_path.push(index);
                    let field = kind.read(reader, context);
                    context.field_path.pop();
                    fields.push(field?);
                }
                Value::Struct(fields)
            }
            PropertyKind::Custom(codec) => codec.read(reader)?,
        };
        Ok(value)
    }

    /// Checks that `value` has the shape this kind writes.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (PropertyKind::Bool, Value::Bool(_))
            | (PropertyKind::U8, Value::U8(_))
            | (PropertyKind::U16, Value::U16(_))
            | (PropertyKind::U32, Value::U32(_))
            | (PropertyKind::U64, Value::U64(_))
            | (PropertyKind::I8, Value::I8(_))
            | (PropertyKind::I16, Value::I16(_))
            | (PropertyKind::I32, Value::I32(_))
            | (PropertyKind::I64, Value::I64(_))
            | (PropertyKind::F32, Value::F32(_))
            | (PropertyKind::F64, Value::F64(_))
            | (PropertyKind::PackedInt, Value::U32(_))
            | (PropertyKind::Enum { .. }, Value::U8(_))
            | (PropertyKind::Str, Value::Str(_))
            | (PropertyKind::ObjectRef, Value::Object(_))
            | (PropertyKind::Custom(_), _) => true,
            (PropertyKind::NetStruct(descriptor), Value::Struct(fields)) => {
                fields.len() == descriptor.fields.len()
                    && descriptor
                        .fields
                        .iter()
                        .zip(fields.iter())
                        .all(|((_, kind), field)| kind.accepts(field))
            }
            _ => false,
        }
    }
}

pub(crate) fn write_handle(writer: &mut dyn BitWrite, handle: u16) {
    UnsignedVariableInteger::<7>::new(handle).ser(writer);
}

pub(crate) fn read_handle(reader: &mut BitReader) -> Result<u16, SerdeErr> {
    UnsignedVariableInteger::<7>::de(reader)?.try_to()
}

pub(crate) fn write_varint(writer: &mut dyn BitWrite, value: u32) {
    UnsignedVariableInteger::<7>::new(value).ser(writer);
}

pub(crate) fn read_varint(reader: &mut BitReader) -> Result<u32, SerdeErr> {
    UnsignedVariableInteger::<7>::de(reader)?.try_to()
}
