use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = SerdeInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = SerdeInteger<true, true, BITS>;

/// Integer encoded with a fixed or variable number of bits.
///
/// Variable integers are written in groups of `BITS` bits, each preceded by
/// a "proceed" bit, least significant group first. With `BITS = 7` a value
/// below 128 costs exactly 8 bits, which is the packed handle encoding.
// The generic wrapper forwards to a non-generic inner type to limit monomorphization.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    inner: SerdeIntegerInner,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct SerdeIntegerInner {
    value: i128,
    signed: bool,
    variable: bool,
    bits: u8,
}

impl SerdeIntegerInner {
    fn try_new(signed: bool, variable: bool, bits: u8, value: i128) -> Result<Self, SerdeErr> {
        let out_of_range = SerdeErr::IntegerOutOfRange {
            value,
            bits,
            signed,
        };
        if bits == 0 || bits > 127 {
            return Err(out_of_range);
        }
        if !signed && value < 0 {
            return Err(out_of_range);
        }
        if !variable && bits < 127 {
            let max_value: i128 = 2_i128.pow(bits as u32);
            if value >= max_value || (signed && value <= -max_value) {
                return Err(out_of_range);
            }
        }
        Ok(Self {
            value,
            signed,
            variable,
            bits,
        })
    }

    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut magnitude: u128 = self.value.unsigned_abs();

        if self.signed {
            writer.write_bit(self.value < 0);
        }

        if self.variable {
            loop {
                let proceed = magnitude >= 2_u128.pow(self.bits as u32);
                writer.write_bit(proceed);
                for _ in 0..self.bits {
                    writer.write_bit(magnitude & 1 != 0);
                    magnitude >>= 1;
                }
                if !proceed {
                    return;
                }
            }
        } else {
            for _ in 0..self.bits {
                writer.write_bit(magnitude & 1 != 0);
                magnitude >>= 1;
            }
        }
    }

    fn de(
        reader: &mut BitReader,
        signed: bool,
        variable: bool,
        bits: u8,
    ) -> Result<Self, SerdeErr> {
        let negative = if signed { reader.read_bit()? } else { false };

        let mut magnitude: u128 = 0;
        let mut shift: u32 = 0;

        loop {
            let proceed = if variable { reader.read_bit()? } else { false };
            for _ in 0..bits {
                if reader.read_bit()? {
                    if shift >= 127 {
                        return Err(SerdeErr::InvalidValue {
                            type_name: "SerdeInteger",
                            detail: "variable integer exceeds 127 bits".to_string(),
                        });
                    }
                    magnitude |= 1 << shift;
                }
                shift += 1;
            }
            if !proceed {
                break;
            }
        }

        let value = magnitude as i128;
        Ok(Self {
            value: if negative { -value } else { value },
            signed,
            variable,
            bits,
        })
    }

    fn bit_length(&self) -> u32 {
        let mut output: u32 = if self.signed { 1 } else { 0 };

        if self.variable {
            let mut magnitude = self.value.unsigned_abs();
            loop {
                let proceed = magnitude >= 2_u128.pow(self.bits as u32);
                output += 1 + self.bits as u32;
                magnitude >>= self.bits;
                if !proceed {
                    break;
                }
            }
        } else {
            output += self.bits as u32;
        }
        output
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8>
    SerdeInteger<SIGNED, VARIABLE, BITS>
{
    pub fn try_new<T: Into<i128>>(value: T) -> Result<Self, SerdeErr> {
        Ok(Self {
            inner: SerdeIntegerInner::try_new(SIGNED, VARIABLE, BITS, value.into())?,
        })
    }

    /// # Panics
    ///
    /// Panics if `value` cannot be represented with this integer's sign and width.
    pub fn new<T: Into<i128>>(value: T) -> Self {
        match Self::try_new(value) {
            Ok(integer) => integer,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn get(&self) -> i128 {
        self.inner.value
    }

    /// Value narrowed to `T`, or an error if it does not fit.
    pub fn try_to<T: TryFrom<i128>>(&self) -> Result<T, SerdeErr> {
        T::try_from(self.inner.value).map_err(|_| SerdeErr::InvalidValue {
            type_name: std::any::type_name::<T>(),
            detail: format!("{} is out of range", self.inner.value),
        })
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let inner = SerdeIntegerInner::de(reader, SIGNED, VARIABLE, BITS)?;
        Ok(Self { inner })
    }

    fn bit_length(&self) -> u32 {
        self.inner.bit_length()
    }
}

impl<const SIGNED: bool, const BITS: u8> ConstBitLength for SerdeInteger<SIGNED, false, BITS> {
    fn const_bit_length() -> u32 {
        let sign: u32 = if SIGNED { 1 } else { 0 };
        sign + BITS as u32
    }
}
