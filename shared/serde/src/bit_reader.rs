use crate::SerdeErr;

/// LSB-first bit reader over a borrowed buffer.
///
/// A reader may be limited to fewer bits than the buffer holds, which is how
/// length-prefixed payloads are read without copying (see [`BitReader::sub_reader`]).
#[derive(Debug, Clone)]
pub struct BitReader<'b> {
    buffer: &'b [u8],
    position: u32,
    limit: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            limit: (buffer.len() * 8) as u32,
        }
    }

    /// Reader over the first `bit_length` bits of `buffer`.
    pub fn with_bit_length(buffer: &'b [u8], bit_length: u32) -> Self {
        let limit = bit_length.min((buffer.len() * 8) as u32);
        Self {
            buffer,
            position: 0,
            limit,
        }
    }

    pub fn bits_left(&self) -> u32 {
        self.limit - self.position
    }

    pub fn bits_read(&self) -> u32 {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.position >= self.limit {
            return Err(SerdeErr::OutOfBits {
                requested: 1,
                remaining: 0,
            });
        }
        let byte = self.buffer[(self.position / 8) as usize];
        let bit = byte & (1 << (self.position % 8)) != 0;
        self.position += 1;
        Ok(bit)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        self.ensure(8)?;
        let mut output = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                output |= 1 << i;
            }
        }
        Ok(output)
    }

    /// Splits off the next `bit_length` bits as an independent reader and
    /// advances past them.
    pub fn sub_reader(&mut self, bit_length: u32) -> Result<BitReader<'b>, SerdeErr> {
        self.ensure(bit_length)?;
        let sub = BitReader {
            buffer: self.buffer,
            position: self.position,
            limit: self.position + bit_length,
        };
        self.position += bit_length;
        Ok(sub)
    }

    pub fn skip_bits(&mut self, bit_length: u32) -> Result<(), SerdeErr> {
        self.ensure(bit_length)?;
        self.position += bit_length;
        Ok(())
    }

    /// Byte buffer and starting bit offset of the unread portion.
    pub fn remaining_source(&self) -> (&'b [u8], u32) {
        (self.buffer, self.position)
    }

    fn ensure(&self, bits: u32) -> Result<(), SerdeErr> {
        if bits > self.bits_left() {
            return Err(SerdeErr::OutOfBits {
                requested: bits,
                remaining: self.bits_left(),
            });
        }
        Ok(())
    }
}
