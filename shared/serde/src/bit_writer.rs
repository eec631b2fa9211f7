/// Sink for individual bits. Implemented by [`BitWriter`] and [`BitCounter`](crate::BitCounter).
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn count_bits(&mut self, bits: u32);
    fn is_counter(&self) -> bool;
}

/// Position inside a [`BitWriter`] that can later be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitMark {
    bits: u32,
}

impl BitMark {
    pub fn bits(&self) -> u32 {
        self.bits
    }
}

/// Growable, LSB-first bit writer.
///
/// Bits are packed into bytes starting at the least significant bit, so a
/// byte written with [`BitWrite::write_byte`] on a byte boundary lands in
/// the buffer unchanged.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bits_written: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            bits_written: 0,
        }
    }

    pub fn bits_written(&self) -> u32 {
        self.bits_written
    }

    pub fn is_empty(&self) -> bool {
        self.bits_written == 0
    }

    /// The backing bytes. The final byte is zero-padded past `bits_written`.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn mark(&self) -> BitMark {
        BitMark {
            bits: self.bits_written,
        }
    }

    /// Discards everything written after `mark`.
    pub fn rollback(&mut self, mark: BitMark) {
        if mark.bits >= self.bits_written {
            return;
        }
        self.bits_written = mark.bits;
        let byte_len = (mark.bits as usize).div_ceil(8);
        self.buffer.truncate(byte_len);
        let used = mark.bits % 8;
        if used != 0 {
            if let Some(last) = self.buffer.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.bits_written = 0;
    }

    /// Copies `bit_length` bits of `source`, starting at `bit_offset`.
    pub fn write_bits_from(&mut self, source: &[u8], bit_offset: u32, bit_length: u32) {
        for i in bit_offset..bit_offset + bit_length {
            let byte = source[(i / 8) as usize];
            self.write_bit(byte & (1 << (i % 8)) != 0);
        }
    }

    /// Appends the full contents of another writer.
    pub fn append(&mut self, other: &BitWriter) {
        self.write_bits_from(&other.buffer, 0, other.bits_written);
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        let index = self.bits_written % 8;
        if index == 0 {
            self.buffer.push(0);
        }
        if bit {
            if let Some(last) = self.buffer.last_mut() {
                *last |= 1 << index;
            }
        }
        self.bits_written += 1;
    }

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    fn count_bits(&mut self, _bits: u32) {}

    fn is_counter(&self) -> bool {
        false
    }
}
