use std::iter::repeat_with;
use thiserror::Error;

pub mod base64;

const BITS_PER_BYTE: usize = 8;
const INT_BITS: usize = u32::BITS as usize;
const LONG_BITS: usize = u64::BITS as usize;

/// The error type for out of range or ill-sized accesses to a [`BitBuffer`].
#[derive(Error, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum FormatError {
    /// A bit beyond the end of the buffer was requested.
    #[error("bit index {index} out of range (buffer is {len} bits long)")]
    OutOfBounds { index: usize, len: usize },
    /// The requested integer does not fit in the integer type of the read primitive.
    #[error("can't fit {size} bits in a {max} bits integer")]
    IntegerTooWide { size: usize, max: usize },
    /// Six-bit strings must be made of whole 6-bit characters.
    #[error("string bit length must be a multiple of six (found {0})")]
    SixBitStringSize(usize),
    /// The value to write needs more bits than the target field has.
    #[error("value {value} does not fit in {size} bits")]
    ValueOverflow { value: u64, size: usize },
}

/// A fixed size bit buffer addressed most significant bit first.
///
/// Bit 0 is the most significant bit of the first byte, which is the order
/// consent strings are laid out in. Generic bit set types usually number bits
/// the other way around within a byte, and cannot be used here.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
}

impl BitBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Creates a buffer of zero bits, large enough to hold `bits` bits.
    pub fn zeroed(bits: usize) -> Self {
        Self {
            bytes: vec![0; bits.div_ceil(BITS_PER_BYTE)],
        }
    }

    /// Number of addressable bits.
    pub fn len(&self) -> usize {
        self.bytes.len() * BITS_PER_BYTE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn get_bit(&self, index: usize) -> Result<bool, FormatError> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bytes[byte] & mask != 0)
    }

    pub fn set_bit(&mut self, index: usize, value: bool) -> Result<(), FormatError> {
        let (byte, mask) = self.locate(index)?;
        if value {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
        Ok(())
    }

    /// Reads `size` bits starting at `start` as a big endian integer that must fit in 32 bits.
    pub fn get_int(&self, start: usize, size: usize) -> Result<u32, FormatError> {
        if size > INT_BITS {
            return Err(FormatError::IntegerTooWide {
                size,
                max: INT_BITS,
            });
        }
        // lossless, at most 32 bits were read
        Ok(self.read_bits(start, size)? as u32)
    }

    /// Reads `size` bits starting at `start` as a big endian integer that must fit in 64 bits.
    pub fn get_long(&self, start: usize, size: usize) -> Result<u64, FormatError> {
        if size > LONG_BITS {
            return Err(FormatError::IntegerTooWide {
                size,
                max: LONG_BITS,
            });
        }
        self.read_bits(start, size)
    }

    /// Writes `value` over the `size` bits starting at `start`.
    ///
    /// Every bit of the target field is written, so previous contents never leak through.
    pub fn set_uint(&mut self, start: usize, size: usize, value: u64) -> Result<(), FormatError> {
        if size > LONG_BITS {
            return Err(FormatError::IntegerTooWide {
                size,
                max: LONG_BITS,
            });
        }
        if size < LONG_BITS && value >> size != 0 {
            return Err(FormatError::ValueOverflow { value, size });
        }
        self.check_range(start, size)?;

        for i in 0..size {
            let bit = (value >> (size - 1 - i)) & 1 == 1;
            self.set_bit(start + i, bit)?;
        }
        Ok(())
    }

    /// Reads `size` bits as a string of 6-bit characters, where 0 is `A` and 25 is `Z`.
    pub fn get_six_bit_string(&self, start: usize, size: usize) -> Result<String, FormatError> {
        if size % 6 != 0 {
            return Err(FormatError::SixBitStringSize(size));
        }

        let mut offset = start;
        repeat_with(|| {
            let c = self.get_int(offset, 6);
            offset += 6;
            c.map(|n| char::from(n as u8 + b'A').to_ascii_uppercase())
        })
        .take(size / 6)
        .collect()
    }

    /// Writes `s` as 6-bit characters. Only ASCII letters can be represented.
    pub fn set_six_bit_string(&mut self, start: usize, s: &str) -> Result<(), FormatError> {
        for (i, c) in s.bytes().enumerate() {
            let value = c.to_ascii_uppercase().wrapping_sub(b'A');
            self.set_uint(start + i * 6, 6, u64::from(value))?;
        }
        Ok(())
    }

    fn read_bits(&self, start: usize, size: usize) -> Result<u64, FormatError> {
        self.check_range(start, size)?;

        (start..start + size).try_fold(0u64, |acc, i| {
            let bit = self.get_bit(i)?;
            Ok((acc << 1) | u64::from(bit))
        })
    }

    fn check_range(&self, start: usize, size: usize) -> Result<(), FormatError> {
        if size > 0 && start + size > self.len() {
            return Err(FormatError::OutOfBounds {
                index: start + size - 1,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn locate(&self, index: usize) -> Result<(usize, u8), FormatError> {
        if index >= self.len() {
            return Err(FormatError::OutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok((index / BITS_PER_BYTE, 0x80 >> (index % BITS_PER_BYTE)))
    }
}

impl From<Vec<u8>> for BitBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for BitBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}
