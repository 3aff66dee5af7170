//! Sequential bit reader.
//!
//! Bits are consumed most-significant-first within each byte; the byte cursor
//! only moves on once all eight bits of the current byte are used. There is
//! no seeking backwards inside a partially consumed byte.

use crate::{Error, Result};

/// MSB-first bit cursor over a borrowed byte slice.
pub struct BitReader<'a> {
    bytes: &'a [u8],
    idx: usize,
    bidx: u32,
}

impl<'a> BitReader<'a> {
    /// Start at the first bit of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            idx: 0,
            bidx: 0,
        }
    }

    /// Read one bit; [`Error::UnexpectedEof`] past the last byte.
    pub fn read_bit(&mut self) -> Result<bool> {
        let b = *self.bytes.get(self.idx).ok_or(Error::UnexpectedEof)?;
        let ret = (b >> (7 - self.bidx)) & 0b1;

        self.bidx += 1;
        if self.bidx > 7 {
            self.bidx = 0;
            self.idx += 1;
        }

        Ok(ret == 1)
    }

    /// Read `count` bits (at most 32) as an unsigned value, first bit in the
    /// most significant position.
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        if count > 32 {
            return Err(Error::Parse("bit field wider than 32 bits"));
        }
        if self.bits_remaining() < count as usize {
            return Err(Error::UnexpectedEof);
        }

        let mut ret: u32 = 0;
        for _ in 0..count {
            ret = (ret << 1) | self.read_bit()? as u32;
        }
        Ok(ret)
    }

    /// Read a `count`-bit two's complement field, sign-extended to `i32`.
    pub fn read_signed(&mut self, count: u32) -> Result<i32> {
        let raw = self.read_bits(count)?;
        if count == 0 || count == 32 {
            return Ok(raw as i32);
        }
        let shift = 32 - count;
        Ok(((raw << shift) as i32) >> shift)
    }

    pub fn bits_remaining(&self) -> usize {
        (self.bytes.len().saturating_sub(self.idx)) * 8 - self.bidx as usize
    }

    /// Bytes touched so far; a partially consumed byte counts as used.
    pub fn bytes_consumed(&self) -> usize {
        self.idx + usize::from(self.bidx != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first_within_byte() {
        let data = [0b1010_0000];
        let mut bits = BitReader::new(&data);
        assert!(bits.read_bit().unwrap());
        assert!(!bits.read_bit().unwrap());
        assert!(bits.read_bit().unwrap());
        assert_eq!(bits.bytes_consumed(), 1);
    }

    #[test]
    fn fields_cross_byte_boundaries() {
        let data = [0xAB, 0xCD, 0xEF];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(4).unwrap(), 0xA);
        assert_eq!(bits.read_bits(12).unwrap(), 0xBCD);
        assert_eq!(bits.read_bits(0).unwrap(), 0);
        assert_eq!(bits.read_bits(8).unwrap(), 0xEF);
        assert_eq!(bits.bytes_consumed(), 3);
        assert!(matches!(bits.read_bit(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn full_width_read() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(32).unwrap(), 0xDEAD_BEEF);
        assert!(bits.read_bits(33).is_err());
    }

    #[test]
    fn signed_fields() {
        // 111 -> -1, 011 -> 3, 10 -> -2
        let data = [0b1110_1110];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_signed(3).unwrap(), -1);
        assert_eq!(bits.read_signed(3).unwrap(), 3);
        assert_eq!(bits.read_signed(2).unwrap(), -2);
    }

    #[test]
    fn overrun_does_not_consume() {
        let data = [0xFF];
        let mut bits = BitReader::new(&data);
        bits.read_bits(5).unwrap();
        assert!(matches!(bits.read_bits(4), Err(Error::UnexpectedEof)));
        assert_eq!(bits.bits_remaining(), 3);
    }
}
