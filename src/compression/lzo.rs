//! LZO1X decompression.
//!
//! The segmented codec stores most of its compressed segments as raw LZO1X
//! streams (no header, no checksum). This is a bounds-checked decoder for
//! that bitstream; there is no matching compressor.
//!
//! ## Instruction summary
//! ```text
//! first byte > 17        literal run of (byte - 17)
//! 0000LLLL  (state 0)    literal run, L=0 extends with zero bytes
//! 0000DDSS  (state 1-3)  2-byte match, distance 1 + (D | next << 2)
//! 0000DDSS  (state 4)    3-byte match, distance 0x801 + (D | next << 2)
//! 0001HLLL  DDDDDDSS ..  match, distance 0x4000 + (H << 14) + D; D=0,H=0 ends
//! 001LLLLL  DDDDDDSS ..  match, distance 1 + D (14 bits)
//! LLLDDDSS  DDDDDDDD     match of 3..8 bytes, distance 1 + D (11 bits)
//! ```
//! `SS` is the count of literals (0-3) copied right after the match.

use crate::{Error, Result};

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(Error::Lzo("input overrun"))?;
        self.pos += 1;
        Ok(b)
    }

    fn le16(&mut self) -> Result<usize> {
        let lo = self.byte()? as usize;
        let hi = self.byte()? as usize;
        Ok(lo | (hi << 8))
    }

    /// Length extension: a run of zero bytes each worth 255, then a final
    /// non-zero byte added to `base`.
    fn extended(&mut self, base: usize) -> Result<usize> {
        let mut len = base;
        loop {
            let b = self.byte()?;
            if b != 0 {
                return Ok(len + b as usize);
            }
            len += 255;
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Lzo("input overrun"))?;
        let s = self
            .data
            .get(self.pos..end)
            .ok_or(Error::Lzo("input overrun"))?;
        self.pos = end;
        Ok(s)
    }
}

struct Output<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Output<'_> {
    fn literal(&mut self, src: &[u8]) -> Result<()> {
        let end = self.pos + src.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(Error::Lzo("output overrun"))?;
        dst.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    /// Copy `len` bytes starting `dist` bytes back; ranges may overlap.
    fn back_reference(&mut self, dist: usize, len: usize) -> Result<()> {
        if dist == 0 || dist > self.pos {
            return Err(Error::Lzo("lookbehind overrun"));
        }
        if self.pos + len > self.buf.len() {
            return Err(Error::Lzo("output overrun"));
        }
        let start = self.pos - dist;
        for i in 0..len {
            self.buf[self.pos + i] = self.buf[start + i];
        }
        self.pos += len;
        Ok(())
    }
}

/// Decompress an LZO1X stream into `out`, returning the number of bytes
/// produced. The stream must end with the `11 00 00` terminator.
pub fn decompress(data: &[u8], out: &mut [u8]) -> Result<usize> {
    if data.len() < 3 {
        return Err(Error::Lzo("input too short"));
    }

    let mut ip = Input { data, pos: 0 };
    let mut op = Output { buf: out, pos: 0 };

    // Number of literals that followed the previous instruction; 4 means a
    // long literal run.
    let mut state: usize = 0;

    if data[0] > 17 {
        ip.pos = 1;
        let t = (data[0] - 17) as usize;
        op.literal(ip.take(t)?)?;
        state = if t < 4 { t } else { 4 };
    }

    loop {
        let t = ip.byte()? as usize;
        let (dist, len, trailing);

        if t < 16 {
            if state == 0 {
                let run = (if t == 0 { ip.extended(15)? } else { t }) + 3;
                op.literal(ip.take(run)?)?;
                state = 4;
                continue;
            }
            let d = (t >> 2) | ((ip.byte()? as usize) << 2);
            trailing = t & 3;
            if state == 4 {
                dist = d + 1 + 0x800;
                len = 3;
            } else {
                dist = d + 1;
                len = 2;
            }
        } else if t >= 64 {
            dist = ((t >> 2) & 7) + ((ip.byte()? as usize) << 3) + 1;
            len = (t >> 5) + 1;
            trailing = t & 3;
        } else if t >= 32 {
            len = (if t & 31 == 0 { ip.extended(31)? } else { t & 31 }) + 2;
            let next = ip.le16()?;
            dist = (next >> 2) + 1;
            trailing = next & 3;
        } else {
            let high = (t & 8) << 11;
            len = (if t & 7 == 0 { ip.extended(7)? } else { t & 7 }) + 2;
            let next = ip.le16()?;
            let d = high + (next >> 2);
            if d == 0 {
                // End of stream marker.
                if ip.pos != data.len() {
                    return Err(Error::Lzo("trailing data after end marker"));
                }
                return Ok(op.pos);
            }
            dist = d + 0x4000;
            trailing = next & 3;
        }

        op.back_reference(dist, len)?;
        op.literal(ip.take(trailing)?)?;
        state = trailing;
    }
}
