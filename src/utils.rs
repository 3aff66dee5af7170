//! Low-level I/O primitives shared by all parsers.
//!
//! Every cooked format in this family is big-endian. Each function reads
//! exactly the bytes it promises or returns an error - there is no
//! partial-read ambiguity.

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Read one byte.
#[inline]
pub(crate) fn u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

/// Read a big-endian `u16`.
#[inline]
pub(crate) fn be_u16<R: Read>(r: &mut R) -> Result<u16> {
    Ok(u16::from_be_bytes(bytesa(r)?))
}

/// Read a big-endian `i16`.
#[inline]
pub(crate) fn be_i16<R: Read>(r: &mut R) -> Result<i16> {
    Ok(i16::from_be_bytes(bytesa(r)?))
}

/// Read a big-endian `u32`.
#[inline]
pub(crate) fn be_u32<R: Read>(r: &mut R) -> Result<u32> {
    Ok(u32::from_be_bytes(bytesa(r)?))
}

/// Read a big-endian `u64`.
#[inline]
pub(crate) fn be_u64<R: Read>(r: &mut R) -> Result<u64> {
    Ok(u64::from_be_bytes(bytesa(r)?))
}

/// Read a big-endian IEEE-754 `f32`.
#[inline]
pub(crate) fn be_f32<R: Read>(r: &mut R) -> Result<f32> {
    Ok(f32::from_be_bytes(bytesa(r)?))
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Read exactly `len` bytes into a `Vec`.
#[inline]
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Verify that the next `N` bytes in the stream match `expected`.
///
/// Returns [`Error::BadMagic`] on mismatch.
#[inline]
pub(crate) fn magic<R: Read, const N: usize>(r: &mut R, expected: &[u8; N]) -> Result<()> {
    let got = bytesa::<N>(r)?;
    if &got != expected {
        return Err(Error::BadMagic);
    }
    Ok(())
}

/// Read a string of exactly `len` bytes, dropping anything from the first
/// null onwards.
pub(crate) fn fixed_string<R: Read>(r: &mut R, len: usize) -> Result<String> {
    let bytes = bytesv(r, len)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Read a null-terminated string byte-by-byte from a reader.
///
/// Hitting end of stream before the terminator is
/// [`Error::UnterminatedName`].
pub(crate) fn read_null_string<R: Read>(r: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = match u8(r) {
            Ok(b) => b,
            Err(Error::UnexpectedEof) => return Err(Error::UnterminatedName),
            Err(e) => return Err(e),
        };
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Skip `n` bytes forward.
#[inline]
pub(crate) fn skip<S: Seek>(s: &mut S, n: i64) -> Result<()> {
    s.seek(SeekFrom::Current(n))?;
    Ok(())
}

/// Seek forward to the next multiple of `boundary` (no-op when aligned).
pub(crate) fn align<S: Seek>(s: &mut S, boundary: u64) -> Result<u64> {
    let pos = s.stream_position()?;
    let aligned = pos.div_ceil(boundary) * boundary;
    if aligned != pos {
        s.seek(SeekFrom::Start(aligned))?;
    }
    Ok(aligned)
}

/// Total length of a seekable stream, restoring the current position.
pub(crate) fn stream_len<S: Seek>(s: &mut S) -> Result<u64> {
    let pos = s.stream_position()?;
    let len = s.seek(SeekFrom::End(0))?;
    if pos != len {
        s.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn big_endian_reads() {
        let mut c = Cursor::new([0x00, 0x03, 0x00, 0x05, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(be_u32(&mut c).unwrap(), 0x0003_0005);
        assert_eq!(be_i16(&mut c).unwrap(), -2);
        assert_eq!(be_f32(&mut c).unwrap(), 1.0);
        assert!(matches!(u8(&mut c), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn strings() {
        let mut c = Cursor::new(b"Foo\0\0Bar\0rest".to_vec());
        assert_eq!(fixed_string(&mut c, 5).unwrap(), "Foo");
        assert_eq!(read_null_string(&mut c).unwrap(), "Bar");
        assert!(matches!(
            read_null_string(&mut c),
            Err(Error::UnterminatedName)
        ));
    }

    #[test]
    fn align_to_boundary() {
        let mut c = Cursor::new(vec![0u8; 200]);
        c.set_position(65);
        assert_eq!(align(&mut c, 64).unwrap(), 128);
        assert_eq!(align(&mut c, 64).unwrap(), 128);
        assert_eq!(stream_len(&mut c).unwrap(), 200);
        assert_eq!(c.position(), 128);
    }
}
