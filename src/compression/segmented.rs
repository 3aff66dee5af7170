//! Segmented codec used from Echoes onwards.
//!
//! ## Layout
//! ```text
//! repeated until input or output is exhausted:
//!   [0x00] Size   (i16 BE)
//!   [0x02] Data   (|Size| bytes)
//! ```
//! A negative size marks a stored segment copied verbatim. A positive size is
//! a compressed segment: zlib when it starts with a zlib header, LZO1X
//! otherwise. Each segment decodes on its own; there are no references
//! across segment boundaries.

use crate::compression::{lzo, zlib};
use crate::{Error, Result};

/// Decode segments from `data` into `out`, returning the number of bytes
/// produced.
pub fn decompress_into(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut src = 0;
    let mut dst = 0;

    while src < data.len() && dst < out.len() {
        let header = data.get(src..src + 2).ok_or(Error::UnexpectedEof)?;
        let size = i16::from_be_bytes([header[0], header[1]]);
        src += 2;

        let len = size.unsigned_abs() as usize;
        let segment = data.get(src..src + len).ok_or(Error::UnexpectedEof)?;
        src += len;

        if size < 0 {
            let dest = out
                .get_mut(dst..dst + len)
                .ok_or(Error::InvalidRange)?;
            dest.copy_from_slice(segment);
            dst += len;
        } else if zlib::has_zlib_header(segment) {
            dst += zlib::decompress_into(segment, &mut out[dst..])?;
        } else {
            dst += lzo::decompress(segment, &mut out[dst..])?;
        }
    }

    Ok(dst)
}

/// Decode a whole segmented buffer that must expand to exactly `expected`
/// bytes.
pub fn decompress(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; expected];
    let produced = decompress_into(data, &mut out)?;
    if produced != expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: produced,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;

    fn segment(size: i16, body: &[u8]) -> Vec<u8> {
        let mut v = size.to_be_bytes().to_vec();
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn stored_and_lzo_segments() {
        let lzo_body = [21, b'A', b'B', b'C', b'D', 0xEC, 0x00, 0x11, 0x00, 0x00];
        let mut data = segment(-3, b"xyz");
        data.extend(segment(lzo_body.len() as i16, &lzo_body));

        let out = decompress(&data, 15).unwrap();
        assert_eq!(&out, b"xyzABCDABCDABCD");
    }

    #[test]
    fn zlib_segment_is_detected() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&[9u8; 64]).unwrap();
        let packed = enc.finish().unwrap();

        let data = segment(packed.len() as i16, &packed);
        assert_eq!(decompress(&data, 64).unwrap(), vec![9u8; 64]);
    }

    #[test]
    fn stops_once_output_is_full() {
        // Trailing padding after the last segment is never interpreted.
        let mut data = segment(-4, b"full");
        data.extend([0xFF, 0xFF, 0xFF]);
        assert_eq!(decompress(&data, 4).unwrap(), b"full");
    }

    #[test]
    fn short_output_is_a_mismatch() {
        let data = segment(-2, b"ab");
        assert!(matches!(
            decompress(&data, 4),
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn truncated_segment() {
        let data = segment(-8, b"abc");
        assert!(matches!(decompress(&data, 8), Err(Error::UnexpectedEof)));
    }
}
