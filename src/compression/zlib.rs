//! zlib (deflate with a zlib header), the older titles' resource codec.
//!
//! The declared uncompressed size is authoritative: decompressed bytes are
//! reinterpreted as typed records downstream, so a stream that inflates to
//! any other length is rejected.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{Error, Result};

/// Whether `data` starts with one of the zlib headers the producer emits.
pub fn has_zlib_header(data: &[u8]) -> bool {
    matches!(data, [0x78, 0x01 | 0x5E | 0x9C | 0xDA, ..])
}

/// Inflate `data`, which must produce exactly `expected` bytes.
pub fn decompress(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    // One extra byte is enough to detect an oversized stream.
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|_| Error::Zlib)?;
    if out.len() != expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Inflate `data` into `out`, returning how many bytes were written.
///
/// Used by the segmented codec, where a zlib segment fills part of a larger
/// buffer and its own length is only known after decoding.
pub fn decompress_into(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut decoder = ZlibDecoder::new(data);
    let mut written = 0;
    while written < out.len() {
        match decoder.read(&mut out[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(_) => return Err(Error::Zlib),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn roundtrip_exact_size() {
        let original = b"cooked resource payload ".repeat(40);
        let packed = compress(&original);
        assert!(has_zlib_header(&packed));
        assert_eq!(decompress(&packed, original.len()).unwrap(), original);
    }

    #[test]
    fn declared_size_must_match() {
        let original = vec![7u8; 100];
        let packed = compress(&original);
        assert!(matches!(
            decompress(&packed, 120),
            Err(Error::SizeMismatch {
                expected: 120,
                actual: 100
            })
        ));
        assert!(matches!(
            decompress(&packed, 50),
            Err(Error::SizeMismatch { expected: 50, .. })
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            decompress(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF], 10),
            Err(Error::Zlib)
        ));
        assert!(!has_zlib_header(b"LZO"));
    }

    #[test]
    fn into_partial_slice() {
        let original = b"0123456789".to_vec();
        let packed = compress(&original);
        let mut out = [0u8; 16];
        assert_eq!(decompress_into(&packed, &mut out).unwrap(), 10);
        assert_eq!(&out[..10], &original[..]);
    }
}
