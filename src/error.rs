//! Library-wide error and result types.

use std::io;

use thiserror::Error;

use crate::types::AssetId;

/// Result alias used throughout retrokit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context (which pak, which resource) should wrap `Error` in their own type
/// or attach it to a log span.
#[derive(Debug, Error)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    #[error("bad magic value")]
    BadMagic,
    /// A version or type tag is present in the data but not supported by
    /// this parser.
    #[error("unsupported version: {0:#x}")]
    UnsupportedVersion(u32),
    /// The stream ended before all expected bytes could be read.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// A null-terminated string had no null terminator within the buffer.
    #[error("unterminated string")]
    UnterminatedName,
    /// An offset, size or index field points outside the valid region.
    #[error("invalid offset or size")]
    InvalidRange,
    /// A structural constraint was violated (message describes which one).
    #[error("parse error: {0}")]
    Parse(&'static str),
    /// A recognised feature that this library does not decode.
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),
    /// zlib inflation failed.
    #[error("zlib decompression failed")]
    Zlib,
    /// LZO1X decompression failed.
    #[error("lzo decompression failed: {0}")]
    Lzo(&'static str),
    /// A decompressor produced a different byte count than declared.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    /// A resource id is not present in the resource index.
    #[error("resource {0} not found")]
    ResourceNotFound(AssetId),
    /// Encoding or writing an exported image failed.
    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        // Short reads surface as a format error, not an I/O failure.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::Io(e)
        }
    }
}

impl Error {
    /// Whether this error means the input data itself is malformed, as
    /// opposed to an environment problem such as a missing file.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Image(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_maps_to_eof() {
        let e: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "short").into();
        assert!(matches!(e, Error::UnexpectedEof));
        assert!(e.is_format_error());
    }

    #[test]
    fn other_io_errors_are_kept() {
        let e: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, Error::Io(_)));
        assert!(!e.is_format_error());
    }

    #[test]
    fn display_includes_sizes() {
        let e = Error::SizeMismatch {
            expected: 30,
            actual: 12,
        };
        let msg = e.to_string();
        assert!(msg.contains("30"));
        assert!(msg.contains("12"));
    }
}
