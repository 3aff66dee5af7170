//! Resource payload decompression.
//!
//! ## Submodules
//!
//! | Module        | Algorithm | Used by |
//! |---------------|-----------|---------|
//! | [`zlib`]      | zlib/deflate | Prime, Echoes demo, Returns |
//! | [`segmented`] | size-prefixed zlib/LZO1X segments | Echoes, Corruption |
//! | [`lzo`]       | LZO1X | segments inside [`segmented`] |
//! | [`cmpd`]      | `CMPD` block list | Corruption, Returns |
//!
//! ## Choosing the right function
//!
//! * **Whole-buffer payloads** (Legacy packages) carry a `u32` uncompressed
//!   size followed by one compressed stream; use [`Codec::decompress`].
//! * **Block payloads** (Modern packages) start with `CMPD`; use
//!   [`cmpd::decompress`], which calls the codec once per block.
//! * [`read_payload`] picks the right path from a [`ResourceRecord`] and the
//!   [`Game`].

pub mod cmpd;
pub mod lzo;
pub mod segmented;
pub mod zlib;

use std::io::{Read, Seek, SeekFrom};

use crate::formats::pak::ResourceRecord;
use crate::game::Game;
use crate::utils::{be_u32, bytesv};
use crate::{Error, Result};

/// The two compression schemes found in cooked resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Plain zlib streams.
    Zlib,
    /// Size-prefixed segments of zlib or LZO1X data.
    Segmented,
}

impl Codec {
    /// Codec used for compressed resources of `game`.
    pub fn for_game(game: Game) -> Self {
        if game.uses_zlib() {
            Codec::Zlib
        } else {
            Codec::Segmented
        }
    }

    /// Decompress `data`, which must expand to exactly `expected` bytes.
    pub fn decompress(self, data: &[u8], expected: usize) -> Result<Vec<u8>> {
        match self {
            Codec::Zlib => zlib::decompress(data, expected),
            Codec::Segmented => segmented::decompress(data, expected),
        }
    }

    /// Decompress `data` so that it fills `out` exactly.
    pub fn decompress_into(self, data: &[u8], out: &mut [u8]) -> Result<()> {
        let produced = match self {
            Codec::Zlib => zlib::decompress_into(data, out)?,
            Codec::Segmented => segmented::decompress_into(data, out)?,
        };
        if produced != out.len() {
            return Err(Error::SizeMismatch {
                expected: out.len(),
                actual: produced,
            });
        }
        Ok(())
    }
}

/// Read and, if needed, decompress the bytes of one resource.
///
/// `r` is the package file the record came from.
pub fn read_payload<R: Read + Seek>(r: &mut R, record: &ResourceRecord, game: Game) -> Result<Vec<u8>> {
    r.seek(SeekFrom::Start(record.offset))?;

    if !record.compressed {
        return bytesv(r, record.size as usize);
    }

    let codec = Codec::for_game(game);
    if game.uses_block_compression() {
        return cmpd::decompress(&mut r.by_ref().take(record.size as u64), codec);
    }

    // The size field counts the 4-byte uncompressed-size prefix.
    let uncompressed_size = be_u32(r)? as usize;
    let packed = bytesv(r, (record.size as usize).saturating_sub(4))?;
    codec.decompress(&packed, uncompressed_size)
}
