//! `CMPD` block framing for compressed resources (Corruption onwards).
//!
//! ## Layout
//! ```text
//! [0x00] Magic "CMPD"                                  (4 bytes)
//! [0x04] BlockCount                                    (u32 BE)
//! [0x08] Block descriptors (BlockCount × 8 bytes)
//!        [0x00] Flags (u8) + CompressedSize (u24 BE)
//!        [0x04] UncompressedSize                      (u32 BE)
//! [...]  Block payloads, back to back, in descriptor order
//! ```
//! A block whose compressed size equals its uncompressed size is stored raw.

use std::io::Read;

use crate::compression::Codec;
use crate::utils::{be_u32, bytesv, magic};
use crate::{Error, Result};

/// Descriptor for one block of a `CMPD` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlock {
    /// Bytes this block occupies in the stream.
    pub compressed_size: u32,
    /// Bytes this block expands to.
    pub uncompressed_size: u32,
}

impl CompressedBlock {
    /// Whether the block is stored without compression.
    pub fn is_raw(&self) -> bool {
        self.compressed_size == self.uncompressed_size
    }
}

/// Parsed `CMPD` header.
#[derive(Debug, Clone)]
pub struct CmpdHeader {
    pub blocks: Vec<CompressedBlock>,
}

impl CmpdHeader {
    /// Parse a `CMPD` header; `r` must be positioned at the magic.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        magic(r, b"CMPD")?;
        let block_count = be_u32(r)?;
        let mut blocks = Vec::with_capacity(block_count.min(0x1000) as usize);
        for _ in 0..block_count {
            // Top byte carries flags the decoder doesn't need.
            let compressed_size = be_u32(r)? & 0x00FF_FFFF;
            let uncompressed_size = be_u32(r)?;
            blocks.push(CompressedBlock {
                compressed_size,
                uncompressed_size,
            });
        }
        Ok(Self { blocks })
    }

    /// Sum of all blocks' uncompressed sizes.
    pub fn total_uncompressed(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.uncompressed_size as usize)
            .sum()
    }
}

/// Decode the block payloads following `header` from `r` into one buffer.
///
/// Block order in the output matches block order in the stream.
pub fn decompress_blocks<R: Read>(r: &mut R, header: &CmpdHeader, codec: Codec) -> Result<Vec<u8>> {
    let mut out = vec![0u8; header.total_uncompressed()];
    let mut offset = 0;

    for block in &header.blocks {
        let len = block.uncompressed_size as usize;
        let dest = out
            .get_mut(offset..offset + len)
            .ok_or(Error::InvalidRange)?;

        if block.is_raw() {
            r.read_exact(dest)?;
        } else {
            let packed = bytesv(r, block.compressed_size as usize)?;
            codec.decompress_into(&packed, dest)?;
        }
        offset += len;
    }

    Ok(out)
}

/// Parse a `CMPD` header from `r` and decode its blocks.
pub fn decompress<R: Read>(r: &mut R, codec: Codec) -> Result<Vec<u8>> {
    let header = CmpdHeader::parse(r)?;
    decompress_blocks(r, &header, codec)
}
