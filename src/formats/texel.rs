//! GX texel formats and pixel conversion helpers.
//!
//! Every source format is stored as a grid of fixed-size tiles ("blocks"),
//! 32 bytes each except `RGBA8` which uses 64. Texels inside a block are
//! row-major; blocks are row-major over the padded image.
//!
//! | Id | Format   | Block | bpp | Canonical         |
//! |----|----------|-------|-----|-------------------|
//! | 0  | `I4`     | 8×8   | 4   | luminance         |
//! | 1  | `I8`     | 8×4   | 8   | luminance         |
//! | 2  | `IA4`    | 8×4   | 8   | luminance + alpha |
//! | 3  | `IA8`    | 4×4   | 16  | luminance + alpha |
//! | 4  | `C4`     | 8×8   | 4   | from palette      |
//! | 5  | `C8`     | 8×4   | 8   | from palette      |
//! | 6  | `C14X2`  | 4×4   | 16  | from palette      |
//! | 7  | `RGB565` | 4×4   | 16  | RGB565            |
//! | 8  | `RGB5A3` | 4×4   | 16  | RGBA8             |
//! | 9  | `RGBA8`  | 4×4   | 32  | RGBA8             |
//! | 10 | `CMPR`   | 8×8   | 4   | BC1               |
//!
//! `CMPR` blocks are 2×2 groups of 4×4 DXT1-style sub-blocks (8 bytes each:
//! two big-endian RGB565 endpoints, then one byte of 2-bit indices per row,
//! first texel in the high bits).

/// Texel encoding of a `TXTR` resource as stored on disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GxTexelFormat {
    I4 = 0,
    I8 = 1,
    IA4 = 2,
    IA8 = 3,
    C4 = 4,
    C8 = 5,
    C14X2 = 6,
    RGB565 = 7,
    RGB5A3 = 8,
    RGBA8 = 9,
    CMPR = 10,
}

impl GxTexelFormat {
    /// Map an on-disc format id.
    pub fn from_u32(v: u32) -> Option<Self> {
        use GxTexelFormat::*;
        Some(match v {
            0 => I4,
            1 => I8,
            2 => IA4,
            3 => IA8,
            4 => C4,
            5 => C8,
            6 => C14X2,
            7 => RGB565,
            8 => RGB5A3,
            9 => RGBA8,
            10 => CMPR,
            _ => return None,
        })
    }

    /// Static descriptor for this format.
    pub fn info(self) -> &'static TexelFormatInfo {
        &TEXEL_FORMATS[self as usize]
    }

    /// Whether texels are palette indices.
    pub fn is_paletted(self) -> bool {
        matches!(self, Self::C4 | Self::C8 | Self::C14X2)
    }
}

/// Decoded (canonical) pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// One byte of luminance.
    Luminance,
    /// Luminance then alpha, one byte each.
    LuminanceAlpha,
    /// 16-bit RGB565, little-endian.
    Rgb565,
    /// R, G, B, A bytes.
    Rgba8,
    /// DXT1 blocks: little-endian endpoints, 2-bit indices lowest bits first.
    Bc1,
}

impl TexelFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            TexelFormat::Luminance => 8,
            TexelFormat::LuminanceAlpha | TexelFormat::Rgb565 => 16,
            TexelFormat::Rgba8 => 32,
            TexelFormat::Bc1 => 4,
        }
    }
}

/// Layout facts for one [`GxTexelFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelFormatInfo {
    pub source: GxTexelFormat,
    /// `None` for paletted formats, whose output follows the palette format.
    pub canonical: Option<TexelFormat>,
    pub block_width: u32,
    pub block_height: u32,
    pub bits_per_pixel: u32,
}

impl TexelFormatInfo {
    /// Bytes one source block occupies.
    pub fn block_bytes(&self) -> usize {
        (self.block_width * self.block_height * self.bits_per_pixel / 8) as usize
    }
}

const fn info(
    source: GxTexelFormat,
    canonical: Option<TexelFormat>,
    block_width: u32,
    block_height: u32,
    bits_per_pixel: u32,
) -> TexelFormatInfo {
    TexelFormatInfo {
        source,
        canonical,
        block_width,
        block_height,
        bits_per_pixel,
    }
}

/// Indexed by `GxTexelFormat as usize`.
pub static TEXEL_FORMATS: [TexelFormatInfo; 11] = {
    use GxTexelFormat as Gx;
    use TexelFormat as T;
    [
        info(Gx::I4, Some(T::Luminance), 8, 8, 4),
        info(Gx::I8, Some(T::Luminance), 8, 4, 8),
        info(Gx::IA4, Some(T::LuminanceAlpha), 8, 4, 8),
        info(Gx::IA8, Some(T::LuminanceAlpha), 4, 4, 16),
        info(Gx::C4, None, 8, 8, 4),
        info(Gx::C8, None, 8, 4, 8),
        info(Gx::C14X2, None, 4, 4, 16),
        info(Gx::RGB565, Some(T::Rgb565), 4, 4, 16),
        info(Gx::RGB5A3, Some(T::Rgba8), 4, 4, 16),
        info(Gx::RGBA8, Some(T::Rgba8), 4, 4, 32),
        info(Gx::CMPR, Some(T::Bc1), 8, 8, 4),
    ]
};

#[inline]
pub fn extend3to8(v: u8) -> u8 {
    let v = v & 0x7;
    (v << 5) | (v << 2) | (v >> 1)
}

#[inline]
pub fn extend4to8(v: u8) -> u8 {
    let v = v & 0xF;
    (v << 4) | v
}

#[inline]
pub fn extend5to8(v: u8) -> u8 {
    let v = v & 0x1F;
    (v << 3) | (v >> 2)
}

#[inline]
pub fn extend6to8(v: u8) -> u8 {
    let v = v & 0x3F;
    (v << 2) | (v >> 4)
}

/// Expand an RGB565 value to opaque RGBA8.
pub fn rgb565_to_rgba(v: u16) -> [u8; 4] {
    [
        extend5to8((v >> 11) as u8),
        extend6to8((v >> 5) as u8),
        extend5to8(v as u8),
        0xFF,
    ]
}

/// Expand an RGB5A3 value: `1RRRRRGGGGGBBBBB` (opaque) or
/// `0AAARRRRGGGGBBBB`.
pub fn rgb5a3_to_rgba(v: u16) -> [u8; 4] {
    if v & 0x8000 != 0 {
        [
            extend5to8((v >> 10) as u8),
            extend5to8((v >> 5) as u8),
            extend5to8(v as u8),
            0xFF,
        ]
    } else {
        [
            extend4to8((v >> 8) as u8),
            extend4to8((v >> 4) as u8),
            extend4to8(v as u8),
            extend3to8((v >> 12) as u8),
        ]
    }
}

/// Split an IA8 value (alpha in the high byte) into `[luminance, alpha]`.
pub fn ia8_to_la(v: u16) -> [u8; 2] {
    [v as u8, (v >> 8) as u8]
}

/// Four-entry colour table of a DXT1 block.
///
/// With `c0 > c1` the middle colours sit at 1/3 and 2/3 between the
/// endpoints; otherwise the third is their average and the fourth is
/// transparent black.
pub fn bc1_palette(c0: u16, c1: u16) -> [[u8; 4]; 4] {
    let a = rgb565_to_rgba(c0);
    let b = rgb565_to_rgba(c1);
    let mix = |wa: u16, wb: u16| -> [u8; 4] {
        let mut out = [0xFF; 4];
        for i in 0..3 {
            out[i] = ((a[i] as u16 * wa + b[i] as u16 * wb) / (wa + wb)) as u8;
        }
        out
    };

    if c0 > c1 {
        [a, b, mix(2, 1), mix(1, 2)]
    } else {
        [a, b, mix(1, 1), [0, 0, 0, 0]]
    }
}

/// Decode one GX `CMPR` sub-block (8 bytes) to 16 RGBA texels, row-major.
pub fn cmpr_block_to_rgba(block: &[u8]) -> [[u8; 4]; 16] {
    let palette = bc1_palette(
        u16::from_be_bytes([block[0], block[1]]),
        u16::from_be_bytes([block[2], block[3]]),
    );
    let mut out = [[0u8; 4]; 16];
    for (row, &bits) in block[4..8].iter().enumerate() {
        for col in 0..4 {
            let idx = (bits >> (6 - col * 2)) & 3;
            out[row * 4 + col] = palette[idx as usize];
        }
    }
    out
}

/// Decode one DXT1 block (8 bytes) to 16 RGBA texels, row-major.
pub fn bc1_block_to_rgba(block: &[u8]) -> [[u8; 4]; 16] {
    let palette = bc1_palette(
        u16::from_le_bytes([block[0], block[1]]),
        u16::from_le_bytes([block[2], block[3]]),
    );
    let mut out = [[0u8; 4]; 16];
    for (row, &bits) in block[4..8].iter().enumerate() {
        for col in 0..4 {
            let idx = (bits >> (col * 2)) & 3;
            out[row * 4 + col] = palette[idx as usize];
        }
    }
    out
}

/// Repack a GX `CMPR` sub-block as a DXT1 block: endpoints become
/// little-endian and each row's index order is reversed.
pub fn cmpr_block_to_bc1(block: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0] = block[1];
    out[1] = block[0];
    out[2] = block[3];
    out[3] = block[2];
    for i in 0..4 {
        let b = block[4 + i];
        out[4 + i] = ((b & 0x03) << 6) | ((b & 0x0C) << 2) | ((b & 0x30) >> 2) | ((b & 0xC0) >> 6);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_format_id() {
        for (i, entry) in TEXEL_FORMATS.iter().enumerate() {
            assert_eq!(entry.source as usize, i);
            assert_eq!(GxTexelFormat::from_u32(i as u32), Some(entry.source));
        }
        assert_eq!(GxTexelFormat::from_u32(11), None);
    }

    #[test]
    fn block_sizes() {
        assert_eq!(GxTexelFormat::I4.info().block_bytes(), 32);
        assert_eq!(GxTexelFormat::IA8.info().block_bytes(), 32);
        assert_eq!(GxTexelFormat::RGBA8.info().block_bytes(), 64);
        assert_eq!(GxTexelFormat::CMPR.info().block_bytes(), 32);
    }

    #[test]
    fn bit_extension() {
        assert_eq!(extend3to8(7), 0xFF);
        assert_eq!(extend3to8(3), 109);
        assert_eq!(extend4to8(0xA), 0xAA);
        assert_eq!(extend5to8(0x1F), 0xFF);
        assert_eq!(extend6to8(0x20), 0x82);
    }

    #[test]
    fn rgb5a3_both_forms() {
        assert_eq!(rgb5a3_to_rgba(0xFC00), [0xFF, 0, 0, 0xFF]);
        assert_eq!(rgb5a3_to_rgba(0x801F), [0, 0, 0xFF, 0xFF]);
        assert_eq!(rgb5a3_to_rgba(0x7F00), [0xFF, 0, 0, 0xFF]);
        assert_eq!(rgb5a3_to_rgba(0x3000), [0, 0, 0, 109]);
    }

    #[test]
    fn bc1_palette_ordering() {
        let p = bc1_palette(0xFFFF, 0x0000);
        assert_eq!(p[2], [170, 170, 170, 255]);
        assert_eq!(p[3], [85, 85, 85, 255]);

        let p = bc1_palette(0x0000, 0xFFFF);
        assert_eq!(p[2], [127, 127, 127, 255]);
        assert_eq!(p[3], [0, 0, 0, 0]);
    }

    #[test]
    fn cmpr_repack_matches_direct_decode() {
        let blocks: [[u8; 8]; 3] = [
            [0xFF, 0xFF, 0x00, 0x00, 0x1B, 0xE4, 0x00, 0xFF],
            [0x00, 0x00, 0xF8, 0x00, 0x1B, 0x4E, 0x93, 0x39],
            [0x7B, 0xEF, 0x7B, 0xEF, 0x55, 0xAA, 0xFF, 0x00],
        ];
        for gx in blocks {
            let bc1 = cmpr_block_to_bc1(&gx);
            assert_eq!(bc1_block_to_rgba(&bc1), cmpr_block_to_rgba(&gx));
        }
        assert_eq!(cmpr_block_to_bc1(&blocks[0])[4], 0xE4);
    }
}
