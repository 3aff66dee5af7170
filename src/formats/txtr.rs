//! TXTR - GX texture resource.
//!
//! ## Layout
//! ```text
//! [0x00] Format                        (u32, see GxTexelFormat)
//! [0x04] Width                         (u16)
//! [0x06] Height                        (u16)
//! [0x08] MipCount                      (u32)
//! C4/C8 only:
//! [0x0C] PaletteFormat                 (u32: 0 = IA8, 1 = RGB565, 2 = RGB5A3)
//! [0x10] Reserved                      (4 bytes)
//! [0x14] Palette entries               (16 or 256 × u16)
//! [...]  Mip data, largest level first, each padded to whole blocks
//! ```
//!
//! Some cooked textures end before their last mip levels are complete.
//! Decoding stops at the first incomplete level; earlier levels are kept and
//! [`Texture::truncated`] is set.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use tracing::warn;

use crate::formats::texel::{
    GxTexelFormat, TexelFormat, bc1_block_to_rgba, cmpr_block_to_bc1, cmpr_block_to_rgba,
    extend4to8, ia8_to_la, rgb5a3_to_rgba, rgb565_to_rgba,
};
use crate::utils::{be_u16, be_u32, skip};
use crate::{Error, Result};

/// What the decoder expands texels to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// The narrowest canonical format (luminance, RGB565, BC1, ...).
    #[default]
    Native,
    /// Always R, G, B, A bytes.
    Rgba8,
}

/// Knobs for [`Texture::decode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureOptions {
    pub mode: DecodeMode,
    /// Decode `C4` through the palette instead of the font layout, where each
    /// index bit drives one of R, G, B, A.
    pub c4_palette_lookup: bool,
}

/// One decoded mip level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// Pixels in the texture's canonical format. BC1 levels cover the
    /// dimensions rounded up to 4.
    pub data: Vec<u8>,
}

/// A decoded `TXTR` resource.
#[derive(Debug, Clone)]
pub struct Texture {
    pub source_format: GxTexelFormat,
    /// Format of every level in [`Texture::mips`].
    pub format: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub declared_mip_count: u32,
    pub mips: Vec<MipLevel>,
    /// The resource ended inside a mip level.
    pub truncated: bool,
}

/// Colour table of a paletted texture.
struct Palette {
    format: GxTexelFormat,
    entries: Vec<u16>,
}

impl Palette {
    fn canonical(&self) -> TexelFormat {
        match self.format {
            GxTexelFormat::IA8 => TexelFormat::LuminanceAlpha,
            GxTexelFormat::RGB565 => TexelFormat::Rgb565,
            _ => TexelFormat::Rgba8,
        }
    }

    fn push(&self, index: u8, mode: DecodeMode, out: &mut Vec<u8>) -> Result<()> {
        let v = *self
            .entries
            .get(index as usize)
            .ok_or(Error::InvalidRange)?;
        match (mode, self.format) {
            (DecodeMode::Native, GxTexelFormat::IA8) => out.extend(ia8_to_la(v)),
            (DecodeMode::Native, GxTexelFormat::RGB565) => out.extend(v.to_le_bytes()),
            (DecodeMode::Rgba8, GxTexelFormat::IA8) => {
                let [l, a] = ia8_to_la(v);
                out.extend([l, l, l, a]);
            }
            (DecodeMode::Rgba8, GxTexelFormat::RGB565) => out.extend(rgb565_to_rgba(v)),
            _ => out.extend(rgb5a3_to_rgba(v)),
        }
        Ok(())
    }
}

struct DecodeContext<'a> {
    mode: DecodeMode,
    palette: Option<&'a Palette>,
    c4_palette_lookup: bool,
}

impl DecodeContext<'_> {
    fn palette(&self) -> Result<&Palette> {
        self.palette.ok_or(Error::Parse("paletted texture without palette"))
    }

    fn push_intensity(&self, l: u8, out: &mut Vec<u8>) {
        match self.mode {
            DecodeMode::Native => out.push(l),
            DecodeMode::Rgba8 => out.extend([l, l, l, l]),
        }
    }

    fn push_la(&self, l: u8, a: u8, out: &mut Vec<u8>) {
        match self.mode {
            DecodeMode::Native => out.extend([l, a]),
            DecodeMode::Rgba8 => out.extend([l, l, l, a]),
        }
    }
}

/// Decodes one source block, appending its output units in row-major order.
type BlockDecoder = fn(&DecodeContext<'_>, &[u8], &mut Vec<u8>) -> Result<()>;

/// Indexed by `GxTexelFormat as usize`; `None` for formats that cannot be
/// decoded.
static BLOCK_DECODERS: [Option<BlockDecoder>; 11] = [
    Some(decode_i4),
    Some(decode_i8),
    Some(decode_ia4),
    Some(decode_ia8),
    Some(decode_c4),
    Some(decode_c8),
    None,
    Some(decode_rgb565),
    Some(decode_rgb5a3),
    Some(decode_rgba8),
    Some(decode_cmpr),
];

fn decode_i4(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for &b in src {
        ctx.push_intensity(extend4to8(b >> 4), out);
        ctx.push_intensity(extend4to8(b), out);
    }
    Ok(())
}

fn decode_i8(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for &l in src {
        ctx.push_intensity(l, out);
    }
    Ok(())
}

fn decode_ia4(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for &b in src {
        ctx.push_la(extend4to8(b), extend4to8(b >> 4), out);
    }
    Ok(())
}

fn decode_ia8(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for px in src.chunks_exact(2) {
        let [l, a] = ia8_to_la(u16::from_be_bytes([px[0], px[1]]));
        ctx.push_la(l, a, out);
    }
    Ok(())
}

fn decode_c4(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for &b in src {
        for index in [b >> 4, b & 0xF] {
            if ctx.c4_palette_lookup {
                ctx.palette()?.push(index, ctx.mode, out)?;
            } else {
                // Font textures: one channel per index bit.
                let bit = |n: u8| if index & (1 << n) != 0 { 0xFF } else { 0 };
                out.extend([bit(3), bit(2), bit(1), bit(0)]);
            }
        }
    }
    Ok(())
}

fn decode_c8(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let palette = ctx.palette()?;
    for &index in src {
        palette.push(index, ctx.mode, out)?;
    }
    Ok(())
}

fn decode_rgb565(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for px in src.chunks_exact(2) {
        let v = u16::from_be_bytes([px[0], px[1]]);
        match ctx.mode {
            DecodeMode::Native => out.extend(v.to_le_bytes()),
            DecodeMode::Rgba8 => out.extend(rgb565_to_rgba(v)),
        }
    }
    Ok(())
}

fn decode_rgb5a3(_: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for px in src.chunks_exact(2) {
        out.extend(rgb5a3_to_rgba(u16::from_be_bytes([px[0], px[1]])));
    }
    Ok(())
}

/// 4×4 block: 16 AR pairs, then 16 GB pairs.
fn decode_rgba8(_: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let (ar, gb) = src.split_at(32);
    for (ar, gb) in ar.chunks_exact(2).zip(gb.chunks_exact(2)) {
        out.extend([ar[1], gb[0], gb[1], ar[0]]);
    }
    Ok(())
}

/// Native mode treats each 4×4 sub-block as one output unit; full mode
/// expands the whole 8×8 block.
fn decode_cmpr(ctx: &DecodeContext<'_>, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
    match ctx.mode {
        DecodeMode::Native => {
            for sub in src.chunks_exact(8) {
                out.extend(cmpr_block_to_bc1(sub));
            }
        }
        DecodeMode::Rgba8 => {
            let mut texels = [[0u8; 4]; 64];
            for (s, sub) in src.chunks_exact(8).enumerate() {
                let (sx, sy) = ((s % 2) * 4, (s / 2) * 4);
                for (i, texel) in cmpr_block_to_rgba(sub).into_iter().enumerate() {
                    texels[(sy + i / 4) * 8 + sx + i % 4] = texel;
                }
            }
            out.extend(texels.into_iter().flatten());
        }
    }
    Ok(())
}

/// How one mip level maps onto source blocks and output units.
struct Grid {
    /// Output units across and down the level.
    units_x: usize,
    units_y: usize,
    /// Units per source block.
    block_units_x: usize,
    block_units_y: usize,
    unit_bytes: usize,
}

impl Grid {
    fn new(format: GxTexelFormat, output: TexelFormat, width: u32, height: u32) -> Self {
        let info = format.info();
        if output == TexelFormat::Bc1 {
            Grid {
                units_x: width.div_ceil(4) as usize,
                units_y: height.div_ceil(4) as usize,
                block_units_x: (info.block_width / 4) as usize,
                block_units_y: (info.block_height / 4) as usize,
                unit_bytes: 8,
            }
        } else {
            Grid {
                units_x: width as usize,
                units_y: height as usize,
                block_units_x: info.block_width as usize,
                block_units_y: info.block_height as usize,
                unit_bytes: (output.bits_per_pixel() / 8) as usize,
            }
        }
    }

    fn blocks(&self) -> (usize, usize) {
        (
            self.units_x.div_ceil(self.block_units_x),
            self.units_y.div_ceil(self.block_units_y),
        )
    }
}

impl Texture {
    /// Decode a `TXTR` resource.
    pub fn decode(data: &[u8], options: TextureOptions) -> Result<Self> {
        let mut c = Cursor::new(data);
        let format_id = be_u32(&mut c)?;
        let format =
            GxTexelFormat::from_u32(format_id).ok_or(Error::Unsupported("unknown texel format"))?;
        let width = be_u16(&mut c)? as u32;
        let height = be_u16(&mut c)? as u32;
        let declared_mip_count = be_u32(&mut c)?;

        let decoder = BLOCK_DECODERS[format as usize].ok_or(Error::Unsupported("C14X2 textures"))?;

        let palette = if format.is_paletted() {
            Some(read_palette(&mut c, format)?)
        } else {
            None
        };

        let output = match options.mode {
            DecodeMode::Rgba8 => TexelFormat::Rgba8,
            DecodeMode::Native => match (format.info().canonical, &palette) {
                (Some(canonical), _) => canonical,
                (None, Some(_)) if format == GxTexelFormat::C4 && !options.c4_palette_lookup => {
                    TexelFormat::Rgba8
                }
                (None, Some(p)) => p.canonical(),
                (None, None) => return Err(Error::Parse("paletted texture without palette")),
            },
        };

        let ctx = DecodeContext {
            mode: options.mode,
            palette: palette.as_ref(),
            c4_palette_lookup: options.c4_palette_lookup,
        };

        let block_bytes = format.info().block_bytes();
        let mut src = &data[c.position() as usize..];
        let mut mips = Vec::with_capacity(declared_mip_count.min(16) as usize);
        let mut truncated = false;
        let (mut mip_w, mut mip_h) = (width.max(1), height.max(1));
        let mut scratch = Vec::new();

        for level in 0..declared_mip_count {
            let grid = Grid::new(format, output, mip_w, mip_h);
            let (blocks_x, blocks_y) = grid.blocks();
            let needed = blocks_x * blocks_y * block_bytes;
            if src.len() < needed {
                warn!(
                    level,
                    needed,
                    available = src.len(),
                    "texture data ends inside a mip level"
                );
                truncated = true;
                break;
            }

            let mut pixels = vec![0u8; grid.units_x * grid.units_y * grid.unit_bytes];
            for (b, block) in src[..needed].chunks_exact(block_bytes).enumerate() {
                scratch.clear();
                decoder(&ctx, block, &mut scratch)?;

                let (bx, by) = (b % blocks_x, b / blocks_x);
                for (i, unit) in scratch.chunks_exact(grid.unit_bytes).enumerate() {
                    let x = bx * grid.block_units_x + i % grid.block_units_x;
                    let y = by * grid.block_units_y + i / grid.block_units_x;
                    // Padding texels outside the level are dropped.
                    if x < grid.units_x && y < grid.units_y {
                        let at = (y * grid.units_x + x) * grid.unit_bytes;
                        pixels[at..at + grid.unit_bytes].copy_from_slice(unit);
                    }
                }
            }
            src = &src[needed..];

            mips.push(MipLevel {
                width: mip_w,
                height: mip_h,
                data: pixels,
            });
            mip_w = (mip_w / 2).max(1);
            mip_h = (mip_h / 2).max(1);
        }

        Ok(Texture {
            source_format: format,
            format: output,
            width,
            height,
            declared_mip_count,
            mips,
            truncated,
        })
    }

    /// Convert every level to R, G, B, A bytes.
    pub fn to_rgba8(&self) -> Texture {
        let mips = self
            .mips
            .iter()
            .map(|mip| MipLevel {
                width: mip.width,
                height: mip.height,
                data: level_to_rgba8(self.format, mip),
            })
            .collect();
        Texture {
            format: TexelFormat::Rgba8,
            mips,
            ..self.clone()
        }
    }

    /// Mip level `level` as an 8-bit RGBA image.
    pub fn level_image(&self, level: usize) -> Option<RgbaImage> {
        let mip = self.mips.get(level)?;
        RgbaImage::from_raw(mip.width, mip.height, level_to_rgba8(self.format, mip))
    }

    /// Write the largest mip level to `path` as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = self
            .level_image(0)
            .ok_or(Error::Parse("texture has no complete mip level"))?;
        image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

fn read_palette(c: &mut Cursor<&[u8]>, format: GxTexelFormat) -> Result<Palette> {
    let palette_format = match be_u32(c)? {
        0 => GxTexelFormat::IA8,
        1 => GxTexelFormat::RGB565,
        2 => GxTexelFormat::RGB5A3,
        _ => return Err(Error::Unsupported("palette format")),
    };
    skip(c, 4)?;

    let count = if format == GxTexelFormat::C4 { 16 } else { 256 };
    let entries = (0..count).map(|_| be_u16(c)).collect::<Result<Vec<_>>>()?;
    Ok(Palette {
        format: palette_format,
        entries,
    })
}

fn level_to_rgba8(format: TexelFormat, mip: &MipLevel) -> Vec<u8> {
    match format {
        TexelFormat::Rgba8 => mip.data.clone(),
        TexelFormat::Luminance => mip.data.iter().flat_map(|&l| [l, l, l, l]).collect(),
        TexelFormat::LuminanceAlpha => mip
            .data
            .chunks_exact(2)
            .flat_map(|la| [la[0], la[0], la[0], la[1]])
            .collect(),
        TexelFormat::Rgb565 => mip
            .data
            .chunks_exact(2)
            .flat_map(|px| rgb565_to_rgba(u16::from_le_bytes([px[0], px[1]])))
            .collect(),
        TexelFormat::Bc1 => {
            let (w, h) = (mip.width as usize, mip.height as usize);
            let blocks_x = w.div_ceil(4);
            let mut out = vec![0u8; w * h * 4];
            for (b, block) in mip.data.chunks_exact(8).enumerate() {
                let (bx, by) = ((b % blocks_x) * 4, (b / blocks_x) * 4);
                for (i, texel) in bc1_block_to_rgba(block).into_iter().enumerate() {
                    let (x, y) = (bx + i % 4, by + i / 4);
                    if x < w && y < h {
                        let at = (y * w + x) * 4;
                        out[at..at + 4].copy_from_slice(&texel);
                    }
                }
            }
            out
        }
    }
}
