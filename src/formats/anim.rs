//! ANIM - skeletal animation resource.
//!
//! Every animation addresses a fixed namespace of [`MAX_BONES`] bones. Each
//! bone may own a rotation, a translation and (Echoes onwards) a scale
//! channel; each channel holds one value per key.
//!
//! ## Header
//! ```text
//! [0x00] CompressionType               (u32: 0 = uncompressed, 2 = compressed)
//! ```
//!
//! ## Uncompressed body
//! ```text
//! Duration (f32), skip 4, TickInterval (f32), skip 4
//! KeyCount (u32), skip 4
//! BoneIndexCount (u32, 100) + one u8 channel index per bone (0xFF = none)
//! Echoes: RotationIndexCount (u32) + u8 indices
//! TranslationIndexCount (u32) + u8 indices
//! Echoes: ScaleIndexCount (u32) + u8 indices
//! Echoes: u32 + ScaleChannels × KeyCount × vec3
//! u32 + RotationChannels × KeyCount × quat (W, X, Y, Z)
//! u32 + TranslationChannels × KeyCount × vec3
//! Prime (not the demo): EventData id (u32)
//! ```
//! Nothing in the body states which generation wrote it. When the caller
//! doesn't know, the Echoes layout is tried first and accepted only if its
//! array sizes end exactly at the end of the resource.
//!
//! ## Compressed body
//! ```text
//! skip 4 (allocation size)
//! Prime: EventData id (u32)     <- Echoes starts with 0x0101 here
//! skip 4 (Prime) / 2 (Echoes)
//! Duration (f32), TickInterval (f32), skip 8
//! RotationDivisor (u32), TranslationMultiplier (f32)
//! Echoes: ScaleMultiplier (f32)
//! ChannelCount (u32), skip 4
//! KeyCount (u32) + key presence bitmap (one bit per key, whole u32 words)
//! skip 8 (Prime) / 4 (Echoes)
//! ChannelCount × {
//!     BoneId (u32 Prime / u8 Echoes)
//!     RotationKeys (u16) [+ 3 × (Base i16, Bits u8)]
//!     TranslationKeys (u16) [+ 3 × (Base i16, Bits u8)]
//!     Echoes: ScaleKeys (u16) [+ 3 × (Base i16, Bits u8)]
//! }
//! key bitstream
//! ```
//! For every key after the first whose presence bit is set, each channel
//! reads (rotation only) a W sign bit and then one signed delta of `Bits`
//! width per component, accumulated onto the running value. Absent keys
//! repeat the running value and are later replaced by interpolating between
//! the nearest present keys on either side.

use std::f32::consts::FRAC_PI_2;
use std::io::{Cursor, Seek, SeekFrom};

use glam::{Quat, Vec3};
use tracing::{debug, warn};

use crate::bits::BitReader;
use crate::game::Game;
use crate::store::ResourceLookup;
use crate::types::AssetId;
use crate::utils::{be_f32, be_i16, be_u16, be_u32, skip, u8};
use crate::{Error, Result};

/// Size of the bone namespace every animation indexes into.
pub const MAX_BONES: usize = 100;

/// Channel slots used by one bone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoneChannels {
    pub rotation: Option<u8>,
    pub translation: Option<u8>,
    pub scale: Option<u8>,
}

impl BoneChannels {
    pub const NONE: Self = Self {
        rotation: None,
        translation: None,
        scale: None,
    };

    pub fn is_animated(&self) -> bool {
        self.rotation.is_some() || self.translation.is_some() || self.scale.is_some()
    }
}

/// A decoded `ANIM` resource.
#[derive(Debug, Clone)]
pub struct Animation {
    /// Generation whose layout the resource was read with.
    pub game: Game,
    pub duration: f32,
    pub tick_interval: f32,
    pub num_keys: u32,
    pub bones: [BoneChannels; MAX_BONES],
    pub rotation_channels: Vec<Vec<Quat>>,
    pub translation_channels: Vec<Vec<Vec3>>,
    pub scale_channels: Vec<Vec<Vec3>>,
    /// `EVNT` resource attached to the animation.
    pub event_data: Option<AssetId>,
}

impl Animation {
    fn empty(game: Game) -> Self {
        Self {
            game,
            duration: 0.0,
            tick_interval: 0.0,
            num_keys: 0,
            bones: [BoneChannels::NONE; MAX_BONES],
            rotation_channels: Vec::new(),
            translation_channels: Vec::new(),
            scale_channels: Vec::new(),
            event_data: None,
        }
    }

    /// Decode an `ANIM` resource.
    ///
    /// `game` is the generation the resource came from, if known; layouts
    /// newer than Echoes are not decoded and yield an empty animation.
    /// `lookup` resolves the attached event data.
    pub fn decode(data: &[u8], game: Option<Game>, lookup: &dyn ResourceLookup) -> Result<Self> {
        if let Some(g) = game
            && g > Game::Echoes
        {
            warn!(game = %g, "animations from this game are not supported");
            return Ok(Self::empty(g));
        }

        let mut c = Cursor::new(data);
        let anim = match be_u32(&mut c)? {
            0 => read_uncompressed(&mut c, game)?,
            2 => read_compressed(&mut c, game)?,
            _ => return Err(Error::Parse("unknown animation compression type")),
        };

        if let Some(id) = anim.event_data {
            match lookup.find_resource(id) {
                Some(record) => debug!(%id, kind = %record.kind, "animation event data"),
                None => debug!(%id, "animation event data not in index"),
            }
        }

        anim.bones_checked()?;
        Ok(anim)
    }

    /// Channels of bone `bone`, if that bone is in range.
    pub fn bone(&self, bone: usize) -> Option<&BoneChannels> {
        self.bones.get(bone)
    }

    pub fn rotation(&self, bone: usize, key: usize) -> Option<Quat> {
        let ch = self.bone(bone)?.rotation?;
        self.rotation_channels.get(ch as usize)?.get(key).copied()
    }

    pub fn translation(&self, bone: usize, key: usize) -> Option<Vec3> {
        let ch = self.bone(bone)?.translation?;
        self.translation_channels.get(ch as usize)?.get(key).copied()
    }

    pub fn scale(&self, bone: usize, key: usize) -> Option<Vec3> {
        let ch = self.bone(bone)?.scale?;
        self.scale_channels.get(ch as usize)?.get(key).copied()
    }

    /// Every channel a bone points at must exist.
    fn bones_checked(&self) -> Result<()> {
        for bone in &self.bones {
            let ok = bone
                .rotation
                .is_none_or(|c| (c as usize) < self.rotation_channels.len())
                && bone
                    .translation
                    .is_none_or(|c| (c as usize) < self.translation_channels.len())
                && bone
                    .scale
                    .is_none_or(|c| (c as usize) < self.scale_channels.len());
            if !ok {
                return Err(Error::InvalidRange);
            }
        }
        Ok(())
    }
}

fn slot(index: u8) -> Option<u8> {
    (index != 0xFF).then_some(index)
}

/// Unread bytes after the cursor.
fn remaining<'a>(c: &Cursor<&'a [u8]>) -> &'a [u8] {
    let data: &'a [u8] = *c.get_ref();
    data.get(c.position() as usize..).unwrap_or(&[])
}

fn read_vec3(c: &mut Cursor<&[u8]>) -> Result<Vec3> {
    Ok(Vec3::new(be_f32(c)?, be_f32(c)?, be_f32(c)?))
}

fn read_quat(c: &mut Cursor<&[u8]>) -> Result<Quat> {
    let w = be_f32(c)?;
    let [x, y, z] = [be_f32(c)?, be_f32(c)?, be_f32(c)?];
    Ok(Quat::from_xyzw(x, y, z, w))
}

/// Length-prefixed `u8` index array.
fn read_indices(c: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let count = be_u32(c)?;
    (0..count).map(|_| u8(c)).collect()
}

/// Whether the bytes from `start` fit the Echoes uncompressed layout: three
/// index arrays and three key arrays that end exactly at the end of `data`.
fn fits_echoes_layout(data: &[u8], start: usize) -> bool {
    let end = data.len() as u64;
    let mut pos = start as u64;
    let count = |pos: &mut u64| -> Option<u64> {
        let at = *pos as usize;
        let bytes = data.get(at..at + 4)?;
        *pos += 4;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64)
    };

    // Each array must leave room for the next array's count.
    for stride in [1, 1, 1, 12, 16] {
        let Some(n) = count(&mut pos) else {
            return false;
        };
        if pos + n * stride + 4 >= end {
            return false;
        }
        pos += n * stride;
    }
    match count(&mut pos) {
        Some(n) => pos + n * 12 == end,
        None => false,
    }
}

fn read_uncompressed(c: &mut Cursor<&[u8]>, game: Option<Game>) -> Result<Animation> {
    let duration = be_f32(c)?;
    skip(c, 4)?;
    let tick_interval = be_f32(c)?;
    skip(c, 4)?;
    let num_keys = be_u32(c)?;
    skip(c, 4)?;

    let bone_indices = read_indices(c)?;
    if bone_indices.len() != MAX_BONES {
        return Err(Error::Parse("animation bone table must have 100 entries"));
    }

    let game = match game {
        Some(g) => g,
        None if fits_echoes_layout(c.get_ref(), c.position() as usize) => Game::Echoes,
        None => Game::Prime,
    };
    let echoes_layout = game >= Game::EchoesDemo;

    let rotation_indices = if echoes_layout {
        read_indices(c)?
    } else {
        // Every animated bone has a rotation.
        bone_indices.iter().copied().filter(|&i| i != 0xFF).collect()
    };
    let translation_indices = read_indices(c)?;
    let scale_indices = if echoes_layout {
        read_indices(c)?
    } else {
        Vec::new()
    };

    let mut anim = Animation::empty(game);
    anim.duration = duration;
    anim.tick_interval = tick_interval;
    anim.num_keys = num_keys;

    // Channel indices are listed once per animated bone, in bone order.
    let lookup = |indices: &[u8], chan: usize| -> Result<Option<u8>> {
        if indices.is_empty() {
            return Ok(None);
        }
        indices.get(chan).copied().map(slot).ok_or(Error::InvalidRange)
    };
    let mut chan = 0;
    for (bone, &index) in bone_indices.iter().enumerate() {
        if index == 0xFF {
            continue;
        }
        anim.bones[bone] = BoneChannels {
            rotation: lookup(&rotation_indices, chan)?,
            translation: lookup(&translation_indices, chan)?,
            scale: lookup(&scale_indices, chan)?,
        };
        chan += 1;
    }

    let live = |indices: &[u8]| indices.iter().filter(|&&i| i != 0xFF).count();

    if echoes_layout {
        skip(c, 4)?;
        anim.scale_channels = read_channels(c, live(&scale_indices), num_keys, read_vec3)?;
    }
    skip(c, 4)?;
    anim.rotation_channels = read_channels(c, live(&rotation_indices), num_keys, read_quat)?;
    skip(c, 4)?;
    anim.translation_channels = read_channels(c, live(&translation_indices), num_keys, read_vec3)?;

    // Demo-disc resources end without the event data id.
    if game == Game::Prime {
        anim.event_data = Some(AssetId::from(be_u32(c)?));
    }
    Ok(anim)
}

fn read_channels<T>(
    c: &mut Cursor<&[u8]>,
    channels: usize,
    num_keys: u32,
    read: fn(&mut Cursor<&[u8]>) -> Result<T>,
) -> Result<Vec<Vec<T>>> {
    (0..channels)
        .map(|_| (0..num_keys).map(|_| read(c)).collect::<Result<Vec<T>>>())
        .collect()
}

/// Running quantized value of one channel kind.
#[derive(Debug, Clone, Copy)]
struct Quantized {
    value: [i16; 3],
    bits: [u8; 3],
}

impl Quantized {
    /// Key count, then the per-component base and width when it is nonzero.
    fn read(c: &mut Cursor<&[u8]>) -> Result<Option<Self>> {
        if be_u16(c)? == 0 {
            return Ok(None);
        }
        let mut q = Quantized {
            value: [0; 3],
            bits: [0; 3],
        };
        for i in 0..3 {
            q.value[i] = be_i16(c)?;
            q.bits[i] = u8(c)?;
        }
        Ok(Some(q))
    }

    fn advance(&mut self, bits: &mut BitReader<'_>) -> Result<()> {
        for i in 0..3 {
            let delta = bits.read_signed(self.bits[i] as u32)?;
            self.value[i] = self.value[i].wrapping_add(delta as i16);
        }
        Ok(())
    }

    fn scaled(&self, multiplier: f32) -> Vec3 {
        Vec3::new(
            self.value[0] as f32,
            self.value[1] as f32,
            self.value[2] as f32,
        ) * multiplier
    }
}

struct CompressedChannel {
    rotation: Option<Quantized>,
    translation: Option<Quantized>,
    scale: Option<Quantized>,
}

/// Rebuild a unit quaternion from three quantized components; W takes the
/// given sign.
fn dequantize_rotation(negative_w: bool, value: [i16; 3], divisor: u32) -> Quat {
    let m = FRAC_PI_2 / divisor as f32;
    let [x, y, z] = value.map(|v| (v as f32 * m).sin());
    let w = (1.0 - (x * x + y * y + z * z)).max(0.0).sqrt();
    Quat::from_xyzw(x, y, z, if negative_w { -w } else { w })
}

fn read_compressed(c: &mut Cursor<&[u8]>, game: Option<Game>) -> Result<Animation> {
    skip(c, 4)?;

    let detected = if be_u16(c)? == 0x0101 {
        Game::Echoes
    } else {
        Game::Prime
    };
    c.seek(SeekFrom::Current(-2))?;
    // Some Echoes demo resources use the Prime layout without event data,
    // so the caller's game decides this one.
    let game = game.unwrap_or(detected);
    let echoes = detected == Game::Echoes;

    let mut anim = Animation::empty(detected);
    if game <= Game::Prime {
        anim.event_data = Some(AssetId::from(be_u32(c)?));
    }

    skip(c, if echoes { 2 } else { 4 })?;
    anim.duration = be_f32(c)?;
    anim.tick_interval = be_f32(c)?;
    skip(c, 8)?;

    let rotation_divisor = be_u32(c)?;
    if rotation_divisor == 0 {
        return Err(Error::Parse("zero rotation divisor"));
    }
    let translation_multiplier = be_f32(c)?;
    let scale_multiplier = if echoes { be_f32(c)? } else { 0.0 };
    let channel_count = be_u32(c)? as usize;
    skip(c, 4)?;

    let num_keys = be_u32(c)?;
    anim.num_keys = num_keys;
    let mut flags = Vec::with_capacity(num_keys.min(0x10000) as usize);
    {
        let mut bits = BitReader::new(remaining(c));
        for _ in 0..num_keys {
            flags.push(bits.read_bit()?);
        }
    }
    skip(c, num_keys.div_ceil(32) as i64 * 4)?;
    skip(c, if echoes { 4 } else { 8 })?;

    let mut channels = Vec::with_capacity(channel_count.min(MAX_BONES));
    for i in 0..channel_count {
        let bone = if echoes {
            u8(c)? as usize
        } else {
            be_u32(c)? as usize
        };
        let rotation = Quantized::read(c)?;
        let translation = Quantized::read(c)?;
        let scale = if echoes { Quantized::read(c)? } else { None };

        let slot_of = |q: &Option<Quantized>| q.is_some().then_some(i as u8);
        let entry = anim.bones.get_mut(bone).ok_or(Error::InvalidRange)?;
        *entry = BoneChannels {
            rotation: slot_of(&rotation),
            translation: slot_of(&translation),
            scale: slot_of(&scale),
        };
        channels.push(CompressedChannel {
            rotation,
            translation,
            scale,
        });
    }

    anim.rotation_channels = vec![Vec::new(); channel_count];
    anim.translation_channels = vec![Vec::new(); channel_count];
    anim.scale_channels = vec![Vec::new(); channel_count];

    for (i, ch) in channels.iter().enumerate() {
        if let Some(q) = &ch.rotation {
            anim.rotation_channels[i].push(dequantize_rotation(false, q.value, rotation_divisor));
        }
        if let Some(q) = &ch.translation {
            anim.translation_channels[i].push(q.scaled(translation_multiplier));
        }
        if let Some(q) = &ch.scale {
            anim.scale_channels[i].push(q.scaled(scale_multiplier));
        }
    }

    let mut bits = BitReader::new(remaining(c));
    for &present in flags.iter().skip(1) {
        for (i, ch) in channels.iter_mut().enumerate() {
            if let Some(q) = &mut ch.rotation {
                let negative_w = present && bits.read_bit()?;
                if present {
                    q.advance(&mut bits)?;
                }
                anim.rotation_channels[i].push(dequantize_rotation(negative_w, q.value, rotation_divisor));
            }
            if let Some(q) = &mut ch.translation {
                if present {
                    q.advance(&mut bits)?;
                }
                anim.translation_channels[i].push(q.scaled(translation_multiplier));
            }
            if let Some(q) = &mut ch.scale {
                if present {
                    q.advance(&mut bits)?;
                }
                anim.scale_channels[i].push(q.scaled(scale_multiplier));
            }
        }
    }

    fill_gaps(&flags, &mut anim.rotation_channels, |a, b, t| a.slerp(b, t));
    fill_gaps(&flags, &mut anim.translation_channels, |a, b, t| a.lerp(b, t));
    fill_gaps(&flags, &mut anim.scale_channels, |a, b, t| a.lerp(b, t));

    Ok(anim)
}

/// Replace every run of absent keys that has a present key on both sides
/// with values interpolated between those two keys.
fn fill_gaps<T: Copy>(flags: &[bool], channels: &mut [Vec<T>], interpolate: impl Fn(T, T, f32) -> T) {
    let mut previous: Option<usize> = None;
    for (key, &present) in flags.iter().enumerate() {
        if !present {
            continue;
        }
        if let Some(first) = previous
            && key - first > 1
        {
            let span = (key - first) as f32;
            for channel in channels.iter_mut().filter(|ch| ch.len() > key) {
                let (left, right) = (channel[first], channel[key]);
                for missing in first + 1..key {
                    let t = (missing - first) as f32 / span;
                    channel[missing] = interpolate(left, right, t);
                }
            }
        }
        previous = Some(key);
    }
}
