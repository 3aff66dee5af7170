//! Identifier types shared by every format: asset ids and FourCC tags.

use std::fmt;
use std::io::Read;

use crate::Result;
use crate::game::Game;
use crate::utils::{be_u32, be_u64, bytesa};

/// Width of an [`AssetId`] as stored on disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLength {
    /// 32-bit ids (Prime, Echoes and their demos).
    Short,
    /// 64-bit ids (Corruption onwards).
    Long,
}

/// Opaque resource identifier.
///
/// Ids are unique across a whole game's data set. Equality and ordering use
/// the numeric value only; the on-disc width is a property of the [`Game`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(pub u64);

impl AssetId {
    /// Read an id of the width used by `game`.
    pub fn read<R: Read>(r: &mut R, game: Game) -> Result<Self> {
        Self::read_sized(r, game.id_length())
    }

    /// Read an id of an explicit width, for formats that carry their own
    /// version instead of following the game.
    pub fn read_sized<R: Read>(r: &mut R, length: IdLength) -> Result<Self> {
        match length {
            IdLength::Short => Ok(Self(be_u32(r)? as u64)),
            IdLength::Long => Ok(Self(be_u64(r)?)),
        }
    }

    /// All bits set means "no resource".
    pub fn is_valid(self, length: IdLength) -> bool {
        match length {
            IdLength::Short => self.0 != u32::MAX as u64,
            IdLength::Long => self.0 != u64::MAX,
        }
    }

    /// Raw numeric value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u32> for AssetId {
    fn from(v: u32) -> Self {
        Self(v as u64)
    }
}

impl From<u64> for AssetId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= u32::MAX as u64 {
            write!(f, "{:08X}", self.0)
        } else {
            write!(f, "{:016X}", self.0)
        }
    }
}

/// Four-character type tag, e.g. `TXTR`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const TXTR: Self = Self(*b"TXTR");
    pub const ANIM: Self = Self(*b"ANIM");
    pub const MREA: Self = Self(*b"MREA");
    pub const MLVL: Self = Self(*b"MLVL");
    pub const EVNT: Self = Self(*b"EVNT");
    pub const STRG: Self = Self(*b"STRG");
    pub const RSHD: Self = Self(*b"RSHD");
    pub const DATA: Self = Self(*b"DATA");
    pub const CMPD: Self = Self(*b"CMPD");
    pub const CSNG: Self = Self(*b"CSNG");
    pub const HINT: Self = Self(*b"HINT");
    pub const MAPW: Self = Self(*b"MAPW");
    pub const MAPU: Self = Self(*b"MAPU");
    pub const RULE: Self = Self(*b"RULE");

    /// Read a tag from four raw bytes.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self(bytesa::<4>(r)?))
    }

    /// Lower-case form used for cooked file extensions.
    pub fn extension(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(b: &[u8; 4]) -> Self {
        Self(*b)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}
