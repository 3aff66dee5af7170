//! Dependency lists for resource types that are otherwise kept raw.
//!
//! None of these formats are decoded; only the ids of the resources they
//! reference are pulled out. Ids are listed once each, in file order, and
//! all-ones ids ("no resource") are dropped.
//!
//! ## EVNT
//! ```text
//! Version (u32, 1 or 2)
//! LoopEventCount (u32)   × { skip 2, Name (cstring), skip 0x1C }
//! UserEventCount (u32)   × { skip 2, Name (cstring), skip 0x1F, Locator (cstring) }
//! EffectEventCount (u32) × { skip 2, Name (cstring), skip 0x23, Effect id (u32),
//!                            Locator (cstring), skip 8 }
//! ```
//!
//! ## CSNG
//! ```text
//! Magic (u32, 2), skip 8, AudioGroup id (u32)
//! ```
//!
//! ## HINT
//! ```text
//! Magic (u32, 0x00BADBAD), Version (u32: 1 = 32-bit ids, 3 = 64-bit ids)
//! HintCount (u32) × {
//!     Name (cstring), skip 8, Popup STRG id
//!     skip 8
//!     Version 1: World MLVL id, Area MREA id, skip 4, Map STRG id
//! }
//! ```
//!
//! ## MAPW
//! ```text
//! Magic (u32, 0xDEADF00D), Version (u32, 1)
//! AreaCount (u32) × MAPA id
//! ```
//! The id width isn't stored; 32-bit ids are assumed when the word after
//! `AreaCount × 4` bytes is absent or `0xFFFFFFFF`.
//!
//! ## MAPU
//! ```text
//! Magic (u32, 0xABCDEF01), Version (u32, 1), HexagonModel id (u32)
//! WorldCount (u32) × {
//!     Name (cstring), World MLVL id (u32), skip 0x30
//!     HexagonCount (u32), skip HexagonCount × 0x30, skip 0x10
//! }
//! ```
//!
//! ## RULE
//! ```text
//! Magic "RULE", skip 1, Parent RULE id
//! ```
//! 64-bit when the `u32` four bytes past the id start exceeds `0xFF`.

use std::io::{Cursor, Seek, SeekFrom};

use crate::types::{AssetId, FourCC, IdLength};
use crate::utils::{be_u32, magic, read_null_string, skip, stream_len};
use crate::{Error, Result};

/// Whether [`read_dependencies`] understands resources of type `kind`.
pub fn has_dependency_reader(kind: FourCC) -> bool {
    matches!(
        kind,
        FourCC::EVNT | FourCC::CSNG | FourCC::HINT | FourCC::MAPW | FourCC::MAPU | FourCC::RULE
    )
}

/// Ids referenced by a cooked resource of type `kind`.
///
/// Returns `None` for types without a dependency reader.
pub fn read_dependencies(kind: FourCC, data: &[u8]) -> Result<Option<Vec<AssetId>>> {
    let mut c = Cursor::new(data);
    let mut deps = DependencyList::default();
    match kind {
        FourCC::EVNT => read_evnt(&mut c, &mut deps)?,
        FourCC::CSNG => read_csng(&mut c, &mut deps)?,
        FourCC::HINT => read_hint(&mut c, &mut deps)?,
        FourCC::MAPW => read_mapw(&mut c, &mut deps)?,
        FourCC::MAPU => read_mapu(&mut c, &mut deps)?,
        FourCC::RULE => read_rule(&mut c, &mut deps)?,
        _ => return Ok(None),
    }
    Ok(Some(deps.ids))
}

#[derive(Default)]
struct DependencyList {
    ids: Vec<AssetId>,
}

impl DependencyList {
    fn add(&mut self, id: AssetId, length: IdLength) {
        if id.is_valid(length) && !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    fn read(&mut self, c: &mut Cursor<&[u8]>, length: IdLength) -> Result<()> {
        let id = AssetId::read_sized(c, length)?;
        self.add(id, length);
        Ok(())
    }
}

fn expect_u32(c: &mut Cursor<&[u8]>, expected: u32) -> Result<()> {
    if be_u32(c)? != expected {
        return Err(Error::BadMagic);
    }
    Ok(())
}

fn read_evnt(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    let version = be_u32(c)?;
    if version != 1 && version != 2 {
        return Err(Error::UnsupportedVersion(version));
    }

    for _ in 0..be_u32(c)? {
        skip(c, 2)?;
        read_null_string(c)?;
        skip(c, 0x1C)?;
    }
    for _ in 0..be_u32(c)? {
        skip(c, 2)?;
        read_null_string(c)?;
        skip(c, 0x1F)?;
        read_null_string(c)?;
    }
    for _ in 0..be_u32(c)? {
        skip(c, 2)?;
        read_null_string(c)?;
        skip(c, 0x23)?;
        deps.read(c, IdLength::Short)?;
        read_null_string(c)?;
        skip(c, 8)?;
    }
    Ok(())
}

fn read_csng(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    expect_u32(c, 2)?;
    skip(c, 8)?;
    deps.read(c, IdLength::Short)
}

fn read_hint(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    expect_u32(c, 0x00BA_DBAD)?;
    let length = match be_u32(c)? {
        1 => IdLength::Short,
        3 => IdLength::Long,
        other => return Err(Error::UnsupportedVersion(other)),
    };

    for _ in 0..be_u32(c)? {
        read_null_string(c)?;
        skip(c, 8)?;
        deps.read(c, length)?;
        skip(c, 8)?;
        if length == IdLength::Short {
            deps.read(c, length)?;
            deps.read(c, length)?;
            skip(c, 4)?;
            deps.read(c, length)?;
        }
    }
    Ok(())
}

fn read_mapw(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    expect_u32(c, 0xDEAD_F00D)?;
    expect_u32(c, 1)?;
    let count = be_u32(c)?;

    let start = c.stream_position()?;
    let probe = start + count as u64 * 4;
    let length = if probe + 4 > stream_len(c)? {
        IdLength::Short
    } else {
        c.seek(SeekFrom::Start(probe))?;
        if be_u32(c)? == u32::MAX {
            IdLength::Short
        } else {
            IdLength::Long
        }
    };
    c.seek(SeekFrom::Start(start))?;

    for _ in 0..count {
        deps.read(c, length)?;
    }
    Ok(())
}

fn read_mapu(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    expect_u32(c, 0xABCD_EF01)?;
    expect_u32(c, 1)?;
    deps.read(c, IdLength::Short)?;

    for _ in 0..be_u32(c)? {
        read_null_string(c)?;
        deps.read(c, IdLength::Short)?;
        skip(c, 0x30)?;
        let hexagons = be_u32(c)?;
        skip(c, hexagons as i64 * 0x30)?;
        skip(c, 0x10)?;
    }
    Ok(())
}

fn read_rule(c: &mut Cursor<&[u8]>, deps: &mut DependencyList) -> Result<()> {
    magic(c, b"RULE")?;
    skip(c, 1)?;

    let id_start = c.stream_position()?;
    skip(c, 4)?;
    let length = if be_u32(c)? > 0xFF {
        IdLength::Long
    } else {
        IdLength::Short
    };
    c.seek(SeekFrom::Start(id_start))?;
    deps.read(c, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Writer {
        buf: Vec<u8>,
    }

    impl Writer {
        fn u32(&mut self, v: u32) -> &mut Self {
            self.buf.extend(v.to_be_bytes());
            self
        }
        fn u64(&mut self, v: u64) -> &mut Self {
            self.buf.extend(v.to_be_bytes());
            self
        }
        fn u8(&mut self, v: u8) -> &mut Self {
            self.buf.push(v);
            self
        }
        fn zeros(&mut self, n: usize) -> &mut Self {
            self.buf.resize(self.buf.len() + n, 0);
            self
        }
        fn cstr(&mut self, s: &str) -> &mut Self {
            self.buf.extend_from_slice(s.as_bytes());
            self.buf.push(0);
            self
        }
    }

    fn ids(list: &[u64]) -> Vec<AssetId> {
        list.iter().map(|&id| AssetId(id)).collect()
    }

    fn effect(w: &mut Writer, id: u32) {
        w.zeros(2).cstr("fx").zeros(0x23).u32(id).cstr("LCTR_root").zeros(8);
    }

    #[test]
    fn evnt_effect_events() {
        let mut w = Writer::default();
        w.u32(2);
        w.u32(1).zeros(2).cstr("loop").zeros(0x1C);
        w.u32(1).zeros(2).cstr("user").zeros(0x1F).cstr("LCTR_head");
        w.u32(4);
        effect(&mut w, 0x1111_0001);
        effect(&mut w, 0xFFFF_FFFF);
        effect(&mut w, 0x1111_0002);
        effect(&mut w, 0x1111_0001);

        let deps = read_dependencies(FourCC::EVNT, &w.buf).unwrap();
        assert_eq!(deps, Some(ids(&[0x1111_0001, 0x1111_0002])));
    }

    #[test]
    fn evnt_rejects_unknown_version() {
        let mut w = Writer::default();
        w.u32(3).u32(0).u32(0).u32(0);
        assert!(matches!(
            read_dependencies(FourCC::EVNT, &w.buf),
            Err(Error::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn truncated_evnt_is_an_error() {
        let mut w = Writer::default();
        w.u32(1).u32(0).u32(0).u32(1).zeros(2).cstr("fx").zeros(0x10);
        assert!(read_dependencies(FourCC::EVNT, &w.buf).is_err());
    }

    #[test]
    fn csng_audio_group() {
        let mut w = Writer::default();
        w.u32(2).zeros(8).u32(0xABCD);
        assert_eq!(read_dependencies(FourCC::CSNG, &w.buf).unwrap(), Some(ids(&[0xABCD])));

        w.buf[3] = 1;
        assert!(matches!(read_dependencies(FourCC::CSNG, &w.buf), Err(Error::BadMagic)));
    }

    #[test]
    fn hint_versions() {
        let mut w = Writer::default();
        w.u32(0x00BA_DBAD).u32(1).u32(1);
        w.cstr("hint").zeros(8).u32(10).zeros(8).u32(11).u32(12).zeros(4).u32(13);
        assert_eq!(
            read_dependencies(FourCC::HINT, &w.buf).unwrap(),
            Some(ids(&[10, 11, 12, 13]))
        );

        let mut w = Writer::default();
        w.u32(0x00BA_DBAD).u32(3).u32(1);
        w.cstr("hint").zeros(8).u64(0x1_0000_0010).zeros(8);
        assert_eq!(
            read_dependencies(FourCC::HINT, &w.buf).unwrap(),
            Some(ids(&[0x1_0000_0010]))
        );
    }

    #[test]
    fn mapw_id_width_is_probed() {
        let mut w = Writer::default();
        w.u32(0xDEAD_F00D).u32(1).u32(2).u32(0x20).u32(0x21);
        assert_eq!(read_dependencies(FourCC::MAPW, &w.buf).unwrap(), Some(ids(&[0x20, 0x21])));

        w.u32(u32::MAX);
        assert_eq!(read_dependencies(FourCC::MAPW, &w.buf).unwrap(), Some(ids(&[0x20, 0x21])));

        let mut w = Writer::default();
        w.u32(0xDEAD_F00D).u32(1).u32(2).u64(0x2_0000_0000).u64(0x3_0000_0000);
        assert_eq!(
            read_dependencies(FourCC::MAPW, &w.buf).unwrap(),
            Some(ids(&[0x2_0000_0000, 0x3_0000_0000]))
        );
    }

    #[test]
    fn mapu_worlds() {
        let mut w = Writer::default();
        w.u32(0xABCD_EF01).u32(1).u32(0x50).u32(2);
        w.cstr("Tallon").u32(0x51).zeros(0x30).u32(2).zeros(2 * 0x30).zeros(0x10);
        w.cstr("Chozo").u32(0x52).zeros(0x30).u32(0).zeros(0x10);
        assert_eq!(
            read_dependencies(FourCC::MAPU, &w.buf).unwrap(),
            Some(ids(&[0x50, 0x51, 0x52]))
        );
    }

    #[test]
    fn rule_parent_width() {
        let mut w = Writer::default();
        w.buf.extend_from_slice(b"RULE");
        w.u8(1).u32(0x77).u32(3);
        assert_eq!(read_dependencies(FourCC::RULE, &w.buf).unwrap(), Some(ids(&[0x77])));

        let mut w = Writer::default();
        w.buf.extend_from_slice(b"RULE");
        w.u8(1).u64(0x0000_0001_0000_1234).u32(0);
        assert_eq!(
            read_dependencies(FourCC::RULE, &w.buf).unwrap(),
            Some(ids(&[0x0000_0001_0000_1234]))
        );
    }

    #[test]
    fn other_kinds_have_no_reader() {
        assert!(!has_dependency_reader(FourCC::STRG));
        assert_eq!(read_dependencies(FourCC::STRG, b"anything").unwrap(), None);
    }
}
