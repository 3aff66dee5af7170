//! PAK - package container holding a game's cooked resources.
//!
//! Two generations exist. Both are big-endian and both list every resource
//! as a record pointing into the package file; resource bytes are never read
//! while parsing.
//!
//! ## Legacy layout (version `0x00030005`)
//! ```text
//! [0x00] Version (0x00030005)                 (u32)
//! [0x04] Reserved                             (u32)
//! [0x08] NamedCount                           (u32)
//!        NamedCount × { Type (4 bytes), Id, NameLen (u32), Name[NameLen] }
//! [...]  ResourceCount                        (u32)
//!        ResourceCount × { Compressed (u32), Type, Id, Size (u32), Offset (u32) }
//! ```
//! Offsets are absolute within the file. Some demo discs ship packages that
//! end right after the reserved word; those parse as empty.
//!
//! ## Modern layout (version `2`)
//! ```text
//! [0x00] Version (2)                          (u32)
//! [0x04] HeaderLen                            (u32, counted from 0x00)
//! [...]  remainder of header (HeaderLen - 8 bytes, skipped)
//! [...]  SectionCount (3)                     (u32)
//!        SectionCount × { Type (4 bytes), Size (u32) }
//!        padding to a 64-byte boundary
//! [...]  sections back to back: STRG, RSHD, DATA
//! ```
//! * `STRG`: Count (u32), Count × { Name (null-terminated), Type, Id }
//! * `RSHD`: Count (u32), Count × { Compressed (u32), Type, Id, Size (u32),
//!   Offset (u32, relative to the start of `DATA`) }
//! * `DATA`: resource bytes
//!
//! Each section is read from its declared start; whatever padding trails its
//! contents is skipped.
//!
//! Ids are 32 or 64 bits wide depending on the [`Game`].

use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::game::{Game, PakLayout};
use crate::types::{AssetId, FourCC};
use crate::utils::{align, be_u32, fixed_string, read_null_string, skip, stream_len};
use crate::{Error, Result};

/// Version tag of Legacy packages.
pub const LEGACY_VERSION: u32 = 0x0003_0005;
/// Version tag of Modern packages.
pub const MODERN_VERSION: u32 = 2;

/// Location of one resource inside a package file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub id: AssetId,
    pub kind: FourCC,
    /// Package file the resource lives in.
    pub pak_path: PathBuf,
    /// Absolute byte offset within the package file.
    pub offset: u64,
    /// Stored size in bytes (compressed size for compressed resources).
    pub size: u32,
    pub compressed: bool,
}

/// A producer-assigned name for a resource, scoped to one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedResource {
    pub name: String,
    pub id: AssetId,
    pub kind: FourCC,
}

/// Named-resource table of one package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Package name (file stem, e.g. `Metroid1`).
    pub name: String,
    pub path: PathBuf,
    pub named_resources: Vec<NamedResource>,
}

impl Package {
    /// Find a named resource by exact name.
    pub fn get_by_name(&self, name: &str) -> Option<&NamedResource> {
        self.named_resources.iter().find(|n| n.name == name)
    }
}

/// Parsed package (metadata only).
#[derive(Debug, Clone)]
pub struct Pak {
    pub layout: PakLayout,
    pub package: Package,
    /// Every resource record in file order, duplicates included.
    pub records: Vec<ResourceRecord>,
    /// For each area (`MREA`) in the package, whether its resources may be
    /// shared with earlier areas.
    pub area_duplicates: BTreeMap<AssetId, bool>,
}

impl Pak {
    /// Parse a package from `r`.
    ///
    /// `r` must be positioned at the start of the package. `path` is stored
    /// on every record so that payloads can be located later.
    pub fn parse<R: Read + Seek>(r: &mut R, game: Game, path: &Path) -> Result<Self> {
        let version = be_u32(r)?;
        let layout = match version {
            LEGACY_VERSION => PakLayout::Legacy,
            MODERN_VERSION => PakLayout::Modern,
            other => return Err(Error::UnsupportedVersion(other)),
        };
        if layout != game.pak_layout() {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut pak = Pak {
            layout,
            package: Package {
                name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.to_path_buf(),
                named_resources: Vec::new(),
            },
            records: Vec::new(),
            area_duplicates: BTreeMap::new(),
        };

        match layout {
            PakLayout::Legacy => pak.parse_legacy(r, game)?,
            PakLayout::Modern => pak.parse_modern(r, game)?,
        }

        debug!(
            pak = %pak.package.name,
            named = pak.package.named_resources.len(),
            resources = pak.records.len(),
            "parsed package"
        );
        Ok(pak)
    }

    fn parse_legacy<R: Read + Seek>(&mut self, r: &mut R, game: Game) -> Result<()> {
        let _reserved = be_u32(r)?;

        // Demo-disc packages can end right here.
        if r.stream_position()? >= stream_len(r)? {
            return Ok(());
        }

        let named_count = be_u32(r)?;
        self.package.named_resources.reserve(named_count.min(0x10000) as usize);
        for _ in 0..named_count {
            let kind = FourCC::read(r)?;
            let id = AssetId::read(r, game)?;
            let name_len = be_u32(r)?;
            let name = fixed_string(r, name_len as usize)?;
            self.package.named_resources.push(NamedResource { name, id, kind });
        }

        let resource_count = be_u32(r)?;
        self.read_resource_table(r, game, resource_count, 0)
    }

    fn parse_modern<R: Read + Seek>(&mut self, r: &mut R, game: Game) -> Result<()> {
        let header_len = be_u32(r)?;
        if header_len < 8 {
            return Err(Error::Parse("package header shorter than 8 bytes"));
        }
        skip(r, header_len as i64 - 8)?;

        let section_count = be_u32(r)?;
        if section_count != 3 {
            return Err(Error::Parse("expected three package sections"));
        }
        let mut sections = Vec::with_capacity(3);
        for _ in 0..section_count {
            let kind = FourCC::read(r)?;
            let size = be_u32(r)?;
            sections.push((kind, size));
        }
        let mut start = align(r, 64)?;

        for (i, &(kind, size)) in sections.iter().enumerate() {
            let next = start + size as u64;
            r.seek(SeekFrom::Start(start))?;

            match kind {
                FourCC::STRG => {
                    let count = be_u32(r)?;
                    for _ in 0..count {
                        let name = read_null_string(r)?;
                        let kind = FourCC::read(r)?;
                        let id = AssetId::read(r, game)?;
                        self.package.named_resources.push(NamedResource { name, id, kind });
                    }
                }
                FourCC::RSHD => {
                    if sections.get(i + 1).map(|s| s.0) != Some(FourCC::DATA) {
                        return Err(Error::Parse("RSHD section not followed by DATA"));
                    }
                    let count = be_u32(r)?;
                    self.read_resource_table(r, game, count, next)?;
                }
                _ => {}
            }

            start = next;
        }

        r.seek(SeekFrom::Start(start))?;
        Ok(())
    }

    /// Read `count` resource records, adding `data_base` to each offset.
    fn read_resource_table<R: Read>(
        &mut self,
        r: &mut R,
        game: Game,
        count: u32,
        data_base: u64,
    ) -> Result<()> {
        let mut tracker = AreaDuplicateTracker::new(game.tracks_area_duplicates());
        self.records.reserve(count.min(0x10000) as usize);

        for _ in 0..count {
            let compressed = be_u32(r)? == 1;
            let kind = FourCC::read(r)?;
            let id = AssetId::read(r, game)?;
            let size = be_u32(r)?;
            let offset = data_base + be_u32(r)? as u64;

            tracker.observe(id, kind);
            self.records.push(ResourceRecord {
                id,
                kind,
                pak_path: self.package.path.clone(),
                offset,
                size,
                compressed,
            });
        }

        self.area_duplicates.extend(tracker.flags);
        Ok(())
    }
}

/// Tracks whether each area's resource group repeats resources from earlier
/// groups in the same package.
///
/// An area's resources are listed before its `MREA` record. The flag starts
/// out `true` so the first area always allows duplicates; each `MREA` stores
/// the current flag for that area and resets it; any later record whose id
/// was already seen in this package sets it again.
struct AreaDuplicateTracker {
    enabled: bool,
    seen: HashSet<AssetId>,
    current: bool,
    flags: BTreeMap<AssetId, bool>,
}

impl AreaDuplicateTracker {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: HashSet::new(),
            current: true,
            flags: BTreeMap::new(),
        }
    }

    fn observe(&mut self, id: AssetId, kind: FourCC) {
        if !self.enabled {
            return;
        }
        if kind == FourCC::MREA {
            self.flags.insert(id, self.current);
            self.current = false;
        } else if !self.current && self.seen.contains(&id) {
            self.current = true;
        } else {
            self.seen.insert(id);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;

    /// Minimal big-endian builder for package fixtures.
    #[derive(Default)]
    pub(crate) struct PakBuilder {
        pub buf: Vec<u8>,
    }

    impl PakBuilder {
        pub fn u32(&mut self, v: u32) -> &mut Self {
            self.buf.extend(v.to_be_bytes());
            self
        }
        pub fn u64(&mut self, v: u64) -> &mut Self {
            self.buf.extend(v.to_be_bytes());
            self
        }
        pub fn tag(&mut self, t: &[u8; 4]) -> &mut Self {
            self.buf.extend_from_slice(t);
            self
        }
        pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
            self.buf.extend_from_slice(b);
            self
        }
        pub fn pad_to(&mut self, len: usize) -> &mut Self {
            self.buf.resize(len, 0);
            self
        }
    }

    fn parse(buf: &[u8], game: Game) -> Result<Pak> {
        Pak::parse(&mut Cursor::new(buf), game, Path::new("Test.pak"))
    }

    fn legacy(named: &[(&[u8; 4], u32, &str)], resources: &[(u32, &[u8; 4], u32, u32, u32)]) -> Vec<u8> {
        let mut b = PakBuilder::default();
        b.u32(LEGACY_VERSION).u32(0).u32(named.len() as u32);
        for &(kind, id, name) in named {
            b.tag(kind).u32(id).u32(name.len() as u32).bytes(name.as_bytes());
        }
        b.u32(resources.len() as u32);
        for &(compressed, kind, id, size, offset) in resources {
            b.u32(compressed).tag(kind).u32(id).u32(size).u32(offset);
        }
        b.buf
    }

    #[test]
    fn legacy_single_resource() {
        let buf = legacy(&[(b"TXTR", 1, "Foo")], &[(0, b"TXTR", 1, 16, 0x40)]);
        let pak = parse(&buf, Game::Prime).unwrap();

        assert_eq!(pak.layout, PakLayout::Legacy);
        assert_eq!(pak.package.name, "Test");
        assert_eq!(
            pak.package.named_resources,
            vec![NamedResource {
                name: "Foo".into(),
                id: AssetId(1),
                kind: FourCC::TXTR
            }]
        );
        assert_eq!(pak.records.len(), 1);
        let rec = &pak.records[0];
        assert_eq!(rec.id, AssetId(1));
        assert_eq!(rec.kind, FourCC::TXTR);
        assert_eq!((rec.offset, rec.size, rec.compressed), (0x40, 16, false));
    }

    #[test]
    fn legacy_truncated_after_reserved_is_empty() {
        let mut b = PakBuilder::default();
        b.u32(LEGACY_VERSION).u32(0);
        let pak = parse(&b.buf, Game::EchoesDemo).unwrap();
        assert!(pak.records.is_empty());
        assert!(pak.package.named_resources.is_empty());
    }

    #[test]
    fn unknown_version_is_fatal() {
        let mut b = PakBuilder::default();
        b.u32(0x1234).u32(0);
        assert!(matches!(
            parse(&b.buf, Game::Prime),
            Err(Error::UnsupportedVersion(0x1234))
        ));
    }

    #[test]
    fn parsing_is_repeatable() {
        let buf = legacy(
            &[(b"MLVL", 9, "World")],
            &[(1, b"TXTR", 1, 32, 0x100), (0, b"MREA", 2, 64, 0x120)],
        );
        let a = parse(&buf, Game::Prime).unwrap();
        let b = parse(&buf, Game::Prime).unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.package.named_resources, b.package.named_resources);
        assert_eq!(a.area_duplicates, b.area_duplicates);
    }

    #[test]
    fn area_duplicate_flags() {
        let buf = legacy(
            &[],
            &[
                // area 0x10: first area always allows duplicates
                (0, b"TXTR", 1, 4, 0),
                (0, b"MREA", 0x10, 4, 0),
                // area 0x20: only new resources
                (0, b"TXTR", 2, 4, 0),
                (0, b"MREA", 0x20, 4, 0),
                // area 0x30: repeats resource 1
                (0, b"TXTR", 3, 4, 0),
                (0, b"TXTR", 1, 4, 0),
                (0, b"MREA", 0x30, 4, 0),
            ],
        );
        let pak = parse(&buf, Game::Prime).unwrap();
        assert!(pak.area_duplicates[&AssetId(0x10)]);
        assert!(!pak.area_duplicates[&AssetId(0x20)]);
        assert!(pak.area_duplicates[&AssetId(0x30)]);
        // Duplicate records are still listed.
        assert_eq!(pak.records.len(), 7);
    }

    fn modern(header_len: u32) -> Vec<u8> {
        let mut strg = PakBuilder::default();
        strg.u32(1).bytes(b"Foo\0").tag(b"TXTR").u64(0xAABB_CCDD_0000_0001);
        let strg_len = strg.buf.len().div_ceil(32) * 32;
        strg.pad_to(strg_len);

        let mut rshd = PakBuilder::default();
        rshd.u32(2);
        rshd.u32(0).tag(b"TXTR").u64(0xAABB_CCDD_0000_0001).u32(8).u32(0);
        rshd.u32(1).tag(b"ANIM").u64(0xAABB_CCDD_0000_0002).u32(8).u32(8);
        let rshd_len = rshd.buf.len().div_ceil(32) * 32;
        rshd.pad_to(rshd_len);

        let data = b"texturesanimdata";

        let mut b = PakBuilder::default();
        b.u32(MODERN_VERSION).u32(header_len);
        b.pad_to(header_len as usize);
        b.u32(3);
        b.tag(b"STRG").u32(strg_len as u32);
        b.tag(b"RSHD").u32(rshd_len as u32);
        b.tag(b"DATA").u32(data.len() as u32);
        let aligned = b.buf.len().div_ceil(64) * 64;
        b.pad_to(aligned);
        b.bytes(&strg.buf).bytes(&rshd.buf).bytes(data);
        b.buf
    }

    #[test]
    fn modern_sections() {
        for header_len in [8, 0x40] {
            let buf = modern(header_len);
            let pak = parse(&buf, Game::Corruption).unwrap();

            assert_eq!(pak.layout, PakLayout::Modern);
            assert_eq!(pak.package.named_resources.len(), 1);
            assert_eq!(pak.package.named_resources[0].name, "Foo");
            assert_eq!(pak.records.len(), 2);

            // Offsets are rebased onto the DATA section.
            let data_start = buf.len() as u64 - 16;
            assert_eq!(pak.records[0].offset, data_start);
            assert_eq!(pak.records[1].offset, data_start + 8);
            assert!(pak.records[1].compressed);
            assert_eq!(pak.records[1].kind, FourCC::ANIM);

            let start = pak.records[1].offset as usize;
            assert_eq!(&buf[start..start + 8], b"animdata");
        }
    }

    #[test]
    fn layout_must_match_game() {
        let buf = legacy(&[], &[]);
        assert!(matches!(
            parse(&buf, Game::Corruption),
            Err(Error::UnsupportedVersion(LEGACY_VERSION))
        ));
    }

    #[test]
    fn modern_requires_three_sections() {
        let mut b = PakBuilder::default();
        b.u32(MODERN_VERSION).u32(8).u32(2);
        assert!(matches!(parse(&b.buf, Game::Corruption), Err(Error::Parse(_))));
    }
}
