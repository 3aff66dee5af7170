//! Resource index over a set of package files.
//!
//! Packages are visited in upper-cased file name order and the first record
//! seen for an id is the one that gets loaded; later duplicates are ignored.
//! Named resources are kept per package regardless. Area duplicate flags are
//! the exception: a later package's flag for an area replaces an earlier one.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::Result;
use crate::formats::pak::{Package, Pak, ResourceRecord};
use crate::game::Game;
use crate::types::AssetId;

/// Every resource record of a game, keyed by id, plus the packages they
/// came from.
#[derive(Debug, Clone)]
pub struct ResourceIndex {
    game: Game,
    packages: Vec<Package>,
    resources: BTreeMap<AssetId, ResourceRecord>,
    area_duplicates: BTreeMap<AssetId, bool>,
    skipped: Vec<PathBuf>,
    failed: Vec<PathBuf>,
}

impl ResourceIndex {
    /// An empty index for `game`.
    pub fn new(game: Game) -> Self {
        Self {
            game,
            packages: Vec::new(),
            resources: BTreeMap::new(),
            area_duplicates: BTreeMap::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Index every package in `paths`.
    ///
    /// A package that can't be opened is skipped; one that fails to parse is
    /// recorded as failed. Neither stops the others.
    pub fn from_paths<I, P>(game: Game, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        sort_paks(&mut paths);

        let mut index = Self::new(game);
        for path in paths {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping package");
                    index.skipped.push(path);
                    continue;
                }
            };
            match Pak::parse(&mut BufReader::new(file), game, &path) {
                Ok(pak) => index.add_pak(pak),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to parse package");
                    index.failed.push(path);
                }
            }
        }
        index
    }

    /// Index every `.pak` file under `dir`, descending into subdirectories.
    pub fn scan_dir(game: Game, dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pak")) {
                    paths.push(path);
                }
            }
        }
        Ok(Self::from_paths(game, paths))
    }

    /// Merge a parsed package; ids already indexed keep their first record,
    /// area flags take the newest value.
    pub fn add_pak(&mut self, pak: Pak) {
        let mut added = 0usize;
        for record in pak.records {
            if let Entry::Vacant(slot) = self.resources.entry(record.id) {
                slot.insert(record);
                added += 1;
            }
        }
        for (area, flag) in pak.area_duplicates {
            self.area_duplicates.insert(area, flag);
        }
        debug!(pak = %pak.package.name, added, "indexed package");
        self.packages.push(pak.package);
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn find_resource(&self, id: AssetId) -> Option<&ResourceRecord> {
        self.resources.get(&id)
    }

    /// Records in id order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.resources.values()
    }

    /// Packages in the order they were indexed.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Whether area `id` may share resources with earlier areas.
    pub fn area_allows_duplicates(&self, id: AssetId) -> Option<bool> {
        self.area_duplicates.get(&id).copied()
    }

    /// Packages that couldn't be opened.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Packages that failed to parse.
    pub fn failed(&self) -> &[PathBuf] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// By upper-cased file name, full path as tiebreaker. Upper-casing puts `_`
/// after letters, so `AB.pak` comes before `A_B.pak`.
fn sort_paks(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        (name, p.clone())
    });
}
