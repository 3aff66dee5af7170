//! Loading, caching and batch extraction of indexed resources.
//!
//! [`ResourceStore`] is the context object decoders receive when they need
//! to resolve other resources; nothing in the crate reaches for a global
//! store.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::compression::read_payload;
use crate::formats::anim::Animation;
use crate::formats::deps::read_dependencies;
use crate::formats::pak::ResourceRecord;
use crate::formats::txtr::{Texture, TextureOptions};
use crate::index::ResourceIndex;
use crate::types::{AssetId, FourCC};
use crate::{Error, Result};

/// A decoded resource.
#[derive(Debug, Clone)]
pub enum Resource {
    Texture(Texture),
    Animation(Animation),
    /// Any type without a decoder, as its cooked bytes. `dependencies` is
    /// filled for types with a dependency reader and empty otherwise.
    Raw {
        kind: FourCC,
        data: Vec<u8>,
        dependencies: Vec<AssetId>,
    },
}

impl Resource {
    pub fn kind(&self) -> FourCC {
        match self {
            Resource::Texture(_) => FourCC::TXTR,
            Resource::Animation(_) => FourCC::ANIM,
            Resource::Raw { kind, .. } => *kind,
        }
    }

    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Resource::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_animation(&self) -> Option<&Animation> {
        match self {
            Resource::Animation(a) => Some(a),
            _ => None,
        }
    }

    /// Ids of the resources this one references.
    pub fn dependencies(&self) -> Vec<AssetId> {
        match self {
            Resource::Texture(_) => Vec::new(),
            Resource::Animation(a) => a.event_data.into_iter().collect(),
            Resource::Raw { dependencies, .. } => dependencies.clone(),
        }
    }
}

/// Resolves resource ids for decoders that reference other resources.
pub trait ResourceLookup {
    fn find_resource(&self, id: AssetId) -> Option<&ResourceRecord>;

    fn load(&self, id: AssetId) -> Result<Arc<Resource>>;
}

/// Options for [`ResourceStore::extract`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
}

/// Outcome of a batch extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub written: usize,
    pub failed: usize,
    /// Resources never started because the batch was cancelled.
    pub cancelled: usize,
}

type Slot = Arc<Mutex<Option<Arc<Resource>>>>;

/// Decodes resources from a [`ResourceIndex`] on demand.
///
/// Each id is decoded at most once; concurrent requests for the same id wait
/// for the first and share its result.
pub struct ResourceStore {
    index: ResourceIndex,
    texture_options: TextureOptions,
    cache: Mutex<HashMap<AssetId, Slot>>,
}

impl ResourceStore {
    pub fn new(index: ResourceIndex) -> Self {
        Self {
            index,
            texture_options: TextureOptions::default(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_texture_options(mut self, options: TextureOptions) -> Self {
        self.texture_options = options;
        self
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    /// Cooked (decompressed) bytes of a resource.
    pub fn read_raw(&self, id: AssetId) -> Result<Vec<u8>> {
        let record = self.index.find_resource(id).ok_or(Error::ResourceNotFound(id))?;
        read_record(record, &self.index)
    }

    /// Decoded resource if it has already been loaded.
    pub fn cached(&self, id: AssetId) -> Option<Arc<Resource>> {
        let slot = self.cache.lock().get(&id).cloned()?;
        slot.lock().clone()
    }

    fn decode(&self, id: AssetId) -> Result<Resource> {
        let record = self.index.find_resource(id).ok_or(Error::ResourceNotFound(id))?;
        let data = read_record(record, &self.index)?;
        let resource = match record.kind {
            FourCC::TXTR => Resource::Texture(Texture::decode(&data, self.texture_options)?),
            FourCC::ANIM => {
                Resource::Animation(Animation::decode(&data, Some(self.index.game()), self)?)
            }
            kind => {
                let dependencies = read_dependencies(kind, &data)?.unwrap_or_default();
                Resource::Raw {
                    kind,
                    data,
                    dependencies,
                }
            }
        };
        Ok(resource)
    }

    /// Write every indexed resource's cooked bytes to `<out_dir>/<ID>.<type>`.
    ///
    /// `cancel` is checked before each resource starts; resources already in
    /// flight finish. Failures are logged and counted.
    pub fn extract(&self, out_dir: &Path, options: &ExtractOptions, cancel: &AtomicBool) -> Result<ExtractReport> {
        let _span = info_span!("extract", out = %out_dir.display()).entered();
        fs::create_dir_all(out_dir)?;

        let records: Vec<&ResourceRecord> = self.index.records().collect();
        let written = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let cancelled = AtomicUsize::new(0);

        let run = || {
            records.par_iter().for_each(|record| {
                if cancel.load(Ordering::Relaxed) {
                    cancelled.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                match self.extract_one(record, out_dir) {
                    Ok(path) => {
                        debug!(id = %record.id, path = %path.display(), "extracted");
                        written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(id = %record.id, kind = %record.kind, error = %e, "extraction failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        };

        match options.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?
                .install(run),
            None => run(),
        }

        let report = ExtractReport {
            written: written.into_inner(),
            failed: failed.into_inner(),
            cancelled: cancelled.into_inner(),
        };
        info!(
            written = report.written,
            failed = report.failed,
            cancelled = report.cancelled,
            "extraction finished"
        );
        Ok(report)
    }

    fn extract_one(&self, record: &ResourceRecord, out_dir: &Path) -> Result<PathBuf> {
        let data = read_record(record, &self.index)?;
        let path = out_dir.join(format!("{}.{}", record.id, record.kind.extension()));
        fs::write(&path, data)?;
        Ok(path)
    }
}

impl ResourceLookup for ResourceStore {
    fn find_resource(&self, id: AssetId) -> Option<&ResourceRecord> {
        self.index.find_resource(id)
    }

    fn load(&self, id: AssetId) -> Result<Arc<Resource>> {
        let slot = self.cache.lock().entry(id).or_default().clone();
        let mut guard = slot.lock();
        if let Some(resource) = guard.as_ref() {
            return Ok(resource.clone());
        }

        let resource = Arc::new(self.decode(id).inspect_err(|e| {
            warn!(%id, error = %e, "failed to load resource");
        })?);
        *guard = Some(resource.clone());
        Ok(resource)
    }
}

fn read_record(record: &ResourceRecord, index: &ResourceIndex) -> Result<Vec<u8>> {
    let mut file = BufReader::new(File::open(&record.pak_path)?);
    read_payload(&mut file, record, index.game())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::formats::pak::tests::PakBuilder;
    use crate::game::Game;

    /// Legacy package holding a 1×1 I8 texture (id 1), a raw `STRG` (id 2)
    /// and an `EVNT` (id 3) with one effect referencing id 0x10.
    fn write_pak(dir: &Path) -> PathBuf {
        let mut texture = 1u32.to_be_bytes().to_vec();
        texture.extend([0, 1, 0, 1, 0, 0, 0, 1]);
        texture.extend([0x7Fu8; 32]);
        let strings = b"hello".to_vec();

        let mut events = PakBuilder::default();
        events.u32(1).u32(0).u32(0).u32(1);
        events.bytes(&[0, 0]).bytes(b"fx\0").bytes(&[0; 0x23]).u32(0x10).bytes(b"\0").bytes(&[0; 8]);
        let events = events.buf;

        let table_len = 4 + 4 + 4 + 4 + 3 * 20;
        let mut offset = table_len;
        let mut b = PakBuilder::default();
        b.u32(0x0003_0005).u32(0).u32(0).u32(3);
        for (kind, id, data) in [(b"TXTR", 1, &texture), (b"STRG", 2, &strings), (b"EVNT", 3, &events)] {
            b.u32(0).tag(kind).u32(id).u32(data.len() as u32).u32(offset);
            offset += data.len() as u32;
        }
        assert_eq!(b.buf.len() as u32, table_len);
        b.bytes(&texture).bytes(&strings).bytes(&events);

        let path = dir.join("Test.pak");
        File::create(&path).unwrap().write_all(&b.buf).unwrap();
        path
    }

    #[test]
    fn load_decodes_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let pak = write_pak(dir.path());
        let store = ResourceStore::new(ResourceIndex::from_paths(Game::Prime, [pak]));

        assert!(store.cached(AssetId(1)).is_none());
        let first = store.load(AssetId(1)).unwrap();
        let texture = first.as_texture().unwrap();
        assert_eq!(texture.mips[0].data, [0x7F]);

        let second = store.load(AssetId(1)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.cached(AssetId(1)).is_some());

        let raw = store.load(AssetId(2)).unwrap();
        assert_eq!(raw.kind(), FourCC::STRG);
        assert!(matches!(&*raw, Resource::Raw { data, .. } if data == b"hello"));
        assert!(raw.dependencies().is_empty());

        let events = store.load(AssetId(3)).unwrap();
        assert_eq!(events.kind(), FourCC::EVNT);
        assert_eq!(events.dependencies(), [AssetId(0x10)]);

        assert!(matches!(store.load(AssetId(9)), Err(Error::ResourceNotFound(_))));
    }

    #[test]
    fn extract_writes_every_resource() {
        let dir = tempfile::tempdir().unwrap();
        let pak = write_pak(dir.path());
        let store = ResourceStore::new(ResourceIndex::from_paths(Game::Prime, [pak]));
        let out = dir.path().join("out");

        let options = ExtractOptions { threads: Some(2) };
        let report = store.extract(&out, &options, &AtomicBool::new(false)).unwrap();
        assert_eq!(
            report,
            ExtractReport {
                written: 3,
                failed: 0,
                cancelled: 0
            }
        );
        assert_eq!(fs::read(out.join("00000002.strg")).unwrap(), b"hello");
        assert!(out.join("00000001.txtr").is_file());
    }

    #[test]
    fn cancelled_extract_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pak = write_pak(dir.path());
        let store = ResourceStore::new(ResourceIndex::from_paths(Game::Prime, [pak]));
        let out = dir.path().join("out");

        let report = store
            .extract(&out, &ExtractOptions::default(), &AtomicBool::new(true))
            .unwrap();
        assert_eq!(report.cancelled, 3);
        assert_eq!(report.written, 0);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
