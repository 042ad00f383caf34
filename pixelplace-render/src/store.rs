//! Persisted rasters keyed by scope and scale.

use crate::error::Result;
use dashmap::DashMap;
use pixelplace_types::{CanvasId, TileKey};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What a raster covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RasterScope {
    Canvas(CanvasId),
    Tile(TileKey),
}

impl RasterScope {
    pub fn canvas_id(&self) -> &CanvasId {
        match self {
            RasterScope::Canvas(id) => id,
            RasterScope::Tile(key) => &key.canvas_id,
        }
    }
}

impl fmt::Display for RasterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterScope::Canvas(id) => write!(f, "{id}"),
            RasterScope::Tile(key) => write!(f, "{key}"),
        }
    }
}

/// Raster store collaborator. Each `(scope, scale)` is independent.
pub trait RasterStore: Send + Sync {
    fn save(&self, scope: &RasterScope, scale: u32, bytes: &[u8]) -> Result<()>;

    fn load(&self, scope: &RasterScope, scale: u32) -> Result<Option<Vec<u8>>>;

    fn exists(&self, scope: &RasterScope, scale: u32) -> Result<bool>;

    /// Remove every raster of a canvas, tiles included.
    fn delete_all(&self, canvas_id: &CanvasId) -> Result<()>;
}

/// In-memory raster store.
#[derive(Debug, Default)]
pub struct MemoryRasterStore {
    rasters: DashMap<(RasterScope, u32), Vec<u8>>,
    saves: AtomicU64,
}

impl MemoryRasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

impl RasterStore for MemoryRasterStore {
    fn save(&self, scope: &RasterScope, scale: u32, bytes: &[u8]) -> Result<()> {
        self.rasters.insert((scope.clone(), scale), bytes.to_vec());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load(&self, scope: &RasterScope, scale: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .rasters
            .get(&(scope.clone(), scale))
            .map(|bytes| bytes.clone()))
    }

    fn exists(&self, scope: &RasterScope, scale: u32) -> Result<bool> {
        Ok(self.rasters.contains_key(&(scope.clone(), scale)))
    }

    fn delete_all(&self, canvas_id: &CanvasId) -> Result<()> {
        self.rasters
            .retain(|(scope, _), _| scope.canvas_id() != canvas_id);
        Ok(())
    }
}

/// PNG files under a root directory:
///
/// ```text
/// {root}/{canvas}/latest.png              scale 1
/// {root}/{canvas}/latest_{s}x.png
/// {root}/{canvas}/tiles/tile_{tx}_{ty}.png
/// {root}/{canvas}/tiles/tile_{tx}_{ty}_{s}x.png
/// ```
#[derive(Debug, Clone)]
pub struct FsRasterStore {
    root: PathBuf,
}

impl FsRasterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, scope: &RasterScope, scale: u32) -> PathBuf {
        let suffix = if scale == 1 {
            String::new()
        } else {
            format!("_{scale}x")
        };
        match scope {
            RasterScope::Canvas(id) => self
                .root
                .join(id.as_str())
                .join(format!("latest{suffix}.png")),
            RasterScope::Tile(key) => self
                .root
                .join(key.canvas_id.as_str())
                .join("tiles")
                .join(format!("tile_{}_{}{suffix}.png", key.tile_x, key.tile_y)),
        }
    }
}

impl RasterStore for FsRasterStore {
    fn save(&self, scope: &RasterScope, scale: u32, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(scope, scale);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Readers never observe a partially written file.
        let tmp = path.with_extension("png.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved raster");
        Ok(())
    }

    fn load(&self, scope: &RasterScope, scale: u32) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(scope, scale)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, scope: &RasterScope, scale: u32) -> Result<bool> {
        Ok(self.path_for(scope, scale).is_file())
    }

    fn delete_all(&self, canvas_id: &CanvasId) -> Result<()> {
        let dir = self.root.join(canvas_id.as_str());
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tile(tx: u32, ty: u32) -> RasterScope {
        RasterScope::Tile(TileKey::new(CanvasId::new("c1"), tx, ty))
    }

    #[test]
    fn test_fs_layout() {
        let store = FsRasterStore::new("/r");
        let canvas = RasterScope::Canvas(CanvasId::new("c1"));
        assert_eq!(store.path_for(&canvas, 1), PathBuf::from("/r/c1/latest.png"));
        assert_eq!(store.path_for(&canvas, 5), PathBuf::from("/r/c1/latest_5x.png"));
        assert_eq!(store.path_for(&tile(2, 3), 1), PathBuf::from("/r/c1/tiles/tile_2_3.png"));
        assert_eq!(
            store.path_for(&tile(2, 3), 10),
            PathBuf::from("/r/c1/tiles/tile_2_3_10x.png")
        );
    }

    #[test]
    fn test_fs_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsRasterStore::new(dir.path());
        let scope = tile(0, 1);

        assert_eq!(store.load(&scope, 10).unwrap(), None);
        store.save(&scope, 10, b"png").unwrap();
        assert!(store.exists(&scope, 10).unwrap());
        assert!(!store.exists(&scope, 1).unwrap());
        assert_eq!(store.load(&scope, 10).unwrap().as_deref(), Some(&b"png"[..]));

        store.delete_all(&CanvasId::new("c1")).unwrap();
        assert!(!store.exists(&scope, 10).unwrap());
        store.delete_all(&CanvasId::new("c1")).unwrap();
    }

    #[test]
    fn test_memory_delete_all_is_per_canvas() {
        let store = MemoryRasterStore::new();
        store.save(&tile(0, 0), 1, b"a").unwrap();
        store
            .save(&RasterScope::Canvas(CanvasId::new("c1")), 1, b"b")
            .unwrap();
        store
            .save(&RasterScope::Canvas(CanvasId::new("c2")), 1, b"c")
            .unwrap();

        store.delete_all(&CanvasId::new("c1")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.save_count(), 3);
    }
}
