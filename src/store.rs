//! JSON-backed crop store.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::pipeline::{CropEntity, CropStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    // source path -> crop type -> entity
    crops: BTreeMap<String, BTreeMap<String, CropEntity>>,
}

/// Crop entities keyed by image source path and crop type.
///
/// Without a backing file the store lives only in memory; with one, every
/// save rewrites the whole document.
#[derive(Debug, Default)]
pub struct JsonCropStore {
    path: Option<PathBuf>,
    document: Document,
}

impl JsonCropStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "crop store does not exist yet");
                Document::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path: Some(path),
            document,
        })
    }

    pub fn len(&self) -> usize {
        self.document.crops.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.document).map_err(|source| {
            StoreError::Json {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }
}

impl CropStore for JsonCropStore {
    fn find_crop(&self, source_path: &str, crop_type: &str) -> Option<CropEntity> {
        self.document
            .crops
            .get(source_path)
            .and_then(|by_type| by_type.get(crop_type))
            .cloned()
    }

    fn save_crop(&mut self, source_path: &str, crop: CropEntity) -> StoreResult<()> {
        self.document
            .crops
            .entry(source_path.to_string())
            .or_default()
            .insert(crop.crop_type.clone(), crop);
        self.persist()?;
        info!(source = source_path, "crop saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;

    #[test]
    fn finds_by_path_and_type() {
        let mut store = JsonCropStore::in_memory();
        store
            .save_crop("a.png", CropEntity::new("focal_point", 1, 2, 3, 4))
            .unwrap();
        assert!(store.find_crop("a.png", "focal_point").is_some());
        assert!(store.find_crop("a.png", "other").is_none());
        assert!(store.find_crop("b.png", "focal_point").is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crops.json");

        let mut store = JsonCropStore::open(&path).unwrap();
        assert!(store.is_empty());
        let crop = CropEntity::new("focal_point", 400, 300, 200, 200)
            .with_rectangle(Some(Rectangle::new(100, 100, 500, 500)));
        store.save_crop("photo.jpg", crop.clone()).unwrap();

        let reopened = JsonCropStore::open(&path).unwrap();
        assert_eq!(reopened.find_crop("photo.jpg", "focal_point"), Some(crop));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn rejects_corrupt_document() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "not json").unwrap();
        assert!(matches!(
            JsonCropStore::open(file.path()),
            Err(StoreError::Json { .. })
        ));
    }
}
