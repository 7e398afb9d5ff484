//! `specs.json` counter store: the single source of next entity numbers.
//!
//! # Responsibility
//! - Persist `{ version, lastIds }` and hand out per-type numbers.
//! - Hold the parsed document in an explicit, invalidatable cache.
//!
//! # Invariants
//! - `next_id` is read-increment-write under one lock hold; the new value is
//!   on disk before it is returned, and the cache only moves after the write.
//! - Per-type last IDs never decrease.
//! - There is no inter-process lock: two stores over the same root each
//!   cache their own view and can issue the same number. Call
//!   `invalidate_cache` when another writer may have touched the file.

use crate::model::entity_type::EntityType;
use crate::storage::{StorageError, StorageResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File name of the counter document under the specs root.
pub const METADATA_FILE: &str = "specs.json";
/// Format version written into newly created counter documents.
pub const METADATA_VERSION: &str = "1.0.0";

/// On-disk shape of `specs.json`.
///
/// `last_ids` is keyed by the kebab-case type tag. Unknown tags written by
/// other tool versions are kept and round-tripped untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecsMetadata {
    pub version: String,
    #[serde(rename = "lastIds", default)]
    pub last_ids: BTreeMap<String, u32>,
}

impl Default for SpecsMetadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            last_ids: EntityType::ALL
                .iter()
                .map(|entity_type| (entity_type.as_str().to_string(), 0))
                .collect(),
        }
    }
}

impl SpecsMetadata {
    pub fn last_id(&self, entity_type: EntityType) -> u32 {
        self.last_ids
            .get(entity_type.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Typed view over the known entity types (missing entries read as 0).
    pub fn known_last_ids(&self) -> BTreeMap<EntityType, u32> {
        EntityType::ALL
            .iter()
            .map(|entity_type| (*entity_type, self.last_id(*entity_type)))
            .collect()
    }
}

/// In-memory copy of the counter document owned by one `MetadataStore`.
#[derive(Debug, Default)]
pub struct MetadataCache {
    current: Option<SpecsMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&SpecsMetadata> {
        self.current.as_ref()
    }

    pub fn store(&mut self, metadata: SpecsMetadata) {
        self.current = Some(metadata);
    }

    /// Drops the cached document so the next read goes to disk.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

/// Number allocation seam used by entity managers and the migrator.
pub trait IdAllocator: Send + Sync {
    /// Issues the next number for `entity_type` and persists it.
    fn next_id(&self, entity_type: EntityType) -> StorageResult<u32>;

    /// Returns the last issued number without mutating anything.
    fn last_id(&self, entity_type: EntityType) -> StorageResult<u32>;
}

/// JSON-backed counter store.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    cache: Mutex<MetadataCache>,
}

impl MetadataStore {
    /// Creates a store for `<specs_root>/specs.json`. Nothing is read yet.
    pub fn new(specs_root: impl AsRef<Path>) -> Self {
        Self::with_cache(specs_root, MetadataCache::new())
    }

    /// Creates a store around a caller-provided cache.
    pub fn with_cache(specs_root: impl AsRef<Path>, cache: MetadataCache) -> Self {
        Self {
            path: specs_root.as_ref().join(METADATA_FILE),
            cache: Mutex::new(cache),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the counter document exists on disk.
    pub fn file_exists(&self) -> bool {
        fs::metadata(&self.path).is_ok()
    }

    /// Returns the cached document, loading (or creating) it on first use.
    pub fn load_metadata(&self) -> StorageResult<SpecsMetadata> {
        let mut cache = self.lock_cache();
        let metadata = self.ensure_loaded(&mut cache)?.clone();
        Ok(metadata)
    }

    /// Issues `last + 1` for `entity_type`, persisting before returning.
    pub fn get_next_id(&self, entity_type: EntityType) -> StorageResult<u32> {
        let mut cache = self.lock_cache();
        let mut next = self.ensure_loaded(&mut cache)?.clone();
        let id = next.last_id(entity_type).checked_add(1).ok_or_else(|| {
            StorageError::CounterExhausted {
                path: self.path.clone(),
                entity_type,
            }
        })?;
        next.last_ids.insert(entity_type.as_str().to_string(), id);

        self.persist(&next)?;
        cache.store(next);
        debug!(
            "event=metadata_next_id module=metadata status=ok entity_type={} id={}",
            entity_type, id
        );
        Ok(id)
    }

    pub fn get_last_id(&self, entity_type: EntityType) -> StorageResult<u32> {
        Ok(self.load_metadata()?.last_id(entity_type))
    }

    /// Rewrites only the version tag.
    pub fn update_version(&self, version: &str) -> StorageResult<()> {
        let mut cache = self.lock_cache();
        let mut next = self.ensure_loaded(&mut cache)?.clone();
        next.version = version.to_string();

        self.persist(&next)?;
        cache.store(next);
        info!(
            "event=metadata_version module=metadata status=ok version={}",
            version
        );
        Ok(())
    }

    pub fn invalidate_cache(&self) {
        self.lock_cache().invalidate();
    }

    fn lock_cache(&self) -> MutexGuard<'_, MetadataCache> {
        // A panic while holding the lock cannot leave a half-updated cache:
        // the cache is only replaced after a successful write.
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_loaded<'a>(
        &self,
        cache: &'a mut MutexGuard<'_, MetadataCache>,
    ) -> StorageResult<&'a SpecsMetadata> {
        if !cache.is_loaded() {
            let metadata = self.read_or_create()?;
            cache.store(metadata);
        }
        cache.get().ok_or_else(|| {
            StorageError::io(
                &self.path,
                std::io::Error::new(ErrorKind::Other, "metadata cache empty after load"),
            )
        })
    }

    fn read_or_create(&self) -> StorageResult<SpecsMetadata> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let metadata =
                    serde_json::from_str(&content).map_err(|source| StorageError::Json {
                        path: self.path.clone(),
                        source,
                    })?;
                debug!(
                    "event=metadata_load module=metadata status=ok path={}",
                    self.path.display()
                );
                Ok(metadata)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let metadata = SpecsMetadata::default();
                self.persist(&metadata)?;
                info!(
                    "event=metadata_load module=metadata status=created path={}",
                    self.path.display()
                );
                Ok(metadata)
            }
            Err(err) => Err(StorageError::io(&self.path, err)),
        }
    }

    fn persist(&self, metadata: &SpecsMetadata) -> StorageResult<()> {
        let rendered =
            serde_json::to_string_pretty(metadata).map_err(|source| StorageError::Json {
                path: self.path.clone(),
                source,
            })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
        fs::write(&self.path, format!("{rendered}\n"))
            .map_err(|err| StorageError::io(&self.path, err))
    }
}

impl IdAllocator for MetadataStore {
    fn next_id(&self, entity_type: EntityType) -> StorageResult<u32> {
        self.get_next_id(entity_type)
    }

    fn last_id(&self, entity_type: EntityType) -> StorageResult<u32> {
        self.get_last_id(entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{MetadataCache, SpecsMetadata};
    use crate::model::entity_type::EntityType;

    #[test]
    fn default_document_has_every_type_at_zero() {
        let metadata = SpecsMetadata::default();
        assert_eq!(metadata.version, "1.0.0");
        for entity_type in EntityType::ALL {
            assert_eq!(metadata.last_id(entity_type), 0);
        }
    }

    #[test]
    fn document_uses_camel_case_last_ids_and_tolerates_unknown_tags() {
        let raw = r#"{"version":"1.0.0","lastIds":{"plan":4,"requirement":9}}"#;
        let metadata: SpecsMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.last_id(EntityType::Plan), 4);
        assert_eq!(metadata.last_id(EntityType::Component), 0);
        assert_eq!(metadata.last_ids.get("requirement"), Some(&9));

        let rendered = serde_json::to_string(&metadata).unwrap();
        assert!(rendered.contains("\"lastIds\""));
    }

    #[test]
    fn cache_invalidate_clears_state() {
        let mut cache = MetadataCache::new();
        assert!(!cache.is_loaded());
        cache.store(SpecsMetadata::default());
        assert!(cache.is_loaded());
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
