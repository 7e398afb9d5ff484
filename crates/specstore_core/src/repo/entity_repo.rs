//! Generic CRUD engine for one entity type.
//!
//! # Responsibility
//! - Create, read, update, delete and list entities of type `T` as YAML files.
//! - Enforce numbering through the counter store and schema validation
//!   through `SpecEntity::validate` on every write.
//! - Expose the envelope draft lifecycle scoped to `T`.
//!
//! # Invariants
//! - `create` allocates numbers only via `IdAllocator::next_id`.
//! - `number` never changes after creation; update input cannot override it.
//! - Reads discard unparsable or invalid files explicitly (logged as
//!   `entity_skip`) and report them as absent.
//! - A write that fails validation leaves disk state untouched.
//! - When an update changes the file name (slug or draft flag), exactly one
//!   file remains for the number afterwards.
//!
//! # See also
//! - `repo::naming` for the file-name contract.

use crate::model::entity::SpecEntity;
use crate::model::entity_type::EntityType;
use crate::model::identity::slugify;
use crate::model::validation::EntityValidationError;
use crate::repo::draft_repo::{DraftEnvelope, DraftStore};
use crate::repo::naming::{FileNaming, ParsedFileName, ENTITY_EXTENSION};
use crate::repo::{RepoError, RepoResult};
use crate::storage::{IdAllocator, YamlStore};
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

/// One entity file discovered in the type folder.
#[derive(Debug, Clone)]
struct LocatedFile {
    stem: String,
    parsed: ParsedFileName,
}

impl LocatedFile {
    /// Lower rank is preferred when several files claim one number:
    /// canonical finalized, then alias finalized, then drafts.
    fn rank(&self, entity_type: EntityType) -> u8 {
        let canonical = self.parsed.prefix() == entity_type.prefix();
        match (self.parsed.is_draft(), canonical) {
            (false, true) => 0,
            (false, false) => 1,
            (true, true) => 2,
            (true, false) => 3,
        }
    }
}

/// File-backed manager for entities of type `T`.
pub struct EntityManager<T: SpecEntity> {
    store: YamlStore,
    ids: Arc<dyn IdAllocator>,
    drafts: DraftStore,
    naming: FileNaming,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SpecEntity> EntityManager<T> {
    pub fn new(store: YamlStore, ids: Arc<dyn IdAllocator>, drafts: DraftStore) -> Self {
        Self {
            store,
            ids,
            drafts,
            naming: FileNaming::new(T::ENTITY_TYPE),
            _entity: PhantomData,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        T::ENTITY_TYPE
    }

    pub fn naming(&self) -> &FileNaming {
        &self.naming
    }

    /// Creates this type's folder. Idempotent.
    pub fn ensure_folder(&self) -> RepoResult<()> {
        self.store.ensure_folder(self.naming.folder())?;
        Ok(())
    }

    /// Loads entity `number`, preferring the finalized file over a draft.
    ///
    /// Returns `Ok(None)` when no file exists or every candidate fails to
    /// parse or validate. `Err` is reserved for failing to list the folder.
    pub fn get(&self, number: u32) -> RepoResult<Option<T>> {
        let candidates = self.candidates_for(number)?;
        Ok(candidates
            .iter()
            .find_map(|file| self.load_file(file).map(|(entity, _)| entity)))
    }

    /// Loads the finalized entity whose file name carries `slug`.
    pub fn get_by_slug(&self, slug: &str) -> RepoResult<Option<T>> {
        let mut matches: Vec<LocatedFile> = self
            .scan()?
            .into_iter()
            .filter(|file| file.parsed.slug() == Some(slug))
            .collect();
        matches.sort_by_key(|file| (file.parsed.number(), file.rank(T::ENTITY_TYPE)));
        Ok(matches
            .iter()
            .find_map(|file| self.load_file(file).map(|(entity, _)| entity)))
    }

    /// Validates and writes a new entity from loose field data.
    ///
    /// `number`, when present in `data`, is ignored. Without
    /// `explicit_number` the number comes from the counter store, which is
    /// only consulted after validation succeeds.
    pub fn create(&self, data: Value, explicit_number: Option<u32>) -> RepoResult<T> {
        let mut fields = into_object(data)?;
        let now = timestamp_now();
        fields.insert(
            "type".to_string(),
            Value::String(T::ENTITY_TYPE.as_str().to_string()),
        );
        fields
            .entry("created_at".to_string())
            .or_insert_with(|| Value::String(now.clone()));
        fields
            .entry("updated_at".to_string())
            .or_insert_with(|| Value::String(now));
        fill_missing_slug(&mut fields);
        fields.insert(
            "number".to_string(),
            Value::from(explicit_number.unwrap_or(1)),
        );

        let mut entity = deserialize_entity::<T>(fields)?;
        entity.validate()?;
        self.ensure_slug_available(&entity, None)?;

        let number = match explicit_number {
            Some(number) => {
                self.ensure_number_free(number)?;
                number
            }
            None => {
                let number = self.ids.next_id(T::ENTITY_TYPE)?;
                if let Err(err) = self.ensure_number_free(number) {
                    warn!(
                        "event=entity_create module=entity_repo status=error entity_type={} number={} reason=counter_behind_files hint=run_migrate",
                        T::ENTITY_TYPE, number
                    );
                    return Err(err);
                }
                number
            }
        };
        entity.meta_mut().number = number;

        let path = self.naming.path_for(entity.meta());
        self.store.write_yaml(&path, &entity)?;
        info!(
            "event=entity_create module=entity_repo status=ok entity_type={} number={} draft={} path={}",
            T::ENTITY_TYPE,
            number,
            entity.is_draft(),
            path.display()
        );
        Ok(entity)
    }

    /// Shallow-merges `partial` over the stored entity and rewrites it.
    ///
    /// Renames the file when the slug or draft flag changes. The stored
    /// number always wins over any `number` in `partial`.
    pub fn update(&self, number: u32, partial: Value) -> RepoResult<T> {
        let patch = into_object(partial)?;
        let (existing, old_file) = self.find_valid(number)?.ok_or(RepoError::NotFound {
            entity_type: T::ENTITY_TYPE,
            number,
        })?;

        let mut fields = match serde_json::to_value(&existing) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(RepoError::InvalidInput(
                    "stored entity did not serialize to an object".to_string(),
                ))
            }
            Err(err) => return Err(EntityValidationError::Schema(err.to_string()).into()),
        };
        for (key, value) in patch {
            fields.insert(key, value);
        }
        fields.insert("number".to_string(), Value::from(number));
        fields.insert("updated_at".to_string(), Value::String(timestamp_now()));

        let updated = deserialize_entity::<T>(fields)?;
        updated.validate()?;
        self.ensure_slug_available(&updated, Some(number))?;

        let old_path = self.naming.path_for_stem(&old_file.stem);
        let new_path = self.naming.path_for(updated.meta());
        self.store.write_yaml(&new_path, &updated)?;
        if old_path != new_path {
            if let Err(err) = self.store.delete(&old_path) {
                // Keep a single file per number: undo the new write.
                if let Err(rollback) = self.store.delete(&new_path) {
                    warn!(
                        "event=entity_update module=entity_repo status=error entity_type={} number={} reason=rollback_failed error={}",
                        T::ENTITY_TYPE, number, rollback
                    );
                }
                return Err(err.into());
            }
        }

        info!(
            "event=entity_update module=entity_repo status=ok entity_type={} number={} renamed={} path={}",
            T::ENTITY_TYPE,
            number,
            old_path != new_path,
            new_path.display()
        );
        Ok(updated)
    }

    /// Removes entity `number`. Its number is never handed out again.
    pub fn delete_entity(&self, number: u32) -> RepoResult<()> {
        let (_, file) = self.find_valid(number)?.ok_or(RepoError::NotFound {
            entity_type: T::ENTITY_TYPE,
            number,
        })?;
        let path = self.naming.path_for_stem(&file.stem);
        self.store.delete(&path)?;
        info!(
            "event=entity_delete module=entity_repo status=ok entity_type={} number={} path={}",
            T::ENTITY_TYPE,
            number,
            path.display()
        );
        Ok(())
    }

    /// Every valid entity of this type, ascending by number.
    pub fn list(&self) -> RepoResult<Vec<T>> {
        let mut by_number: BTreeMap<u32, Vec<LocatedFile>> = BTreeMap::new();
        for file in self.scan()? {
            by_number.entry(file.parsed.number()).or_default().push(file);
        }

        let mut entities = Vec::with_capacity(by_number.len());
        for (_, mut candidates) in by_number {
            candidates.sort_by_key(|file| file.rank(T::ENTITY_TYPE));
            if let Some((entity, _)) = candidates.iter().find_map(|file| self.load_file(file)) {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Whether a finalized file for `number` exists (no deserialization).
    pub fn entity_exists(&self, number: u32) -> RepoResult<bool> {
        Ok(self
            .scan()?
            .iter()
            .any(|file| file.parsed.number() == number && !file.parsed.is_draft()))
    }

    /// Whether a flagged-draft file for `number` exists (no deserialization).
    pub fn draft_exists(&self, number: u32) -> RepoResult<bool> {
        Ok(self
            .scan()?
            .iter()
            .any(|file| file.parsed.number() == number && file.parsed.is_draft()))
    }

    /// Saves an envelope draft of this type (new when `draft_id` is `None`).
    pub fn save_draft(
        &self,
        draft_id: Option<&str>,
        data: Map<String, Value>,
        drafter_state: Value,
    ) -> RepoResult<DraftEnvelope> {
        self.drafts
            .save(T::ENTITY_TYPE, draft_id, data, drafter_state)
    }

    /// Loads an envelope draft; envelopes of other types read as `None`.
    pub fn load_draft(&self, draft_id: &str) -> RepoResult<Option<DraftEnvelope>> {
        Ok(self
            .drafts
            .load(draft_id)?
            .filter(|envelope| envelope.entity_type == T::ENTITY_TYPE))
    }

    pub fn list_drafts(&self) -> RepoResult<Vec<DraftEnvelope>> {
        Ok(self
            .drafts
            .list()?
            .into_iter()
            .filter(|envelope| envelope.entity_type == T::ENTITY_TYPE)
            .collect())
    }

    pub fn delete_draft(&self, draft_id: &str) -> RepoResult<()> {
        if self.load_draft(draft_id)?.is_none() {
            return Err(RepoError::DraftNotFound(draft_id.to_string()));
        }
        self.drafts.delete(draft_id)
    }

    /// Turns an envelope draft into a real entity through `create`.
    ///
    /// The envelope (and identical envelopes of this type) are removed
    /// afterwards on a best-effort basis; cleanup failures do not undo the
    /// created entity.
    pub fn promote_draft(&self, draft_id: &str) -> RepoResult<T> {
        let envelope = self
            .drafts
            .load(draft_id)?
            .ok_or_else(|| RepoError::DraftNotFound(draft_id.to_string()))?;
        if envelope.entity_type != T::ENTITY_TYPE {
            return Err(RepoError::DraftTypeMismatch {
                draft_id: draft_id.to_string(),
                expected: T::ENTITY_TYPE,
                actual: envelope.entity_type,
            });
        }

        let entity = self.create(Value::Object(envelope.data.clone()), None)?;
        let removed = self.drafts.remove_promoted(&envelope);
        info!(
            "event=draft_promote module=entity_repo status=ok draft_id={} entity_type={} number={} drafts_removed={}",
            draft_id,
            T::ENTITY_TYPE,
            entity.number(),
            removed
        );
        Ok(entity)
    }

    fn scan(&self) -> RepoResult<Vec<LocatedFile>> {
        Ok(self
            .store
            .list_files(self.naming.folder(), ENTITY_EXTENSION)?
            .into_iter()
            .filter_map(|stem| {
                self.naming
                    .parse_owned(&stem)
                    .map(|parsed| LocatedFile { stem, parsed })
            })
            .collect())
    }

    fn candidates_for(&self, number: u32) -> RepoResult<Vec<LocatedFile>> {
        let mut candidates: Vec<LocatedFile> = self
            .scan()?
            .into_iter()
            .filter(|file| file.parsed.number() == number)
            .collect();
        candidates.sort_by_key(|file| file.rank(T::ENTITY_TYPE));
        Ok(candidates)
    }

    fn find_valid(&self, number: u32) -> RepoResult<Option<(T, LocatedFile)>> {
        let candidates = self.candidates_for(number)?;
        Ok(candidates.iter().find_map(|file| self.load_file(file)))
    }

    /// Reads and validates one file. Any failure is logged and discarded:
    /// a corrupt or foreign file must not break lookups of the others.
    fn load_file(&self, file: &LocatedFile) -> Option<(T, LocatedFile)> {
        let path = self.naming.path_for_stem(&file.stem);
        let entity = match self.store.read_yaml::<T>(&path) {
            Ok(entity) => entity,
            Err(err) => {
                self.log_skip(&path, "unreadable", &err.to_string());
                return None;
            }
        };
        if let Err(err) = entity.validate() {
            self.log_skip(&path, "invalid", &err.to_string());
            return None;
        }
        if entity.number() != file.parsed.number() {
            self.log_skip(&path, "number_mismatch", "file name and content disagree");
            return None;
        }
        Some((entity, file.clone()))
    }

    fn log_skip(&self, path: &Path, reason: &str, detail: &str) {
        warn!(
            "event=entity_skip module=entity_repo status=skip entity_type={} path={} reason={} error={}",
            T::ENTITY_TYPE,
            path.display(),
            reason,
            detail
        );
    }

    fn ensure_slug_available(&self, entity: &T, own_number: Option<u32>) -> RepoResult<()> {
        if entity.is_draft() {
            return Ok(());
        }
        let conflict = self.scan()?.into_iter().find(|file| {
            file.parsed.slug() == Some(entity.slug())
                && Some(file.parsed.number()) != own_number
        });
        match conflict {
            Some(file) => Err(RepoError::DuplicateSlug {
                entity_type: T::ENTITY_TYPE,
                slug: entity.slug().to_string(),
                existing: file.parsed.number(),
            }),
            None => Ok(()),
        }
    }

    fn ensure_number_free(&self, number: u32) -> RepoResult<()> {
        if self.scan()?.iter().any(|file| file.parsed.number() == number) {
            return Err(RepoError::NumberConflict {
                entity_type: T::ENTITY_TYPE,
                number,
            });
        }
        Ok(())
    }
}

fn into_object(value: Value) -> RepoResult<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(RepoError::InvalidInput(format!(
            "entity data must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn deserialize_entity<T: SpecEntity>(fields: Map<String, Value>) -> RepoResult<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|err| EntityValidationError::Schema(err.to_string()).into())
}

/// Derives `slug` from `name` for finalized entities that omit it.
fn fill_missing_slug(fields: &mut Map<String, Value>) {
    let is_draft = matches!(fields.get("draft"), Some(Value::Bool(true)));
    let has_slug = matches!(fields.get("slug"), Some(Value::String(slug)) if !slug.is_empty());
    if is_draft || has_slug {
        return;
    }
    if let Some(Value::String(name)) = fields.get("name") {
        let derived = slugify(name);
        fields.insert("slug".to_string(), Value::String(derived));
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::fill_missing_slug;
    use serde_json::{json, Value};

    fn object(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn slug_is_derived_from_name_when_missing() {
        let mut fields = object(json!({ "name": "User Login Flow" }));
        fill_missing_slug(&mut fields);
        assert_eq!(fields["slug"], json!("user-login-flow"));
    }

    #[test]
    fn explicit_slug_and_drafts_are_left_alone() {
        let mut explicit = object(json!({ "name": "User Login", "slug": "login" }));
        fill_missing_slug(&mut explicit);
        assert_eq!(explicit["slug"], json!("login"));

        let mut draft = object(json!({ "name": "User Login", "draft": true }));
        fill_missing_slug(&mut draft);
        assert!(draft.get("slug").is_none());
    }
}
