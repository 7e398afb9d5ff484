//! Envelope drafts for the guided creation flow.
//!
//! # Responsibility
//! - Persist partial entity data plus free-form drafter state under
//!   `.drafts/draft-NNN.yaml`.
//! - Clean up envelopes once their content has become a real entity.
//!
//! # Invariants
//! - Envelope data is never schema-validated here; it is not an entity yet.
//! - Envelope ids are local to the drafts folder and never consume entity
//!   numbers from the counter store.
//! - Flagged drafts (`draft: true` entities) are unrelated and never read
//!   or written by this module.

use crate::model::entity_type::EntityType;
use crate::repo::{RepoError, RepoResult};
use crate::storage::YamlStore;
use chrono::{DateTime, Utc};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use uuid::Uuid;

/// Folder (relative to the specs root) holding envelope drafts.
pub const DRAFTS_FOLDER: &str = ".drafts";
/// Extension of envelope files.
pub const DRAFT_EXTENSION: &str = "yaml";

static DRAFT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^draft-(\d{3,})$").expect("valid draft id regex"));

/// In-progress entity state owned by the drafting workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEnvelope {
    pub id: String,
    pub entity_type: EntityType,
    /// Identifies the drafting session that produced this envelope.
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Accumulated entity fields; may be incomplete or invalid.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Opaque state of the question/answer flow.
    #[serde(default)]
    pub drafter_state: Value,
}

/// Envelope draft persistence shared by every entity manager.
#[derive(Debug, Clone)]
pub struct DraftStore {
    store: YamlStore,
}

impl DraftStore {
    pub fn new(store: YamlStore) -> Self {
        Self { store }
    }

    /// Saves a new envelope, or rewrites `draft_id` when given.
    ///
    /// Rewrites keep `created_at` and `session_id` of the stored envelope.
    pub fn save(
        &self,
        entity_type: EntityType,
        draft_id: Option<&str>,
        data: Map<String, Value>,
        drafter_state: Value,
    ) -> RepoResult<DraftEnvelope> {
        let now = Utc::now();
        let envelope = match draft_id {
            Some(id) => {
                let existing = self
                    .load(id)?
                    .ok_or_else(|| RepoError::DraftNotFound(id.to_string()))?;
                if existing.entity_type != entity_type {
                    return Err(RepoError::DraftTypeMismatch {
                        draft_id: id.to_string(),
                        expected: entity_type,
                        actual: existing.entity_type,
                    });
                }
                DraftEnvelope {
                    data,
                    drafter_state,
                    updated_at: now,
                    ..existing
                }
            }
            None => DraftEnvelope {
                id: self.next_draft_id()?,
                entity_type,
                session_id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
                data,
                drafter_state,
            },
        };

        self.store
            .write_yaml(Self::path_for(&envelope.id), &envelope)?;
        info!(
            "event=draft_save module=drafts status=ok draft_id={} entity_type={}",
            envelope.id, envelope.entity_type
        );
        Ok(envelope)
    }

    /// Loads one envelope. Missing or unreadable envelopes are `None`.
    pub fn load(&self, draft_id: &str) -> RepoResult<Option<DraftEnvelope>> {
        Self::check_id(draft_id)?;
        let path = Self::path_for(draft_id);
        if !self.store.exists(&path) {
            return Ok(None);
        }
        match self.store.read_yaml::<DraftEnvelope>(&path) {
            Ok(envelope) if envelope.id == draft_id => Ok(Some(envelope)),
            Ok(envelope) => {
                warn!(
                    "event=draft_skip module=drafts status=skip draft_id={} reason=id_mismatch stored_id={}",
                    draft_id, envelope.id
                );
                Ok(None)
            }
            Err(err) => {
                warn!(
                    "event=draft_skip module=drafts status=skip draft_id={} reason=unreadable error={}",
                    draft_id, err
                );
                Ok(None)
            }
        }
    }

    /// Lists every readable envelope, ordered by id.
    pub fn list(&self) -> RepoResult<Vec<DraftEnvelope>> {
        let mut drafts = Vec::new();
        for stem in self.store.list_files(DRAFTS_FOLDER, DRAFT_EXTENSION)? {
            if !DRAFT_ID_RE.is_match(&stem) {
                continue;
            }
            if let Some(envelope) = self.load(&stem)? {
                drafts.push(envelope);
            }
        }
        drafts.sort_by_key(|envelope| draft_sequence(&envelope.id));
        Ok(drafts)
    }

    pub fn delete(&self, draft_id: &str) -> RepoResult<()> {
        Self::check_id(draft_id)?;
        let path = Self::path_for(draft_id);
        if !self.store.exists(&path) {
            return Err(RepoError::DraftNotFound(draft_id.to_string()));
        }
        self.store.delete(&path)?;
        self.store.remove_empty_dir(DRAFTS_FOLDER);
        info!(
            "event=draft_delete module=drafts status=ok draft_id={}",
            draft_id
        );
        Ok(())
    }

    /// Best-effort removal of a promoted envelope and of any other envelope
    /// of the same type carrying identical data. Never fails.
    pub fn remove_promoted(&self, promoted: &DraftEnvelope) -> usize {
        let mut removed = 0;
        if self.remove_quietly(&promoted.id) {
            removed += 1;
        }

        match self.list() {
            Ok(remaining) => {
                for envelope in remaining {
                    if envelope.entity_type == promoted.entity_type
                        && envelope.data == promoted.data
                        && self.remove_quietly(&envelope.id)
                    {
                        removed += 1;
                    }
                }
            }
            Err(err) => warn!(
                "event=draft_cleanup module=drafts status=error draft_id={} error={}",
                promoted.id, err
            ),
        }

        self.store.remove_empty_dir(DRAFTS_FOLDER);
        removed
    }

    fn remove_quietly(&self, draft_id: &str) -> bool {
        match self.store.delete(Self::path_for(draft_id)) {
            Ok(()) => true,
            Err(err) => {
                if !err.is_not_found() {
                    warn!(
                        "event=draft_cleanup module=drafts status=error draft_id={} error={}",
                        draft_id, err
                    );
                }
                false
            }
        }
    }

    fn next_draft_id(&self) -> RepoResult<String> {
        let highest = self
            .store
            .list_files(DRAFTS_FOLDER, DRAFT_EXTENSION)?
            .iter()
            .filter_map(|stem| draft_sequence(stem))
            .max()
            .unwrap_or(0);
        Ok(format!("draft-{:03}", highest + 1))
    }

    fn check_id(draft_id: &str) -> RepoResult<()> {
        if DRAFT_ID_RE.is_match(draft_id) {
            return Ok(());
        }
        Err(RepoError::InvalidInput(format!(
            "draft id `{draft_id}` must look like `draft-001`"
        )))
    }

    fn path_for(draft_id: &str) -> PathBuf {
        PathBuf::from(DRAFTS_FOLDER).join(format!("{draft_id}.{DRAFT_EXTENSION}"))
    }
}

fn draft_sequence(draft_id: &str) -> Option<u32> {
    DRAFT_ID_RE
        .captures(draft_id)
        .and_then(|captures| captures[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::draft_sequence;

    #[test]
    fn draft_sequence_parses_padded_and_wide_ids() {
        assert_eq!(draft_sequence("draft-007"), Some(7));
        assert_eq!(draft_sequence("draft-1234"), Some(1234));
        assert_eq!(draft_sequence("draft-7"), None);
        assert_eq!(draft_sequence("../draft-001"), None);
    }
}
