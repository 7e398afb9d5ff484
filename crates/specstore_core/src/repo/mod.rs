//! Repository layer: per-type entity persistence over the storage primitives.
//!
//! # Responsibility
//! - Map entities to canonical file paths and back (`naming`).
//! - Provide the generic CRUD engine for one entity type (`entity_repo`).
//! - Store envelope drafts of the guided creation flow (`draft_repo`).
//!
//! # Invariants
//! - Write paths validate before touching disk and never persist invalid data.
//! - Read paths treat unparsable or schema-invalid files as absent.
//! - Numbers for new entities come only from the counter store.

use crate::model::entity_type::EntityType;
use crate::model::validation::EntityValidationError;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod draft_repo;
pub mod entity_repo;
pub mod naming;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Storage(StorageError),
    NotFound {
        entity_type: EntityType,
        number: u32,
    },
    DraftNotFound(String),
    DuplicateSlug {
        entity_type: EntityType,
        slug: String,
        existing: u32,
    },
    NumberConflict {
        entity_type: EntityType,
        number: u32,
    },
    DraftTypeMismatch {
        draft_id: String,
        expected: EntityType,
        actual: EntityType,
    },
    InvalidInput(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotFound {
                entity_type,
                number,
            } => write!(
                f,
                "{entity_type} not found: {}-{number}",
                entity_type.prefix()
            ),
            Self::DraftNotFound(id) => write!(f, "draft not found: {id}"),
            Self::DuplicateSlug {
                entity_type,
                slug,
                existing,
            } => write!(
                f,
                "slug `{slug}` is already used by {}-{existing}",
                entity_type.prefix()
            ),
            Self::NumberConflict {
                entity_type,
                number,
            } => write!(
                f,
                "{entity_type} number {number} is already taken ({}-{number}); \
                 if the counter issued it, the folder holds unmigrated files: \
                 run `migrate` on new legacy folders, or retry to take the next number",
                entity_type.prefix()
            ),
            Self::DraftTypeMismatch {
                draft_id,
                expected,
                actual,
            } => write!(
                f,
                "draft {draft_id} holds a {actual}, expected a {expected}"
            ),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
