//! Schema validation errors and shared field checks.

use crate::model::entity_type::EntityType;
use crate::model::identity::parse_entity_ref;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Schema rule violated by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// Payload does not deserialize into the entity's shape.
    Schema(String),
    TypeMismatch {
        expected: EntityType,
        actual: EntityType,
    },
    InvalidNumber(u32),
    EmptyName,
    InvalidSlug(String),
    EmptyField(&'static str),
    MissingItems(&'static str),
    DuplicateItemId {
        field: &'static str,
        id: String,
    },
    InvalidReference {
        field: &'static str,
        value: String,
    },
    TimestampOrder,
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(message) => write!(f, "schema violation: {message}"),
            Self::TypeMismatch { expected, actual } => {
                write!(f, "entity type mismatch: expected `{expected}`, got `{actual}`")
            }
            Self::InvalidNumber(number) => write!(f, "entity number must be >= 1, got {number}"),
            Self::EmptyName => write!(f, "name cannot be empty"),
            Self::InvalidSlug(slug) => write!(
                f,
                "invalid slug `{slug}`; expected lowercase alphanumerics separated by single dashes"
            ),
            Self::EmptyField(field) => write!(f, "`{field}` cannot be empty"),
            Self::MissingItems(field) => write!(f, "`{field}` requires at least one item"),
            Self::DuplicateItemId { field, id } => {
                write!(f, "duplicate id `{id}` in `{field}`")
            }
            Self::InvalidReference { field, value } => {
                write!(f, "`{field}` contains invalid reference `{value}`")
            }
            Self::TimestampOrder => write!(f, "updated_at cannot be earlier than created_at"),
        }
    }
}

impl Error for EntityValidationError {}

pub type ValidationResult = Result<(), EntityValidationError>;

pub(crate) fn require_non_empty(value: &str, field: &'static str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(EntityValidationError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn require_unique_ids<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    field: &'static str,
) -> ValidationResult {
    let mut seen = BTreeSet::new();
    for id in ids {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(EntityValidationError::EmptyField(field));
        }
        if !seen.insert(trimmed) {
            return Err(EntityValidationError::DuplicateItemId {
                field,
                id: trimmed.to_string(),
            });
        }
    }
    Ok(())
}

pub(crate) fn require_reference(value: &str, field: &'static str) -> ValidationResult {
    parse_entity_ref(value).map(|_| ()).map_err(|_| {
        EntityValidationError::InvalidReference {
            field,
            value: value.to_string(),
        }
    })
}

pub(crate) fn require_references(values: &[String], field: &'static str) -> ValidationResult {
    values
        .iter()
        .try_for_each(|value| require_reference(value, field))
}
