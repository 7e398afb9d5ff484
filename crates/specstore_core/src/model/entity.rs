//! Shared entity header and the `SpecEntity` contract.
//!
//! # Responsibility
//! - Define the common header flattened into every persisted entity.
//! - Define the trait the generic entity manager is parameterized by.
//! - Provide a type-erased `AnyEntity` for cross-type consumers.
//!
//! # Invariants
//! - `number` is assigned once and never changes for the entity's lifetime.
//! - Finalized entities always carry a valid slug; flagged drafts may not.
//! - `validate()` is the only schema gate; write paths must call it.

use crate::model::entity_type::EntityType;
use crate::model::identity::is_valid_slug;
use crate::model::kinds::{
    BusinessRequirement, Component, Constitution, Decision, Milestone, Plan,
    TechnicalRequirement,
};
use crate::model::validation::{EntityValidationError, ValidationResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Fields common to every entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Serialized as `type` to match the on-disk schema.
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub number: u32,
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Flagged draft: stored under the slug-less `.draft` file name.
    #[serde(default, skip_serializing_if = "is_false")]
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl EntityMeta {
    /// Composed display ID (`{prefix}-{number}`).
    pub fn id(&self) -> String {
        format!("{}-{}", self.kind.prefix(), self.number)
    }

    /// Checks header rules against the type the caller expects.
    pub fn validate(&self, expected: EntityType) -> ValidationResult {
        if self.kind != expected {
            return Err(EntityValidationError::TypeMismatch {
                expected,
                actual: self.kind,
            });
        }
        if self.number == 0 {
            return Err(EntityValidationError::InvalidNumber(self.number));
        }
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::EmptyName);
        }
        let slug_required = !self.draft;
        if (slug_required || !self.slug.is_empty()) && !is_valid_slug(&self.slug) {
            return Err(EntityValidationError::InvalidSlug(self.slug.clone()));
        }
        if self.updated_at < self.created_at {
            return Err(EntityValidationError::TimestampOrder);
        }
        Ok(())
    }
}

/// One ID-shaped value found in an entity payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceField {
    /// Field path as shown to users, e.g. `depends_on` or `criteria.requirement`.
    pub field: &'static str,
    pub value: String,
}

impl ReferenceField {
    pub(crate) fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Contract implemented by every persisted entity kind.
pub trait SpecEntity: Serialize + DeserializeOwned + Clone + Debug + PartialEq {
    const ENTITY_TYPE: EntityType;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Type-specific payload rules. Header rules are checked by `validate`.
    fn validate_payload(&self) -> ValidationResult;

    /// ID-shaped fields pointing at other entities.
    fn references(&self) -> Vec<ReferenceField>;

    fn into_any(self) -> AnyEntity;

    /// Full schema check: header first, then payload.
    fn validate(&self) -> ValidationResult {
        self.meta().validate(Self::ENTITY_TYPE)?;
        self.validate_payload()
    }

    fn number(&self) -> u32 {
        self.meta().number
    }

    fn slug(&self) -> &str {
        &self.meta().slug
    }

    fn is_draft(&self) -> bool {
        self.meta().draft
    }
}

/// Type-erased entity used by the registry and the reference validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyEntity {
    BusinessRequirement(BusinessRequirement),
    TechnicalRequirement(TechnicalRequirement),
    Plan(Plan),
    Component(Component),
    Constitution(Constitution),
    Decision(Decision),
    Milestone(Milestone),
}

impl AnyEntity {
    pub fn meta(&self) -> &EntityMeta {
        match self {
            Self::BusinessRequirement(entity) => entity.meta(),
            Self::TechnicalRequirement(entity) => entity.meta(),
            Self::Plan(entity) => entity.meta(),
            Self::Component(entity) => entity.meta(),
            Self::Constitution(entity) => entity.meta(),
            Self::Decision(entity) => entity.meta(),
            Self::Milestone(entity) => entity.meta(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.meta().kind
    }

    pub fn number(&self) -> u32 {
        self.meta().number
    }

    pub fn references(&self) -> Vec<ReferenceField> {
        match self {
            Self::BusinessRequirement(entity) => entity.references(),
            Self::TechnicalRequirement(entity) => entity.references(),
            Self::Plan(entity) => entity.references(),
            Self::Component(entity) => entity.references(),
            Self::Constitution(entity) => entity.references(),
            Self::Decision(entity) => entity.references(),
            Self::Milestone(entity) => entity.references(),
        }
    }
}
