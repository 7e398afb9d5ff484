//! File-backed store for specification entities.
//! This crate owns entity numbering, file naming and schema-validated CRUD.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{AnyEntity, EntityMeta, ReferenceField, SpecEntity};
pub use model::entity_type::EntityType;
pub use model::identity::{parse_entity_ref, slugify, EntityRef, EntityRefError};
pub use model::kinds::{
    AcceptanceCriterion, Article, BusinessRequirement, Component, ComponentType, Constitution,
    Decision, DecisionStatus, Milestone, MilestoneStatus, Plan, PlanCriteria, PlanTask, Priority,
    TechnicalRequirement,
};
pub use model::validation::EntityValidationError;
pub use repo::draft_repo::{DraftEnvelope, DraftStore};
pub use repo::entity_repo::EntityManager;
pub use repo::{RepoError, RepoResult};
pub use service::migration::{migrate_legacy_metadata, MigrationOutcome, MAX_REPLAYED_NUMBER};
pub use service::reference_validator::{ReferenceValidation, ReferenceValidator};
pub use service::spec_manager::SpecManager;
pub use storage::{
    IdAllocator, MetadataCache, MetadataStore, SpecsMetadata, StorageError, StorageResult,
    YamlStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
