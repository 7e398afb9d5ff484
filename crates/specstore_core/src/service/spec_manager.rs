//! Registry wiring one entity manager per entity type.
//!
//! # Responsibility
//! - Build the shared file store, counter store and draft store once per root.
//! - Expose each typed manager by name and offer type-erased dispatch.
//!
//! # Invariants
//! - All managers share one `MetadataStore`, so one metadata cache per root.
//! - No cross-entity rules live here; this is composition only.

use crate::config::StoreConfig;
use crate::model::entity::{AnyEntity, SpecEntity};
use crate::model::entity_type::EntityType;
use crate::model::kinds::{
    BusinessRequirement, Component, Constitution, Decision, Milestone, Plan,
    TechnicalRequirement,
};
use crate::repo::draft_repo::DraftStore;
use crate::repo::entity_repo::EntityManager;
use crate::repo::{RepoError, RepoResult};
use crate::service::migration::{migrate_legacy_metadata, MigrationOutcome};
use crate::storage::{IdAllocator, MetadataStore, YamlStore};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs `$body` with `$manager` bound to the typed manager for `$entity_type`.
macro_rules! with_manager {
    ($specs:expr, $entity_type:expr, |$manager:ident| $body:expr) => {
        match $entity_type {
            EntityType::BusinessRequirement => {
                let $manager = &$specs.business_requirements;
                $body
            }
            EntityType::TechnicalRequirement => {
                let $manager = &$specs.technical_requirements;
                $body
            }
            EntityType::Plan => {
                let $manager = &$specs.plans;
                $body
            }
            EntityType::Component => {
                let $manager = &$specs.components;
                $body
            }
            EntityType::Constitution => {
                let $manager = &$specs.constitutions;
                $body
            }
            EntityType::Decision => {
                let $manager = &$specs.decisions;
                $body
            }
            EntityType::Milestone => {
                let $manager = &$specs.milestones;
                $body
            }
        }
    };
}

/// Composition root over one specs folder.
pub struct SpecManager {
    root: PathBuf,
    metadata: Arc<MetadataStore>,
    drafts: DraftStore,
    business_requirements: EntityManager<BusinessRequirement>,
    technical_requirements: EntityManager<TechnicalRequirement>,
    plans: EntityManager<Plan>,
    components: EntityManager<Component>,
    constitutions: EntityManager<Constitution>,
    decisions: EntityManager<Decision>,
    milestones: EntityManager<Milestone>,
}

impl SpecManager {
    /// Builds the registry for `root`. Nothing touches disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store = YamlStore::new(root.clone());
        let metadata = Arc::new(MetadataStore::new(&root));
        let drafts = DraftStore::new(store.clone());
        let ids: Arc<dyn IdAllocator> = metadata.clone();

        Self {
            business_requirements: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            technical_requirements: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            plans: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            components: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            constitutions: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            decisions: EntityManager::new(store.clone(), ids.clone(), drafts.clone()),
            milestones: EntityManager::new(store, ids, drafts.clone()),
            root,
            metadata,
            drafts,
        }
    }

    pub fn open(config: &StoreConfig) -> Self {
        Self::new(config.specs_root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn business_requirements(&self) -> &EntityManager<BusinessRequirement> {
        &self.business_requirements
    }

    pub fn technical_requirements(&self) -> &EntityManager<TechnicalRequirement> {
        &self.technical_requirements
    }

    pub fn plans(&self) -> &EntityManager<Plan> {
        &self.plans
    }

    pub fn components(&self) -> &EntityManager<Component> {
        &self.components
    }

    pub fn constitutions(&self) -> &EntityManager<Constitution> {
        &self.constitutions
    }

    pub fn decisions(&self) -> &EntityManager<Decision> {
        &self.decisions
    }

    pub fn milestones(&self) -> &EntityManager<Milestone> {
        &self.milestones
    }

    /// Creates every entity folder. Order does not matter; each call is
    /// idempotent, so a partial failure can simply be retried.
    pub fn ensure_folders(&self) -> RepoResult<()> {
        for entity_type in EntityType::ALL {
            with_manager!(self, entity_type, |manager| manager.ensure_folder())?;
        }
        info!(
            "event=folders_ensure module=spec_manager status=ok root={}",
            self.root.display()
        );
        Ok(())
    }

    /// Prepares a specs root for use: folders plus legacy counter migration.
    pub fn initialize(&self) -> RepoResult<MigrationOutcome> {
        self.ensure_folders()?;
        Ok(migrate_legacy_metadata(self)?)
    }

    pub fn get_any(&self, entity_type: EntityType, number: u32) -> RepoResult<Option<AnyEntity>> {
        with_manager!(self, entity_type, |manager| Ok(manager
            .get(number)?
            .map(SpecEntity::into_any)))
    }

    pub fn list_any(&self, entity_type: EntityType) -> RepoResult<Vec<AnyEntity>> {
        with_manager!(self, entity_type, |manager| Ok(manager
            .list()?
            .into_iter()
            .map(SpecEntity::into_any)
            .collect()))
    }

    pub fn delete_any(&self, entity_type: EntityType, number: u32) -> RepoResult<()> {
        with_manager!(self, entity_type, |manager| manager.delete_entity(number))
    }

    /// Promotes an envelope draft through the manager of its stored type.
    pub fn promote_draft(&self, draft_id: &str) -> RepoResult<AnyEntity> {
        let envelope = self
            .drafts
            .load(draft_id)?
            .ok_or_else(|| RepoError::DraftNotFound(draft_id.to_string()))?;
        with_manager!(self, envelope.entity_type, |manager| Ok(manager
            .promote_draft(draft_id)?
            .into_any()))
    }
}
