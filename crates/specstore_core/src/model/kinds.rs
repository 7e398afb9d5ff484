//! Concrete entity kinds and their payload schemas.
//!
//! # Invariants
//! - Every kind flattens `EntityMeta` so top-level YAML keys match the schema.
//! - Payload rules that only make sense for finished work (at least one
//!   criterion, at least one article, a stated decision) are relaxed for
//!   flagged drafts.
//! - Reference fields must parse as entity IDs; resolution is checked elsewhere.

use crate::model::entity::{AnyEntity, EntityMeta, ReferenceField, SpecEntity};
use crate::model::entity_type::EntityType;
use crate::model::validation::{
    require_non_empty, require_reference, require_references, require_unique_ids,
    EntityValidationError, ValidationResult,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    #[default]
    Required,
    Ideal,
    Optional,
}

/// One acceptance criterion on a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub id: String,
    pub description: String,
}

fn validate_criteria(criteria: &[AcceptanceCriterion], draft: bool) -> ValidationResult {
    if criteria.is_empty() && !draft {
        return Err(EntityValidationError::MissingItems("criteria"));
    }
    require_unique_ids(criteria.iter().map(|item| item.id.as_str()), "criteria")?;
    criteria
        .iter()
        .try_for_each(|item| require_non_empty(&item.description, "criteria.description"))
}

fn collect_references(field: &'static str, values: &[String]) -> Vec<ReferenceField> {
    values
        .iter()
        .map(|value| ReferenceField::new(field, value.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRequirement {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SpecEntity for BusinessRequirement {
    const ENTITY_TYPE: EntityType = EntityType::BusinessRequirement;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        validate_criteria(&self.criteria, self.meta.draft)?;
        require_references(&self.depends_on, "depends_on")
    }

    fn references(&self) -> Vec<ReferenceField> {
        collect_references("depends_on", &self.depends_on)
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::BusinessRequirement(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalRequirement {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Components or other requirements this one technically relies on.
    #[serde(default)]
    pub technical_dependencies: Vec<String>,
}

impl SpecEntity for TechnicalRequirement {
    const ENTITY_TYPE: EntityType = EntityType::TechnicalRequirement;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        validate_criteria(&self.criteria, self.meta.draft)?;
        require_references(&self.depends_on, "depends_on")?;
        require_references(&self.technical_dependencies, "technical_dependencies")
    }

    fn references(&self) -> Vec<ReferenceField> {
        let mut references = collect_references("depends_on", &self.depends_on);
        references.extend(collect_references(
            "technical_dependencies",
            &self.technical_dependencies,
        ));
        references
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::TechnicalRequirement(self)
    }
}

/// Link from a plan to the requirement criterion it fulfils.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCriteria {
    pub requirement: String,
    pub criteria: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<PlanCriteria>,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SpecEntity for Plan {
    const ENTITY_TYPE: EntityType = EntityType::Plan;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        if let Some(criteria) = &self.criteria {
            require_reference(&criteria.requirement, "criteria.requirement")?;
            require_non_empty(&criteria.criteria, "criteria.criteria")?;
        }
        require_unique_ids(self.tasks.iter().map(|task| task.id.as_str()), "tasks")?;
        self.tasks
            .iter()
            .try_for_each(|task| require_non_empty(&task.description, "tasks.description"))?;
        require_references(&self.depends_on, "depends_on")
    }

    fn references(&self) -> Vec<ReferenceField> {
        let mut references = Vec::new();
        if let Some(criteria) = &self.criteria {
            references.push(ReferenceField::new(
                "criteria.requirement",
                criteria.requirement.clone(),
            ));
        }
        references.extend(collect_references("depends_on", &self.depends_on));
        references
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::Plan(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    App,
    Service,
    Library,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub component_type: ComponentType,
    /// Repository-relative folder the component lives in.
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SpecEntity for Component {
    const ENTITY_TYPE: EntityType = EntityType::Component;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        self.tech_stack
            .iter()
            .try_for_each(|entry| require_non_empty(entry, "tech_stack"))?;
        require_references(&self.depends_on, "depends_on")
    }

    fn references(&self) -> Vec<ReferenceField> {
        collect_references("depends_on", &self.depends_on)
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::Component(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub principle: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constitution {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl SpecEntity for Constitution {
    const ENTITY_TYPE: EntityType = EntityType::Constitution;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        if self.articles.is_empty() && !self.meta.draft {
            return Err(EntityValidationError::MissingItems("articles"));
        }
        require_unique_ids(
            self.articles.iter().map(|article| article.id.as_str()),
            "articles",
        )?;
        for article in &self.articles {
            require_non_empty(&article.title, "articles.title")?;
            require_non_empty(&article.principle, "articles.principle")?;
        }
        Ok(())
    }

    fn references(&self) -> Vec<ReferenceField> {
        Vec::new()
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::Constitution(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    #[default]
    Proposed,
    Accepted,
    Deprecated,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub status: DecisionStatus,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub consequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
}

impl SpecEntity for Decision {
    const ENTITY_TYPE: EntityType = EntityType::Decision;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        if !self.meta.draft {
            require_non_empty(&self.decision, "decision")?;
        }
        if let Some(supersedes) = &self.supersedes {
            require_reference(supersedes, "supersedes")?;
        }
        Ok(())
    }

    fn references(&self) -> Vec<ReferenceField> {
        self.supersedes
            .iter()
            .map(|value| ReferenceField::new("supersedes", value.clone()))
            .collect()
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::Decision(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SpecEntity for Milestone {
    const ENTITY_TYPE: EntityType = EntityType::Milestone;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate_payload(&self) -> ValidationResult {
        require_references(&self.depends_on, "depends_on")
    }

    fn references(&self) -> Vec<ReferenceField> {
        collect_references("depends_on", &self.depends_on)
    }

    fn into_any(self) -> AnyEntity {
        AnyEntity::Milestone(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{AcceptanceCriterion, BusinessRequirement, Decision, Plan, PlanCriteria, Priority};
    use crate::model::entity::{EntityMeta, SpecEntity};
    use crate::model::entity_type::EntityType;
    use crate::model::validation::EntityValidationError;
    use chrono::Utc;

    fn meta(kind: EntityType, slug: &str) -> EntityMeta {
        let now = Utc::now();
        EntityMeta {
            kind,
            number: 1,
            slug: slug.to_string(),
            name: "Example".to_string(),
            description: String::new(),
            draft: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn requirement(criteria: Vec<AcceptanceCriterion>) -> BusinessRequirement {
        BusinessRequirement {
            meta: meta(EntityType::BusinessRequirement, "example"),
            priority: Priority::Required,
            criteria,
            depends_on: Vec::new(),
        }
    }

    fn criterion(id: &str) -> AcceptanceCriterion {
        AcceptanceCriterion {
            id: id.to_string(),
            description: "works".to_string(),
        }
    }

    #[test]
    fn finalized_requirement_needs_criteria_but_draft_does_not() {
        let mut entity = requirement(Vec::new());
        assert_eq!(
            entity.validate(),
            Err(EntityValidationError::MissingItems("criteria"))
        );

        entity.meta.draft = true;
        entity.meta.slug.clear();
        assert_eq!(entity.validate(), Ok(()));
    }

    #[test]
    fn duplicate_criterion_ids_are_rejected() {
        let entity = requirement(vec![criterion("c1"), criterion("c1")]);
        assert!(matches!(
            entity.validate(),
            Err(EntityValidationError::DuplicateItemId { field: "criteria", .. })
        ));
    }

    #[test]
    fn header_type_must_match_kind() {
        let mut entity = requirement(vec![criterion("c1")]);
        entity.meta.kind = EntityType::Plan;
        assert!(matches!(
            entity.validate(),
            Err(EntityValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn plan_requirement_link_must_be_an_id() {
        let mut plan = Plan {
            meta: meta(EntityType::Plan, "rollout"),
            priority: Priority::Ideal,
            criteria: Some(PlanCriteria {
                requirement: "not-an-id".to_string(),
                criteria: "c1".to_string(),
            }),
            tasks: Vec::new(),
            depends_on: Vec::new(),
        };
        assert!(matches!(
            plan.validate(),
            Err(EntityValidationError::InvalidReference { field: "criteria.requirement", .. })
        ));

        plan.criteria = Some(PlanCriteria {
            requirement: "brq-1-login".to_string(),
            criteria: "c1".to_string(),
        });
        assert_eq!(plan.validate(), Ok(()));
        assert_eq!(plan.references().len(), 1);
    }

    #[test]
    fn decision_exposes_supersedes_reference() {
        let decision = Decision {
            meta: meta(EntityType::Decision, "use-yaml"),
            decision: "Store specs as YAML".to_string(),
            context: String::new(),
            status: Default::default(),
            alternatives: Vec::new(),
            consequences: Vec::new(),
            supersedes: Some("dcs-1".to_string()),
        };
        assert_eq!(decision.validate(), Ok(()));
        let references = decision.references();
        assert_eq!(references[0].field, "supersedes");
        assert_eq!(references[0].value, "dcs-1");
    }
}
