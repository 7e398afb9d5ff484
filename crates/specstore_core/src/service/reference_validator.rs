//! Advisory cross-entity reference checks.
//!
//! # Responsibility
//! - Resolve a loose ID string to an entity and report whether it, and every
//!   entity it transitively references, exists.
//!
//! # Invariants
//! - Lookup is by number only; a slug inside an ID is a display hint.
//! - Unresolved references are reported as messages, never raised.
//! - Each entity is visited at most once, so reference cycles terminate.

use crate::model::entity::AnyEntity;
use crate::model::identity::{parse_entity_ref, EntityRef};
use crate::service::spec_manager::SpecManager;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// Structured outcome of `validate_reference`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<AnyEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ReferenceValidation {
    fn failed(error: String) -> Self {
        Self {
            valid: false,
            entity: None,
            errors: vec![error],
        }
    }
}

enum Resolution {
    Found(AnyEntity),
    Missing,
    Failed(String),
}

pub struct ReferenceValidator<'a> {
    specs: &'a SpecManager,
}

impl<'a> ReferenceValidator<'a> {
    pub fn new(specs: &'a SpecManager) -> Self {
        Self { specs }
    }

    /// Validates `raw` and walks its references recursively.
    pub fn validate_reference(&self, raw: &str) -> ReferenceValidation {
        let reference = match parse_entity_ref(raw) {
            Ok(reference) => reference,
            Err(err) => return ReferenceValidation::failed(err.to_string()),
        };

        let root = match self.resolve(&reference) {
            Resolution::Found(entity) => entity,
            Resolution::Missing => {
                return ReferenceValidation::failed(format!("{} not found", reference.key()))
            }
            Resolution::Failed(message) => return ReferenceValidation::failed(message),
        };

        let mut resolved: HashMap<String, bool> = HashMap::new();
        resolved.insert(reference.key(), true);
        let mut errors = Vec::new();
        let mut pending = vec![(reference.key(), root.clone())];

        while let Some((from, entity)) = pending.pop() {
            for field in entity.references() {
                let target = match parse_entity_ref(&field.value) {
                    Ok(target) => target,
                    Err(err) => {
                        errors.push(format!("{from}: {}: {err}", field.field));
                        continue;
                    }
                };

                let key = target.key();
                let found = match resolved.get(&key) {
                    Some(found) => *found,
                    None => {
                        let found = match self.resolve(&target) {
                            Resolution::Found(next) => {
                                pending.push((key.clone(), next));
                                true
                            }
                            Resolution::Missing => false,
                            Resolution::Failed(message) => {
                                errors.push(format!("{from}: {}: {message}", field.field));
                                resolved.insert(key, false);
                                continue;
                            }
                        };
                        resolved.insert(key, found);
                        found
                    }
                };

                if !found {
                    errors.push(format!(
                        "{from}: {} references {} which was not found",
                        field.field, field.value
                    ));
                }
            }
        }

        debug!(
            "event=reference_validate module=reference_validator status=ok id={} visited={} errors={}",
            reference.key(),
            resolved.len(),
            errors.len()
        );
        ReferenceValidation {
            valid: errors.is_empty(),
            entity: Some(root),
            errors,
        }
    }

    fn resolve(&self, reference: &EntityRef) -> Resolution {
        match self.specs.get_any(reference.entity_type, reference.number) {
            Ok(Some(entity)) => Resolution::Found(entity),
            Ok(None) => Resolution::Missing,
            Err(err) => Resolution::Failed(format!("failed to load {}: {err}", reference.key())),
        }
    }
}
