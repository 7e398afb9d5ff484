use serde_json::{json, Value};
use specstore_core::{
    EntityType, EntityValidationError, Milestone, Plan, RepoError, SpecEntity, SpecManager,
};
use std::fs;
use std::path::Path;

fn requirement(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Users can sign in",
        "criteria": [{ "id": "c1", "description": "login succeeds with valid credentials" }],
    })
}

fn file_names(root: &Path, folder: &str) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(root.join(folder)) {
        Ok(entries) => entries
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[test]
fn create_get_list_delete_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    let created = plans
        .create(json!({ "slug": "x", "name": "X" }), None)
        .unwrap();
    assert_eq!(created.number(), 1);
    assert_eq!(created.meta.kind, EntityType::Plan);

    let loaded = plans.get(1).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(plans.list().unwrap(), vec![created]);

    plans.delete_entity(1).unwrap();
    assert!(plans.get(1).unwrap().is_none());
    assert!(plans.list().unwrap().is_empty());
}

#[test]
fn numbers_are_sequential_and_never_reused_after_delete() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let requirements = specs.business_requirements();

    let numbers: Vec<u32> = (0..4)
        .map(|index| {
            requirements
                .create(requirement(&format!("Requirement {index}")), None)
                .unwrap()
                .number()
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    requirements.delete_entity(2).unwrap();
    let next = requirements
        .create(requirement("Requirement again"), None)
        .unwrap();
    assert_eq!(next.number(), 5);

    let listed: Vec<u32> = requirements
        .list()
        .unwrap()
        .iter()
        .map(|entity| entity.number())
        .collect();
    assert_eq!(listed, vec![1, 3, 4, 5]);
}

#[test]
fn created_entity_is_written_under_canonical_name() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());

    let created = specs
        .business_requirements()
        .create(requirement("User Login"), None)
        .unwrap();
    assert_eq!(created.slug(), "user-login");
    assert_eq!(
        file_names(dir.path(), "requirements/business"),
        vec!["brq-1-user-login.yml".to_string()]
    );

    let raw = fs::read_to_string(dir.path().join("requirements/business/brq-1-user-login.yml"))
        .unwrap();
    assert!(raw.contains("type: business-requirement"));
    assert!(raw.contains("number: 1"));
}

#[test]
fn validation_failure_writes_nothing_and_keeps_counter() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let requirements = specs.business_requirements();

    let err = requirements
        .create(json!({ "name": "No criteria", "slug": "no-criteria" }), None)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::MissingItems("criteria"))
    ));
    assert!(file_names(dir.path(), "requirements/business").is_empty());
    assert_eq!(
        specs
            .metadata()
            .get_last_id(EntityType::BusinessRequirement)
            .unwrap(),
        0
    );

    let err = specs
        .components()
        .create(json!({ "name": "Api", "component_type": "spaceship" }), None)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::Schema(_))
    ));
}

#[test]
fn non_object_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());

    let err = specs.plans().create(json!(["not", "an", "object"]), None).unwrap_err();
    assert!(matches!(err, RepoError::InvalidInput(_)));
}

#[test]
fn update_merges_fields_and_refreshes_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let requirements = specs.business_requirements();

    let created = requirements.create(requirement("Login"), None).unwrap();
    let updated = requirements
        .update(1, json!({ "description": "Sign in with SSO", "priority": "critical" }))
        .unwrap();

    assert_eq!(updated.meta.description, "Sign in with SSO");
    assert_eq!(updated.meta.name, "Login");
    assert_eq!(updated.criteria, created.criteria);
    assert_eq!(updated.meta.created_at, created.meta.created_at);
    assert!(updated.meta.updated_at >= created.meta.updated_at);
    assert_eq!(requirements.get(1).unwrap().unwrap(), updated);
}

#[test]
fn update_cannot_change_number() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    for index in 1..=5 {
        plans
            .create(json!({ "name": format!("Plan {index}") }), None)
            .unwrap();
    }

    let updated = plans.update(5, json!({ "number": 999 })).unwrap();
    assert_eq!(updated.number(), 5);
    assert!(plans.get(999).unwrap().is_none());
    assert_eq!(plans.get(5).unwrap().unwrap().number(), 5);
}

#[test]
fn slug_change_renames_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    plans.create(json!({ "slug": "a", "name": "A" }), None).unwrap();
    plans.update(1, json!({ "slug": "b" })).unwrap();

    let names = file_names(dir.path(), "plans");
    assert_eq!(names, vec!["pln-1-b.yml".to_string()]);
    assert!(plans.get_by_slug("a").unwrap().is_none());
    assert_eq!(plans.get_by_slug("b").unwrap().unwrap().number(), 1);
}

#[test]
fn draft_flag_controls_file_name_in_both_directions() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let milestones = specs.milestones();

    let draft: Milestone = milestones
        .create(json!({ "name": "Beta", "draft": true }), None)
        .unwrap();
    assert!(draft.is_draft());
    assert_eq!(file_names(dir.path(), "milestones"), vec!["mls-1.draft.yml"]);
    assert!(milestones.draft_exists(1).unwrap());
    assert!(!milestones.entity_exists(1).unwrap());

    milestones
        .update(1, json!({ "draft": false, "slug": "beta" }))
        .unwrap();
    assert_eq!(file_names(dir.path(), "milestones"), vec!["mls-1-beta.yml"]);
    assert!(milestones.entity_exists(1).unwrap());
    assert!(!milestones.draft_exists(1).unwrap());

    milestones.update(1, json!({ "draft": true })).unwrap();
    assert_eq!(file_names(dir.path(), "milestones"), vec!["mls-1.draft.yml"]);
}

#[test]
fn finalizing_a_draft_without_slug_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    plans.create(json!({ "name": "Sketch", "draft": true }), None).unwrap();
    let err = plans.update(1, json!({ "draft": false })).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::InvalidSlug(_))
    ));
    assert_eq!(file_names(dir.path(), "plans"), vec!["pln-1.draft.yml"]);
}

#[test]
fn update_and_delete_of_missing_number_report_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());

    let err = specs.plans().update(3, json!({ "name": "ghost" })).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { entity_type: EntityType::Plan, number: 3 }
    ));

    let err = specs.decisions().delete_entity(7).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { entity_type: EntityType::Decision, number: 7 }
    ));
}

#[test]
fn slugs_are_unique_among_finalized_entities_only() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    plans.create(json!({ "slug": "rollout", "name": "Rollout" }), None).unwrap();
    let err = plans
        .create(json!({ "slug": "rollout", "name": "Rollout again" }), None)
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateSlug { existing: 1, .. }));

    plans
        .create(json!({ "slug": "rollout", "name": "Draft rollout", "draft": true }), None)
        .unwrap();

    plans.create(json!({ "slug": "other", "name": "Other" }), None).unwrap();
    let err = plans.update(3, json!({ "slug": "rollout" })).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateSlug { .. }));

    // Re-saving an entity under its own slug is not a conflict.
    plans.update(1, json!({ "slug": "rollout" })).unwrap();
}

#[test]
fn explicit_number_is_honored_and_conflicts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let plans = specs.plans();

    let created = plans.create(json!({ "name": "Imported" }), Some(10)).unwrap();
    assert_eq!(created.number(), 10);
    assert_eq!(specs.metadata().get_last_id(EntityType::Plan).unwrap(), 0);

    let err = plans.create(json!({ "name": "Clash" }), Some(10)).unwrap_err();
    assert!(matches!(err, RepoError::NumberConflict { number: 10, .. }));

    let err = plans.create(json!({ "name": "Zero" }), Some(0)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::InvalidNumber(0))
    ));
}

#[test]
fn legacy_alias_prefix_is_readable_and_rewritten_canonically() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("requirements/business");
    fs::create_dir_all(&folder).unwrap();
    fs::write(
        folder.join("brd-4-legacy.yml"),
        "type: business-requirement\nnumber: 4\nslug: legacy\nname: Legacy\ncriteria:\n- id: c1\n  description: still works\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n",
    )
    .unwrap();

    let specs = SpecManager::new(dir.path());
    let requirements = specs.business_requirements();
    assert_eq!(requirements.get(4).unwrap().unwrap().meta.name, "Legacy");
    assert_eq!(requirements.get_by_slug("legacy").unwrap().unwrap().number(), 4);

    requirements
        .update(4, json!({ "description": "migrated" }))
        .unwrap();
    assert_eq!(
        file_names(dir.path(), "requirements/business"),
        vec!["brq-4-legacy.yml".to_string()]
    );
}

#[test]
fn plan_payload_round_trips_through_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());

    let created: Plan = specs
        .plans()
        .create(
            json!({
                "name": "Rollout",
                "description": "Line one\nLine two\n",
                "criteria": { "requirement": "brq-1", "criteria": "c1" },
                "tasks": [
                    { "id": "t1", "description": "write code" },
                    { "id": "t2", "description": "ship it", "completed": true }
                ],
                "depends_on": ["cmp-2-api"],
            }),
            None,
        )
        .unwrap();

    let loaded = specs.plans().get(1).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.meta.description, "Line one\nLine two\n");
    assert!(loaded.tasks[1].completed);
}

#[test]
fn ensure_folders_creates_every_type_folder() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    specs.ensure_folders().unwrap();
    specs.ensure_folders().unwrap();

    for entity_type in EntityType::ALL {
        assert!(dir.path().join(entity_type.folder()).is_dir());
    }
}

#[test]
fn text_with_trailing_blank_lines_survives_create_get_and_update() {
    let dir = tempfile::tempdir().unwrap();
    let specs = SpecManager::new(dir.path());
    let requirements = specs.business_requirements();

    let created = requirements
        .create(
            json!({
                "name": "Trailing text",
                "criteria": [
                    { "id": "c1", "description": "first line\nsecond\n\n" },
                    { "id": "c2", "description": "tail\n\n" }
                ],
            }),
            None,
        )
        .unwrap();
    let loaded = requirements.get(1).unwrap().unwrap();
    assert_eq!(loaded, created);

    let updated = requirements
        .update(1, json!({ "description": "touched" }))
        .unwrap();
    let reloaded = requirements.get(1).unwrap().unwrap();
    assert_eq!(reloaded, updated);
    assert_eq!(reloaded.criteria[0].description, "first line\nsecond\n\n");
    assert_eq!(reloaded.criteria[1].description, "tail\n\n");
}

#[test]
fn counter_behind_unmigrated_files_reports_conflict_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("plans");
    fs::create_dir_all(&folder).unwrap();
    fs::write(
        folder.join("pln-1-legacy.yml"),
        "type: plan\nnumber: 1\nslug: legacy\nname: Legacy\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n",
    )
    .unwrap();

    let specs = SpecManager::new(dir.path());
    let err = specs
        .plans()
        .create(json!({ "name": "Fresh" }), None)
        .unwrap_err();
    assert!(matches!(err, RepoError::NumberConflict { number: 1, .. }));
    assert!(err.to_string().contains("run `migrate`"));
    assert_eq!(specs.plans().get(1).unwrap().unwrap().meta.name, "Legacy");

    let retried = specs.plans().create(json!({ "name": "Fresh" }), None).unwrap();
    assert_eq!(retried.number(), 2);
}
