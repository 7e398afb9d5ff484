use specstore_core::{EntityType, IdAllocator, MetadataStore, SpecsMetadata, StorageError};
use std::fs;
use std::sync::Arc;
use std::thread;

#[test]
fn first_use_creates_default_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    assert!(!store.file_exists());

    let metadata = store.load_metadata().unwrap();
    assert_eq!(metadata, SpecsMetadata::default());
    assert!(store.file_exists());

    let raw = fs::read_to_string(dir.path().join("specs.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], "1.0.0");
    for entity_type in EntityType::ALL {
        assert_eq!(json["lastIds"][entity_type.as_str()], 0);
    }
}

#[test]
fn counters_are_independent_per_type() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());

    assert_eq!(store.get_next_id(EntityType::Plan).unwrap(), 1);
    assert_eq!(store.get_next_id(EntityType::Plan).unwrap(), 2);
    assert_eq!(store.get_next_id(EntityType::Decision).unwrap(), 1);
    assert_eq!(store.get_last_id(EntityType::Plan).unwrap(), 2);
    assert_eq!(store.get_last_id(EntityType::Milestone).unwrap(), 0);
}

#[test]
fn counters_persist_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = MetadataStore::new(dir.path());
        for _ in 0..3 {
            store.get_next_id(EntityType::Component).unwrap();
        }
    }

    let reopened = MetadataStore::new(dir.path());
    assert_eq!(reopened.get_last_id(EntityType::Component).unwrap(), 3);
    assert_eq!(reopened.get_next_id(EntityType::Component).unwrap(), 4);
}

#[test]
fn stale_caches_across_instances_can_issue_duplicates_until_invalidated() {
    let dir = tempfile::tempdir().unwrap();
    let first = MetadataStore::new(dir.path());
    let second = MetadataStore::new(dir.path());
    first.load_metadata().unwrap();
    second.load_metadata().unwrap();

    assert_eq!(first.get_next_id(EntityType::Plan).unwrap(), 1);
    assert_eq!(second.get_next_id(EntityType::Plan).unwrap(), 1);

    second.invalidate_cache();
    assert_eq!(second.get_next_id(EntityType::Plan).unwrap(), 2);
}

#[test]
fn concurrent_allocation_in_one_instance_never_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MetadataStore::new(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..10)
                    .map(|_| store.next_id(EntityType::BusinessRequirement).unwrap())
                    .collect::<Vec<u32>>()
            })
        })
        .collect();

    let mut issued: Vec<u32> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    issued.sort_unstable();
    assert_eq!(issued, (1..=40).collect::<Vec<u32>>());
    assert_eq!(store.last_id(EntityType::BusinessRequirement).unwrap(), 40);
}

#[test]
fn update_version_keeps_counters() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    store.get_next_id(EntityType::Constitution).unwrap();
    store.update_version("2.0.0").unwrap();

    let reopened = MetadataStore::new(dir.path());
    let metadata = reopened.load_metadata().unwrap();
    assert_eq!(metadata.version, "2.0.0");
    assert_eq!(metadata.last_id(EntityType::Constitution), 1);
}

#[test]
fn corrupt_document_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("specs.json"), "{ not json").unwrap();

    let store = MetadataStore::new(dir.path());
    assert!(store.get_next_id(EntityType::Plan).is_err());
}

#[test]
fn exhausted_counter_is_an_error_and_leaves_the_document_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let raw = "{\"version\":\"1.0.0\",\"lastIds\":{\"plan\":4294967295}}";
    fs::write(dir.path().join("specs.json"), raw).unwrap();

    let store = MetadataStore::new(dir.path());
    let err = store.get_next_id(EntityType::Plan).unwrap_err();
    assert!(matches!(
        err,
        StorageError::CounterExhausted {
            entity_type: EntityType::Plan,
            ..
        }
    ));
    assert!(store.get_next_id(EntityType::Plan).is_err());
    assert_eq!(store.get_last_id(EntityType::Plan).unwrap(), u32::MAX);
    assert_eq!(fs::read_to_string(dir.path().join("specs.json")).unwrap(), raw);

    assert_eq!(store.get_next_id(EntityType::Decision).unwrap(), 1);
}
