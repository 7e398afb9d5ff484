//! One-shot bootstrap of `specs.json` from pre-existing entity files.
//!
//! # Responsibility
//! - Seed per-type counters so numbering never collides with files created
//!   before centralized numbering existed.
//!
//! # Invariants
//! - Runs only when `specs.json` is absent; otherwise it is a no-op.
//! - Counters are advanced exclusively through `get_next_id`, the same path
//!   `create` uses; the counter value is never written directly.
//! - A type whose folder cannot be listed counts as having no entities.
//! - After a run the counter file exists, so a second run reports
//!   `migrated: false`.
//! - Numbers above `MAX_REPLAYED_NUMBER` are not replayed; they are logged
//!   and the type is seeded from its highest number within the bound.

use crate::model::entity_type::EntityType;
use crate::service::spec_manager::SpecManager;
use crate::storage::StorageResult;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Largest legacy number the migrator replays one increment at a time.
pub const MAX_REPLAYED_NUMBER: u32 = 1_000_000;

/// Result of a migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub migrated: bool,
    #[serde(rename = "lastIds")]
    pub last_ids: BTreeMap<EntityType, u32>,
}

/// Seeds the counter store from existing entity files when no counter
/// document exists yet.
pub fn migrate_legacy_metadata(specs: &SpecManager) -> StorageResult<MigrationOutcome> {
    let metadata = specs.metadata();
    metadata.invalidate_cache();

    if metadata.file_exists() {
        let last_ids = metadata.load_metadata()?.known_last_ids();
        info!("event=migration_run module=migration status=skip reason=metadata_present");
        return Ok(MigrationOutcome {
            migrated: false,
            last_ids,
        });
    }

    info!(
        "event=migration_run module=migration status=start root={}",
        specs.root().display()
    );
    for entity_type in EntityType::ALL {
        let highest = highest_number(specs, entity_type);
        for _ in 0..highest {
            metadata.get_next_id(entity_type)?;
        }
        if highest > 0 {
            info!(
                "event=migration_type module=migration status=ok entity_type={} last_id={}",
                entity_type, highest
            );
        }
    }

    // Persists the default document even when every folder was empty.
    let last_ids = metadata.load_metadata()?.known_last_ids();
    info!("event=migration_run module=migration status=ok");
    Ok(MigrationOutcome {
        migrated: true,
        last_ids,
    })
}

fn highest_number(specs: &SpecManager, entity_type: EntityType) -> u32 {
    match specs.list_any(entity_type) {
        Ok(entities) => {
            let mut highest = 0;
            for number in entities.iter().map(|entity| entity.number()) {
                if number > MAX_REPLAYED_NUMBER {
                    warn!(
                        "event=migration_type module=migration status=skip entity_type={} number={} reason=number_above_bound bound={}",
                        entity_type, number, MAX_REPLAYED_NUMBER
                    );
                    continue;
                }
                highest = highest.max(number);
            }
            highest
        }
        Err(err) => {
            warn!(
                "event=migration_type module=migration status=skip entity_type={} error={}",
                entity_type, err
            );
            0
        }
    }
}
