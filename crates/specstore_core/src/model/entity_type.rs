//! Entity type tags and the prefix/folder table.
//!
//! # Responsibility
//! - Define the closed set of persisted entity kinds.
//! - Own the single mapping `type -> (canonical prefix, aliases, folder)`.
//!
//! # Invariants
//! - Every type has exactly one canonical 3-letter prefix used for writing.
//! - Alias prefixes are accepted when parsing legacy files, never for writes.
//! - No two types share a prefix (canonical or alias).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Discriminant tag stored in the `type` field of every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    BusinessRequirement,
    TechnicalRequirement,
    Plan,
    Component,
    Constitution,
    Decision,
    Milestone,
}

struct TypeSpec {
    entity_type: EntityType,
    tag: &'static str,
    prefix: &'static str,
    aliases: &'static [&'static str],
    folder: &'static str,
}

const TYPE_TABLE: &[TypeSpec] = &[
    TypeSpec {
        entity_type: EntityType::BusinessRequirement,
        tag: "business-requirement",
        prefix: "brq",
        aliases: &["brd"],
        folder: "requirements/business",
    },
    TypeSpec {
        entity_type: EntityType::TechnicalRequirement,
        tag: "technical-requirement",
        prefix: "trq",
        aliases: &["prd"],
        folder: "requirements/technical",
    },
    TypeSpec {
        entity_type: EntityType::Plan,
        tag: "plan",
        prefix: "pln",
        aliases: &[],
        folder: "plans",
    },
    TypeSpec {
        entity_type: EntityType::Component,
        tag: "component",
        prefix: "cmp",
        aliases: &[],
        folder: "components",
    },
    TypeSpec {
        entity_type: EntityType::Constitution,
        tag: "constitution",
        prefix: "cns",
        aliases: &["cos"],
        folder: "constitutions",
    },
    TypeSpec {
        entity_type: EntityType::Decision,
        tag: "decision",
        prefix: "dcs",
        aliases: &["dec"],
        folder: "decisions",
    },
    TypeSpec {
        entity_type: EntityType::Milestone,
        tag: "milestone",
        prefix: "mls",
        aliases: &[],
        folder: "milestones",
    },
];

impl EntityType {
    /// All known entity types in stable declaration order.
    pub const ALL: [EntityType; 7] = [
        EntityType::BusinessRequirement,
        EntityType::TechnicalRequirement,
        EntityType::Plan,
        EntityType::Component,
        EntityType::Constitution,
        EntityType::Decision,
        EntityType::Milestone,
    ];

    fn spec(self) -> &'static TypeSpec {
        // TYPE_TABLE covers every variant; the index lookup mirrors `ALL`.
        &TYPE_TABLE[self as usize]
    }

    /// Kebab-case tag as written in the `type` field and in `specs.json`.
    pub fn as_str(self) -> &'static str {
        self.spec().tag
    }

    /// Canonical prefix used for every newly written file.
    pub fn prefix(self) -> &'static str {
        self.spec().prefix
    }

    /// Legacy prefixes still recognized when reading.
    pub fn alias_prefixes(self) -> &'static [&'static str] {
        self.spec().aliases
    }

    /// Subfolder (relative to the specs root) holding this type's files.
    pub fn folder(self) -> &'static str {
        self.spec().folder
    }

    /// Returns whether `prefix` names this type, canonically or as an alias.
    pub fn accepts_prefix(self, prefix: &str) -> bool {
        let spec = self.spec();
        spec.prefix == prefix || spec.aliases.contains(&prefix)
    }

    /// Resolves a canonical or alias prefix to its entity type.
    pub fn from_prefix(prefix: &str) -> Option<EntityType> {
        let normalized = prefix.trim().to_ascii_lowercase();
        TYPE_TABLE
            .iter()
            .find(|spec| spec.prefix == normalized || spec.aliases.contains(&normalized.as_str()))
            .map(|spec| spec.entity_type)
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known entity type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityType(pub String);

impl Display for UnknownEntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown entity type `{}`", self.0)
    }
}

impl std::error::Error for UnknownEntityType {}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    /// Accepts the kebab-case tag, a snake_case variant, or any known prefix.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        TYPE_TABLE
            .iter()
            .find(|spec| spec.tag == normalized)
            .map(|spec| spec.entity_type)
            .or_else(|| EntityType::from_prefix(&normalized))
            .ok_or_else(|| UnknownEntityType(value.to_string()))
    }
}
