//! Entity file naming: formatting and lossless parsing.
//!
//! # Invariants
//! - Finalized: `{prefix}-{number}-{slug}.yml`.
//! - Flagged draft: `{prefix}-{number}.draft.yml` (no slug).
//! - `parse(format(..))` recovers the same `(prefix, number, slug)` for every
//!   valid slug, since slugs never contain dots and numbers are digits only.

use crate::model::entity::EntityMeta;
use crate::model::entity_type::EntityType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// Extension of finalized and flagged-draft entity files.
pub const ENTITY_EXTENSION: &str = "yml";

static FINALIZED_STEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]{3})-(\d+)-([a-z0-9]+(?:-[a-z0-9]+)*)$").expect("valid file stem regex")
});
static DRAFT_STEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]{3})-(\d+)\.draft$").expect("valid draft stem regex"));

/// Components recovered from an entity file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFileName {
    Finalized {
        prefix: String,
        number: u32,
        slug: String,
    },
    Draft {
        prefix: String,
        number: u32,
    },
}

impl ParsedFileName {
    pub fn prefix(&self) -> &str {
        match self {
            Self::Finalized { prefix, .. } | Self::Draft { prefix, .. } => prefix,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Self::Finalized { number, .. } | Self::Draft { number, .. } => *number,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Self::Finalized { slug, .. } => Some(slug),
            Self::Draft { .. } => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft { .. })
    }
}

pub fn finalized_file_stem(prefix: &str, number: u32, slug: &str) -> String {
    format!("{prefix}-{number}-{slug}")
}

pub fn draft_file_stem(prefix: &str, number: u32) -> String {
    format!("{prefix}-{number}.draft")
}

/// Parses a file stem (extension already stripped).
pub fn parse_file_stem(stem: &str) -> Option<ParsedFileName> {
    if let Some(captures) = DRAFT_STEM_RE.captures(stem) {
        return Some(ParsedFileName::Draft {
            prefix: captures[1].to_string(),
            number: captures[2].parse().ok()?,
        });
    }
    let captures = FINALIZED_STEM_RE.captures(stem)?;
    Some(ParsedFileName::Finalized {
        prefix: captures[1].to_string(),
        number: captures[2].parse().ok()?,
        slug: captures[3].to_string(),
    })
}

/// Parses a full file name; the entity extension is required.
pub fn parse_file_name(file_name: &str) -> Option<ParsedFileName> {
    let stem = file_name.strip_suffix(&format!(".{ENTITY_EXTENSION}"))?;
    parse_file_stem(stem)
}

/// Per-type path strategy used by an entity manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNaming {
    entity_type: EntityType,
}

impl FileNaming {
    pub fn new(entity_type: EntityType) -> Self {
        Self { entity_type }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn folder(&self) -> &'static str {
        self.entity_type.folder()
    }

    /// Canonical stem for an entity header, honoring its draft flag.
    pub fn stem_for(&self, meta: &EntityMeta) -> String {
        if meta.draft {
            draft_file_stem(self.entity_type.prefix(), meta.number)
        } else {
            finalized_file_stem(self.entity_type.prefix(), meta.number, &meta.slug)
        }
    }

    /// Relative path (from the specs root) of a file stem in this type's folder.
    pub fn path_for_stem(&self, stem: &str) -> PathBuf {
        PathBuf::from(self.folder()).join(format!("{stem}.{ENTITY_EXTENSION}"))
    }

    pub fn path_for(&self, meta: &EntityMeta) -> PathBuf {
        self.path_for_stem(&self.stem_for(meta))
    }

    /// Parses a stem and keeps it only when its prefix belongs to this type.
    pub fn parse_owned(&self, stem: &str) -> Option<ParsedFileName> {
        parse_file_stem(stem).filter(|parsed| self.entity_type.accepts_prefix(parsed.prefix()))
    }
}
