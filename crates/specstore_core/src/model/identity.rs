//! Composed entity ID strings and slug rules.
//!
//! # Responsibility
//! - Parse loose reference strings (`{prefix}-{number}[-{slug}][.yml]`).
//! - Validate and derive file-safe slugs.
//!
//! # Invariants
//! - The number is the authoritative part of an ID; the slug is a display hint.
//! - Parsing accepts alias prefixes; formatting always uses the canonical one.

use crate::model::entity_type::EntityType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));
static ENTITY_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3})-(\d+)(?:-([a-z0-9]+(?:-[a-z0-9]+)*))?(?:\.draft)?(?:\.ya?ml)?$")
        .expect("valid entity id regex")
});
static NON_SLUG_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slugify regex"));

/// Parsed reference to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub number: u32,
    /// Slug carried by the reference string, if any. Not used for lookup.
    pub slug: Option<String>,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, number: u32) -> Self {
        Self {
            entity_type,
            number,
            slug: None,
        }
    }

    /// Short canonical key (`{prefix}-{number}`), used for visited sets and messages.
    pub fn key(&self) -> String {
        format!("{}-{}", self.entity_type.prefix(), self.number)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.slug {
            Some(slug) => write!(f, "{}-{}-{slug}", self.entity_type.prefix(), self.number),
            None => write!(f, "{}-{}", self.entity_type.prefix(), self.number),
        }
    }
}

/// Reason a reference string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRefError {
    Malformed(String),
    UnknownPrefix(String),
    ZeroNumber(String),
}

impl Display for EntityRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(raw) => write!(f, "invalid reference id `{raw}`"),
            Self::UnknownPrefix(prefix) => write!(f, "unknown entity prefix `{prefix}`"),
            Self::ZeroNumber(raw) => write!(f, "reference id `{raw}` has number 0"),
        }
    }
}

impl std::error::Error for EntityRefError {}

/// Parses an ID-like string into its type, number and optional slug.
///
/// Surrounding whitespace and a trailing `.yml`/`.yaml` (optionally preceded
/// by `.draft`) are tolerated so file names can be passed through unchanged.
pub fn parse_entity_ref(raw: &str) -> Result<EntityRef, EntityRefError> {
    let trimmed = raw.trim();
    let captures = ENTITY_ID_RE
        .captures(trimmed)
        .ok_or_else(|| EntityRefError::Malformed(raw.to_string()))?;

    let prefix = captures[1].to_ascii_lowercase();
    let entity_type =
        EntityType::from_prefix(&prefix).ok_or(EntityRefError::UnknownPrefix(prefix))?;
    let number = captures[2]
        .parse::<u32>()
        .map_err(|_| EntityRefError::Malformed(raw.to_string()))?;
    if number == 0 {
        return Err(EntityRefError::ZeroNumber(raw.to_string()));
    }

    Ok(EntityRef {
        entity_type,
        number,
        slug: captures.get(3).map(|value| value.as_str().to_string()),
    })
}

/// Returns whether `slug` is a valid file-safe slug.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Derives a slug from free text: lowercase, runs of other characters
/// collapsed to `-`, no leading or trailing dash.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_SLUG_CHARS_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
