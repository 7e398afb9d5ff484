//! File-system persistence primitives.
//!
//! # Responsibility
//! - Read/write YAML documents under the specs root (`yaml_store`).
//! - Own the `specs.json` counter document (`metadata`).
//!
//! # Invariants
//! - Genuine I/O and parse failures are raised, never swallowed, here.
//!   Read tolerance is decided one layer up by the entity manager.
//! - Writes are plain overwrites; a crash mid-write can leave a truncated
//!   file. This is accepted for a single-user local tool.

use crate::model::entity_type::EntityType;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod metadata;
pub mod yaml_store;

pub use metadata::{IdAllocator, MetadataCache, MetadataStore, SpecsMetadata};
pub use yaml_store::YamlStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    YamlSerialize {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The stored last ID for a type is already `u32::MAX`.
    CounterExhausted {
        path: PathBuf,
        entity_type: EntityType,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path of the file or directory the failure relates to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. }
            | Self::YamlParse { path, .. }
            | Self::YamlSerialize { path, .. }
            | Self::Json { path, .. }
            | Self::CounterExhausted { path, .. } => path,
        }
    }

    /// Returns whether the failure is an I/O "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
            Self::YamlParse { path, source } => {
                write!(f, "malformed yaml in `{}`: {source}", path.display())
            }
            Self::YamlSerialize { path, source } => {
                write!(f, "failed to serialize yaml for `{}`: {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "json error in `{}`: {source}", path.display())
            }
            Self::CounterExhausted { path, entity_type } => write!(
                f,
                "no {entity_type} numbers left: last id in `{}` is already {}",
                path.display(),
                u32::MAX
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::YamlParse { source, .. } | Self::YamlSerialize { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::CounterExhausted { .. } => None,
        }
    }
}
