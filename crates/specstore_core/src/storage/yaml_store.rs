//! YAML document store rooted at the specs folder.
//!
//! # Responsibility
//! - Resolve relative paths against one root and do byte-level YAML I/O.
//! - Produce stable, human-readable YAML output.
//!
//! # Invariants
//! - No schema checks happen here; callers validate.
//! - `list_files` on a missing directory is an empty listing, not an error.
//! - `remove_empty_dir` never fails.

use crate::storage::{StorageError, StorageResult};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

static MAPPING_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^- [A-Za-z_][A-Za-z0-9_-]*:(?: |$)").expect("valid mapping item regex")
});

/// Plain YAML file access relative to a root directory.
#[derive(Debug, Clone)]
pub struct YamlStore {
    root: PathBuf,
}

impl YamlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Creates a directory and all parents. Idempotent.
    pub fn ensure_folder(&self, relative: impl AsRef<Path>) -> StorageResult<()> {
        let path = self.resolve(relative);
        fs::create_dir_all(&path).map_err(|err| StorageError::io(&path, err))
    }

    /// Returns `false` on any stat failure, not only "not found".
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        fs::metadata(self.resolve(relative)).is_ok()
    }

    pub fn read_yaml<T: DeserializeOwned>(&self, relative: impl AsRef<Path>) -> StorageResult<T> {
        let path = self.resolve(relative);
        let content = fs::read_to_string(&path).map_err(|err| StorageError::io(&path, err))?;
        serde_yaml::from_str(&content).map_err(|source| StorageError::YamlParse { path, source })
    }

    /// Serializes `value` and overwrites the target, creating parents first.
    pub fn write_yaml<T: Serialize>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> StorageResult<()> {
        let path = self.resolve(relative);
        let rendered = serde_yaml::to_string(value).map_err(|source| {
            StorageError::YamlSerialize {
                path: path.clone(),
                source,
            }
        })?;
        let rendered = spaced_if_lossless(rendered);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
        fs::write(&path, rendered).map_err(|err| StorageError::io(&path, err))?;
        debug!(
            "event=yaml_write module=storage status=ok path={}",
            path.display()
        );
        Ok(())
    }

    /// Removes one file. Fails when the file does not exist.
    pub fn delete(&self, relative: impl AsRef<Path>) -> StorageResult<()> {
        let path = self.resolve(relative);
        fs::remove_file(&path).map_err(|err| StorageError::io(&path, err))?;
        debug!(
            "event=yaml_delete module=storage status=ok path={}",
            path.display()
        );
        Ok(())
    }

    /// Lists base names (extension stripped) of files under `sub_path`
    /// ending with `.{extension}`, sorted for stable output.
    pub fn list_files(
        &self,
        sub_path: impl AsRef<Path>,
        extension: &str,
    ) -> StorageResult<Vec<String>> {
        let dir = self.resolve(sub_path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&dir, err)),
        };

        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StorageError::io(&dir, err))?;
            let is_file = entry
                .file_type()
                .map(|file_type| file_type.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(suffix.as_str()) {
                if !stem.is_empty() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Best-effort cleanup: removes `sub_path` only when it is empty.
    pub fn remove_empty_dir(&self, sub_path: impl AsRef<Path>) {
        let dir = self.resolve(sub_path);
        let is_empty = fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty && fs::remove_dir(&dir).is_ok() {
            debug!(
                "event=dir_cleanup module=storage status=ok path={}",
                dir.display()
            );
        }
    }
}

/// Applies `add_readability_spacing` unless it would change the parsed
/// document. Keep-chomped block scalars (`|+`, `>+`) absorb the inserted
/// blank lines, so those documents are written unspaced.
fn spaced_if_lossless(rendered: String) -> String {
    let spaced = add_readability_spacing(&rendered);
    let before = serde_yaml::from_str::<serde_yaml::Value>(&rendered);
    let after = serde_yaml::from_str::<serde_yaml::Value>(&spaced);
    match (before, after) {
        (Ok(before), Ok(after)) if before == after => spaced,
        _ => rendered,
    }
}

/// Inserts blank lines between top-level sequence items that are mappings,
/// and after such a sequence ends, so long lists stay scannable by humans.
///
/// Only column-0 `- key:` lines are considered; block scalars are always
/// indented by the emitter and are never touched.
pub(crate) fn add_readability_spacing(yaml: &str) -> String {
    let mut output = String::with_capacity(yaml.len() + 64);
    let mut in_mapping_sequence = false;

    for line in yaml.lines() {
        let is_mapping_item = MAPPING_ITEM_RE.is_match(line);
        let is_top_level_key = !line.is_empty()
            && !line.starts_with(' ')
            && !line.starts_with('-')
            && !line.starts_with('#');

        if is_mapping_item {
            if in_mapping_sequence {
                output.push('\n');
            }
            in_mapping_sequence = true;
        } else if is_top_level_key {
            if in_mapping_sequence {
                output.push('\n');
            }
            in_mapping_sequence = false;
        }

        output.push_str(line);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::{add_readability_spacing, spaced_if_lossless};

    #[test]
    fn spacing_separates_mapping_items_and_closes_the_sequence() {
        let input = "name: X\ncriteria:\n- id: c1\n  description: a\n- id: c2\n  description: b\ndepends_on:\n- pln-1\n";
        let expected = "name: X\ncriteria:\n- id: c1\n  description: a\n\n- id: c2\n  description: b\n\ndepends_on:\n- pln-1\n";
        assert_eq!(add_readability_spacing(input), expected);
    }

    #[test]
    fn spacing_leaves_scalar_sequences_and_block_text_alone() {
        let input = "tech_stack:\n- rust\n- yaml\ndescription: |-\n  - id: not-a-key\n  more\n";
        assert_eq!(add_readability_spacing(input), input);
    }

    #[test]
    fn spaced_output_parses_to_the_same_value() {
        let input = "criteria:\n- id: c1\n  description: a\n- id: c2\n  description: b\nname: X\n";
        let spaced = add_readability_spacing(input);
        let before: serde_yaml::Value = serde_yaml::from_str(input).unwrap();
        let after: serde_yaml::Value = serde_yaml::from_str(&spaced).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn keep_chomped_text_is_written_unspaced() {
        let input = "criteria:\n- id: c1\n  description: |+\n    tail\n\n- id: c2\n  description: b\nname: X\n";
        assert_ne!(
            serde_yaml::from_str::<serde_yaml::Value>(&add_readability_spacing(input)).unwrap(),
            serde_yaml::from_str::<serde_yaml::Value>(input).unwrap()
        );
        assert_eq!(spaced_if_lossless(input.to_string()), input);
    }
}
