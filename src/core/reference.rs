//! Module references - lazily resolved pointers to other module definitions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default file name looked up when a reference points at a directory.
pub const DEFAULT_DEFINITION_FILE: &str = "module.ebuild";

/// A reference to another module: a path relative to the referring module's
/// directory plus an optional descriptor name, option map, and transformer
/// tag. Resolution happens during graph construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReference {
    /// Definition file (or directory containing `module.ebuild`), relative to
    /// the referring module's directory.
    pub path: PathBuf,

    /// Descriptor name, required when the definition file declares more than
    /// one module.
    #[serde(default)]
    pub module: Option<String>,

    /// Options to bind on the referenced module.
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Output transformer to apply after option binding.
    #[serde(default)]
    pub transformer: Option<String>,
}

impl ModuleReference {
    /// Create a plain reference to a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModuleReference {
            path: path.into(),
            module: None,
            options: BTreeMap::new(),
            transformer: None,
        }
    }

    /// Set the descriptor name.
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.module = Some(name.into());
        self
    }

    /// Add an option binding.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set the transformer tag.
    pub fn with_transformer(mut self, tag: impl Into<String>) -> Self {
        self.transformer = Some(tag.into());
        self
    }

    /// Resolve this reference against the referring module's directory,
    /// yielding the definition file path (not yet canonicalized). Directory
    /// references resolve to `module.ebuild` inside the directory.
    pub fn definition_file(&self, base_dir: &Path) -> PathBuf {
        let joined = if self.path.is_absolute() {
            self.path.clone()
        } else {
            base_dir.join(&self.path)
        };

        if joined.is_dir() {
            joined.join(DEFAULT_DEFINITION_FILE)
        } else {
            joined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_definition_file_for_plain_path() {
        let r = ModuleReference::new("../dep/dep.ebuild");
        let file = r.definition_file(Path::new("/work/app"));
        assert_eq!(file, PathBuf::from("/work/app/../dep/dep.ebuild"));
    }

    #[test]
    fn test_definition_file_for_directory() {
        let tmp = TempDir::new().unwrap();
        let dep = tmp.path().join("dep");
        std::fs::create_dir_all(&dep).unwrap();

        let r = ModuleReference::new("dep");
        let file = r.definition_file(tmp.path());
        assert_eq!(file, dep.join(DEFAULT_DEFINITION_FILE));
    }

    #[test]
    fn test_builder_style() {
        let r = ModuleReference::new("lib.ebuild")
            .with_option("fast", "1")
            .with_transformer("shared");
        assert_eq!(r.options.get("fast").map(String::as_str), Some("1"));
        assert_eq!(r.transformer.as_deref(), Some("shared"));
    }
}
