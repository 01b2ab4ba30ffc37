//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::errors::{BuildError, Result};

/// Ensure a directory exists, creating it if necessary.
///
/// Safe to race: concurrent creation of the same directory is not an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| BuildError::io(path, e))?;
    }
    Ok(())
}

/// Read a file to string.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
}

/// Write a file atomically: write to a temporary file in the same directory,
/// then rename over the destination.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| BuildError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| BuildError::io(path, e.error))?;
    Ok(())
}

/// Canonicalize a path, failing with an io error naming the path.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| BuildError::io(path, e))
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Expand source patterns relative to a base directory.
///
/// Entries containing glob metacharacters are expanded and sorted within the
/// pattern; plain paths are joined as-is. Pattern order is preserved so that
/// the result defines the source-declaration order of a module.
pub fn expand_sources(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            let path = base.join(pattern);
            if !results.contains(&path) {
                results.push(path);
            }
            continue;
        }

        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let mut matches = Vec::new();
        let entries = glob(&pattern_str).map_err(|e| BuildError::ModuleFileLoad {
            path: base.to_path_buf(),
            reason: format!("invalid glob pattern `{}`: {}", pattern, e),
        })?;
        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        matches.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
        matches.sort();
        for path in matches {
            if !results.contains(&path) {
                results.push(path);
            }
        }
    }

    Ok(results)
}
