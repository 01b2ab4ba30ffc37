//! Tool executable discovery.
//!
//! Lookup order: environment variable override, then PATH candidates.

use std::path::PathBuf;

use crate::util::process::find_executable;

/// Find a tool executable, honoring an environment override.
pub fn find_tool(env_var: Option<&str>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(var) = env_var {
        if let Ok(name) = std::env::var(var) {
            if !name.is_empty() {
                let path = PathBuf::from(&name);
                if path.is_absolute() && path.exists() {
                    return Some(path);
                }
                return find_executable(&name);
            }
        }
    }

    candidates.iter().find_map(|c| find_executable(c))
}

/// Like `find_tool`, but falls back to the conventional program name so that
/// argv construction (e.g. for a compilation database) works without the tool
/// installed.
pub fn find_tool_or(env_var: Option<&str>, candidates: &[&str], fallback: &str) -> PathBuf {
    find_tool(env_var, candidates).unwrap_or_else(|| PathBuf::from(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_when_nothing_found() {
        let path = find_tool_or(None, &["definitely-not-a-real-tool-xyz"], "cc-fallback");
        assert_eq!(path, PathBuf::from("cc-fallback"));
    }

    #[test]
    fn test_find_tool_none_for_missing() {
        assert!(find_tool(None, &["definitely-not-a-real-tool-xyz"]).is_none());
    }
}
