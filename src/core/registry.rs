//! Typed name→instance registries.
//!
//! Four independent registries (platforms, toolchains, compiler factories,
//! linker factories) live in the build context. Registration is a one-shot
//! bootstrap step performed before any worker thread starts; afterwards the
//! registries are only read.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{BuildError, Result};

/// A name-keyed registry of shared instances.
pub struct Registry<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under a unique name.
    pub fn register(&mut self, name: impl Into<String>, entry: Arc<T>) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(BuildError::DuplicateName { name });
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::NotFound {
                name: name.to_string(),
            })
    }

    /// Check whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut reg: Registry<str> = Registry::new();
        reg.register("a", Arc::from("alpha")).unwrap();

        assert_eq!(&*reg.get("a").unwrap(), "alpha");
        assert_eq!(reg.get("b").unwrap_err().kind(), "NotFound");
    }

    #[test]
    fn test_duplicate_name_fails() {
        let mut reg: Registry<str> = Registry::new();
        reg.register("a", Arc::from("one")).unwrap();

        let err = reg.register("a", Arc::from("two")).unwrap_err();
        assert_eq!(err.kind(), "DuplicateName");
    }

    #[test]
    fn test_reregister_after_clear() {
        let mut reg: Registry<str> = Registry::new();
        reg.register("a", Arc::from("one")).unwrap();
        reg.clear();
        reg.register("a", Arc::from("two")).unwrap();

        assert_eq!(&*reg.get("a").unwrap(), "two");
    }

    #[test]
    fn test_names_sorted() {
        let mut reg: Registry<str> = Registry::new();
        reg.register("zeta", Arc::from("")).unwrap();
        reg.register("alpha", Arc::from("")).unwrap();

        assert_eq!(reg.names(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
