//! Access-qualified collections.
//!
//! Every propagating module attribute (includes, definitions, libraries,
//! compiler/linker options, dependencies) carries a public bucket and a
//! private bucket. The public bucket propagates to dependents; the private
//! bucket only participates in compiling the owning module.

use serde::{Deserialize, Serialize};

/// A collection split into a public and a private bucket.
///
/// Duplicates within and across buckets are tolerated; `joined()` deduplicates
/// while preserving first-insertion order, public before private.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLimited<T> {
    #[serde(default = "Vec::new")]
    public: Vec<T>,
    #[serde(default = "Vec::new")]
    private: Vec<T>,
}

impl<T> Default for AccessLimited<T> {
    fn default() -> Self {
        AccessLimited {
            public: Vec::new(),
            private: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> AccessLimited<T> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the public bucket.
    pub fn add_public(&mut self, item: T) {
        self.public.push(item);
    }

    /// Add an item to the private bucket.
    pub fn add_private(&mut self, item: T) {
        self.private.push(item);
    }

    /// Remove all occurrences of an item from the public bucket.
    pub fn remove_public(&mut self, item: &T) {
        self.public.retain(|i| i != item);
    }

    /// Remove all occurrences of an item from the private bucket.
    pub fn remove_private(&mut self, item: &T) {
        self.private.retain(|i| i != item);
    }

    /// The public bucket.
    pub fn public(&self) -> &[T] {
        &self.public
    }

    /// The private bucket.
    pub fn private(&self) -> &[T] {
        &self.private
    }

    /// First-seen-wins merge of both buckets, public then private.
    pub fn joined(&self) -> Vec<T> {
        let mut out: Vec<T> = Vec::with_capacity(self.public.len() + self.private.len());
        for item in self.public.iter().chain(self.private.iter()) {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        out
    }

    /// The bucket used by transitive propagation: public only.
    pub fn propagated(&self) -> &[T] {
        &self.public
    }

    /// Check whether both buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.private.is_empty()
    }

    /// Total item count across both buckets (duplicates included).
    pub fn len(&self) -> usize {
        self.public.len() + self.private.len()
    }

    /// Extend the public bucket.
    pub fn extend_public(&mut self, items: impl IntoIterator<Item = T>) {
        self.public.extend(items);
    }

    /// Extend the private bucket.
    pub fn extend_private(&mut self, items: impl IntoIterator<Item = T>) {
        self.private.extend(items);
    }
}
