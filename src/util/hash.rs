//! Hashing utilities for variant-id computation.

use sha2::{Digest, Sha256};

/// A hasher for building deterministic fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a short fingerprint (first 16 chars).
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_str("opt_a").update_str("1");
            fp.finish()
        };

        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_str("opt_a").update_str("1");
            fp.finish()
        };

        let fp3 = {
            let mut fp = Fingerprint::new();
            fp.update_str("opt_a").update_str("2");
            fp.finish()
        };

        assert_eq!(fp1, fp2);
        assert_ne!(fp1, fp3);
    }

    #[test]
    fn test_separator_prevents_gluing() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["ab", "c"]);
            fp.finish()
        };
        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["a", "bc"]);
            fp.finish()
        };
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn test_finish_short_length() {
        let mut fp = Fingerprint::new();
        fp.update_str("x");
        assert_eq!(fp.finish_short().len(), 16);
    }
}
