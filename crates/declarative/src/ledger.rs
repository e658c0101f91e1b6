//! Dependency ledger - which resources changed during the current pass

use std::collections::HashSet;

/// Run-scoped record of resources found to require change.
///
/// A ledger lives for exactly one pass. Names are only ever added, so once a
/// resource is marked changed it stays changed until the ledger is dropped.
/// The engine is the only writer; resources read it while computing drift.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    changed: HashSet<String>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` changed. Returns false if it was already recorded.
    pub fn mark_changed(&mut self, name: &str) -> bool {
        self.changed.insert(name.to_string())
    }

    /// Whether `name` was recorded as changed.
    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Whether any of `names` was recorded as changed.
    pub fn any_changed<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|n| self.is_changed(n.as_ref()))
    }

    /// Number of recorded names.
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Recorded names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.changed.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_write_once() {
        let mut ledger = Ledger::new();
        assert!(ledger.mark_changed("a"));
        assert!(!ledger.mark_changed("a"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_changed("a"));
    }

    #[test]
    fn test_any_changed() {
        let mut ledger = Ledger::new();
        ledger.mark_changed("config");

        assert!(ledger.any_changed(&["other", "config"]));
        assert!(!ledger.any_changed(&["other"]));
        assert!(!ledger.any_changed::<&str>(&[]));
    }

    #[test]
    fn test_names_sorted() {
        let mut ledger = Ledger::new();
        ledger.mark_changed("b");
        ledger.mark_changed("a");
        assert_eq!(ledger.names(), vec!["a", "b"]);
    }
}
