//! Named entry tables used for handler and callback fan-out
//!
//! Entries are dispatched in insertion order.

use crate::error::{FeedError, Result};

/// Unique-name table preserving insertion order
pub struct Registry<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add an entry. A taken name leaves the existing entry untouched.
    pub fn register(&mut self, name: &str, entry: T) -> Result<()> {
        if self.contains(name) {
            return Err(FeedError::AlreadyRegistered(name.to_string()));
        }
        self.entries.push((name.to_string(), entry));
        Ok(())
    }

    /// Remove an entry, returning it.
    pub fn unregister(&mut self, name: &str) -> Result<T> {
        let pos = self
            .entries
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| FeedError::NotRegistered(name.to_string()))?;
        Ok(self.entries.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, entry)| entry)
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_iterate_in_order() {
        let mut reg = Registry::new();
        reg.register("b", 2).unwrap();
        reg.register("a", 1).unwrap();
        reg.register("c", 3).unwrap();

        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(reg.values().copied().collect::<Vec<_>>(), vec![2, 1, 3]);
    }

    #[test]
    fn test_duplicate_keeps_existing_entry() {
        let mut reg = Registry::new();
        reg.register("cb", 1).unwrap();

        let err = reg.register("cb", 99).unwrap_err();
        assert!(matches!(err, FeedError::AlreadyRegistered(ref n) if n == "cb"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.values().next(), Some(&1));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut reg: Registry<u32> = Registry::new();
        reg.register("known", 7).unwrap();

        let err = reg.unregister("unknown").unwrap_err();
        assert!(matches!(err, FeedError::NotRegistered(ref n) if n == "unknown"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unregister_removes_and_frees_name() {
        let mut reg = Registry::new();
        reg.register("a", 1).unwrap();
        reg.register("b", 2).unwrap();

        assert_eq!(reg.unregister("a").unwrap(), 1);
        assert!(!reg.contains("a"));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["b"]);

        reg.register("a", 3).unwrap();
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_values_mut() {
        let mut reg = Registry::new();
        reg.register("x", 1).unwrap();
        reg.register("y", 2).unwrap();
        for v in reg.values_mut() {
            *v *= 10;
        }
        assert_eq!(reg.values().copied().collect::<Vec<_>>(), vec![10, 20]);
        assert!(!reg.is_empty());
    }
}
