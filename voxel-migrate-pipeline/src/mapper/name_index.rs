use std::collections::HashMap;
use tracing::info;

/// Normalizes a natural key for matching: trims, collapses internal
/// whitespace to single spaces and lower-cases.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Secondary index from a normalized name to a destination id.
#[derive(Debug, Clone)]
pub struct NameIndex<V> {
    name: &'static str,
    entries: HashMap<String, V>,
}

impl<V: Clone> NameIndex<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    /// Builds an index from `(name, value)` pairs. A repeated name keeps the last value.
    pub fn from_pairs<S: AsRef<str>>(
        name: &'static str,
        pairs: impl IntoIterator<Item = (S, V)>,
    ) -> Self {
        let mut index = Self::new(name);
        for (key, value) in pairs {
            index.insert(key.as_ref(), value);
        }
        info!(index = name, entries = index.len(), "Built name index");
        index
    }

    /// Builds an index from `(name, value)` pairs. A repeated name keeps the first value.
    pub fn from_pairs_first<S: AsRef<str>>(
        name: &'static str,
        pairs: impl IntoIterator<Item = (S, V)>,
    ) -> Self {
        let mut index = Self::new(name);
        for (key, value) in pairs {
            index.insert_first(key.as_ref(), value);
        }
        info!(index = name, entries = index.len(), "Built name index");
        index
    }

    /// Registers a name, replacing any previous value. Blank names are ignored.
    pub fn insert(&mut self, name: &str, value: V) {
        let key = normalize_name(name);
        if !key.is_empty() {
            self.entries.insert(key, value);
        }
    }

    /// Registers a name only if it is not indexed yet. Blank names are ignored.
    pub fn insert_first(&mut self, name: &str, value: V) {
        let key = normalize_name(name);
        if !key.is_empty() {
            self.entries.entry(key).or_insert(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_name("  Dr.   Jane\tDOE "), "dr. jane doe");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn lookups_are_normalized() {
        let index = NameIndex::from_pairs("names", vec![("Jane  Doe", 1), ("jane doe", 2)]);
        assert_eq!(index.get("JANE DOE"), Some(&2));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn first_registration_can_be_kept() {
        let index = NameIndex::from_pairs_first("names", vec![("Jane Doe", 1), ("JANE DOE", 2)]);
        assert_eq!(index.get("jane doe"), Some(&1));
    }

    #[test]
    fn blank_names_are_not_indexed() {
        let index = NameIndex::from_pairs("names", vec![(" ", 1)]);
        assert!(index.is_empty());
    }
}
