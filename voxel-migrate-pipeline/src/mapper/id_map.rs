use crate::mapper::Resolution;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::info;

/// A named, typed mapping from one key domain to another.
///
/// Memory is proportional to the snapshot it was built from. The name is
/// only used in log lines.
#[derive(Debug, Clone)]
pub struct IdMap<K, V> {
    name: &'static str,
    entries: HashMap<K, V>,
}

impl<K, V> IdMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    /// Builds a map from `(key, value)` pairs. A repeated key keeps the last value.
    pub fn from_pairs(name: &'static str, pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut map = Self::new(name);
        for (key, value) in pairs {
            map.insert(key, value);
        }
        info!(mapping = name, entries = map.len(), "Built mapping");
        map
    }

    /// Builds a map from `(key, value)` pairs. A repeated key keeps the first value.
    pub fn from_pairs_first(name: &'static str, pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut map = Self::new(name);
        for (key, value) in pairs {
            map.insert_first(key, value);
        }
        info!(mapping = name, entries = map.len(), "Built mapping");
        map
    }

    /// Inserts a pair, replacing any previous value for the key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Inserts a pair only if the key is not mapped yet. Returns whether it was inserted.
    pub fn insert_first(&mut self, key: K, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
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

    /// Looks a key up as the exact rung of a fallback ladder.
    pub fn resolve(&self, key: &K) -> Resolution<V> {
        match self.entries.get(key) {
            Some(value) => Resolution::Exact(value.clone()),
            None => Resolution::Missing,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}

/// Joins two mapping stages in memory: `A -> B` then `B -> C` gives `A -> C`.
///
/// Keys of `first` whose intermediate value is absent from `second` are dropped.
pub fn chain<A, B, C>(name: &'static str, first: &IdMap<A, B>, second: &IdMap<B, C>) -> IdMap<A, C>
where
    A: Eq + Hash + Clone,
    B: Eq + Hash + Clone,
    C: Clone,
{
    IdMap::from_pairs(
        name,
        first.iter().filter_map(|(key, middle)| {
            second
                .get(middle)
                .map(|value| (key.clone(), value.clone()))
        }),
    )
}
