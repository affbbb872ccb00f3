use crate::mapper::{IdMap, NameIndex};
use std::hash::Hash;

/// How a key was resolved, or that it was not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<V> {
    /// Found through the id chain.
    Exact(V),
    /// Found through the normalized-name index.
    ByName(V),
    /// Neither matched; the designated default was used.
    Default(V),
    Missing,
}

impl<V> Resolution<V> {
    pub fn value(self) -> Option<V> {
        match self {
            Resolution::Exact(value) | Resolution::ByName(value) | Resolution::Default(value) => {
                Some(value)
            }
            Resolution::Missing => None,
        }
    }

    /// True when a rung below the exact match was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::ByName(_) | Resolution::Default(_))
    }

    /// Counter label for the rung that produced the value.
    pub fn rung(&self) -> &'static str {
        match self {
            Resolution::Exact(_) => "exact",
            Resolution::ByName(_) => "by_name",
            Resolution::Default(_) => "default",
            Resolution::Missing => "missing",
        }
    }
}

/// The subset of the fallback ladder a step enables.
///
/// Rungs are always tried in the fixed order exact, name, default. A rung
/// that was not configured is skipped.
pub struct FallbackLadder<'a, K, V> {
    exact: Option<&'a IdMap<K, V>>,
    by_name: Option<&'a NameIndex<V>>,
    default: Option<V>,
}

impl<'a, K, V> Default for FallbackLadder<'a, K, V> {
    fn default() -> Self {
        Self {
            exact: None,
            by_name: None,
            default: None,
        }
    }
}

impl<'a, K, V> FallbackLadder<'a, K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(mut self, map: &'a IdMap<K, V>) -> Self {
        self.exact = Some(map);
        self
    }

    pub fn by_name(mut self, index: &'a NameIndex<V>) -> Self {
        self.by_name = Some(index);
        self
    }

    pub fn default_value(mut self, value: Option<V>) -> Self {
        self.default = value;
        self
    }

    /// Resolves a key, falling back to its natural name.
    pub fn resolve(&self, key: Option<&K>, name: Option<&str>) -> Resolution<V> {
        if let (Some(map), Some(key)) = (self.exact, key) {
            if let Some(value) = map.get(key) {
                return Resolution::Exact(value.clone());
            }
        }
        if let (Some(index), Some(name)) = (self.by_name, name) {
            if let Some(value) = index.get(name) {
                return Resolution::ByName(value.clone());
            }
        }
        match &self.default {
            Some(value) => Resolution::Default(value.clone()),
            None => Resolution::Missing,
        }
    }
}
