//! Best-effort resolution of legacy service names to catalogue entries.
//!
//! The word-overlap rung is a heuristic. It can pick the wrong service when
//! two catalogue titles share many words, and it is not a guaranteed
//! resolver; callers count every miss.
use crate::mapper::{normalize_name, NameIndex};
use std::collections::{HashMap, HashSet};
use voxel_migrate_shared::types::{MasterService, ServiceId};

/// Legacy service names that were renamed in the destination catalogue.
const ALIASES: &[(&str, &str)] = &[
    (
        "radiology report",
        "cone beam ct  interpretation -radiology report",
    ),
    (
        "comparative scan radiology report add on",
        "cone beam ct  interpretation -comparative scan radiology report add on",
    ),
    (
        "panoramic radiograph interpretation",
        "panoramic radiograph/ periapical/ bitewing radiograph interpretation report",
    ),
    ("mri radiology report", "mri radiology report"),
    ("diagnostic image portfolio", "diagnostic image portfolio"),
];

/// Resolves a free-text service name to a `MasterServices` id.
pub trait ServiceNameMatcher: Send {
    fn resolve(&mut self, name: &str) -> Option<ServiceId>;
}

/// Matches on the exact normalized title, then the alias table, then the
/// first catalogue title sharing at least `min_shared_words` words.
pub struct WordOverlapMatcher {
    titles: NameIndex<ServiceId>,
    catalogue: Vec<(HashSet<String>, ServiceId)>,
    min_shared_words: usize,
    cache: HashMap<String, Option<ServiceId>>,
}

impl WordOverlapMatcher {
    pub const DEFAULT_MIN_SHARED_WORDS: usize = 3;

    /// Builds a matcher over the catalogue, in catalogue order.
    pub fn new(services: &[MasterService]) -> Self {
        let titles = NameIndex::from_pairs_first(
            "master service titles",
            services.iter().map(|service| (service.title.as_str(), service.id)),
        );
        let catalogue = services
            .iter()
            .map(|service| (words(&service.title), service.id))
            .collect();
        Self {
            titles,
            catalogue,
            min_shared_words: Self::DEFAULT_MIN_SHARED_WORDS,
            cache: HashMap::new(),
        }
    }

    pub fn with_min_shared_words(mut self, min_shared_words: usize) -> Self {
        self.min_shared_words = min_shared_words;
        self
    }

    fn lookup(&self, name: &str) -> Option<ServiceId> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }
        if let Some(id) = self.titles.get(&normalized) {
            return Some(*id);
        }
        let alias = ALIASES
            .iter()
            .find(|(legacy, _)| normalize_name(legacy) == normalized)
            .and_then(|(_, title)| self.titles.get(title));
        if let Some(id) = alias {
            return Some(*id);
        }

        let wanted = words(&normalized);
        self.catalogue
            .iter()
            .find(|(title_words, _)| title_words.intersection(&wanted).count() >= self.min_shared_words)
            .map(|(_, id)| *id)
    }
}

impl ServiceNameMatcher for WordOverlapMatcher {
    fn resolve(&mut self, name: &str) -> Option<ServiceId> {
        if let Some(cached) = self.cache.get(name) {
            return *cached;
        }
        let found = self.lookup(name);
        self.cache.insert(name.to_string(), found);
        found
    }
}

fn words(text: &str) -> HashSet<String> {
    normalize_name(text)
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}
