use crate::iterator::IterKey;
use std::collections::{BTreeMap, BTreeSet};

/// An ordered multimap from canonical key to the set of branch handles
/// currently positioned there.
///
/// One value may be held by several branches at once; all of them must be
/// advanced together when that value is emitted. Branch handles are indices
/// into the owning node's branch vector, which keeps the iteration order
/// deterministic.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeadMap<T: IterKey> {
    entries: BTreeMap<T, BTreeSet<usize>>,
}

impl<T: IterKey> HeadMap<T> {
    pub fn new() -> Self {
        HeadMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: T, branch: usize) {
        self.entries.entry(key).or_default().insert(branch);
    }

    /// Removes and returns every branch positioned at `key`.
    pub fn remove_all(&mut self, key: &T) -> Vec<usize> {
        self.entries
            .remove(key)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn first_key(&self) -> Option<&T> {
        self.entries.keys().next()
    }

    pub fn last_key(&self) -> Option<&T> {
        self.entries.keys().next_back()
    }

    pub fn contains_key(&self, key: &T) -> bool {
        self.entries.contains_key(key)
    }

    /// The keys strictly below `bound`, in order.
    pub fn keys_below(&self, bound: &T) -> Vec<T> {
        self.entries
            .range(..bound.clone())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// The branches positioned at `key`, in handle order.
    pub fn branches_at(&self, key: &T) -> Vec<usize> {
        self.entries
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of positioned branches across all keys.
    pub fn branch_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
