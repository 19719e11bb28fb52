use crate::error::Result;
use crate::iterator::head_map::HeadMap;
use crate::iterator::{IterKey, KeyTransformer, NestedIterator};
use std::collections::BTreeSet;

/// Head bookkeeping for one class of deferred (context-dependent) branches.
///
/// Deferred branches are opaque until a correlation value arrives: they are
/// initialized on first use and advanced only by moving them up to the
/// current context. Exhausted branches are retired permanently.
#[derive(Default)]
pub(crate) struct DeferredSet<T: IterKey> {
    heads: HeadMap<T>,
    exhausted: BTreeSet<usize>,
    seen: BTreeSet<usize>,
}

impl<T: IterKey> DeferredSet<T> {
    pub fn new() -> Self {
        DeferredSet {
            heads: HeadMap::new(),
            exhausted: BTreeSet::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Initializes unseen branches and moves every branch positioned below
    /// the context up to it.
    fn advance_to(
        &mut self,
        context: &T,
        branches: &mut [Box<dyn NestedIterator<T>>],
        transformer: &dyn KeyTransformer<T>,
    ) -> Result<()> {
        for idx in 0..branches.len() {
            if self.seen.insert(idx) {
                branches[idx].initialize()?;
                self.reposition(idx, branches, context, transformer)?;
            }
        }

        for key in self.heads.keys_below(context) {
            for idx in self.heads.remove_all(&key) {
                self.reposition(idx, branches, context, transformer)?;
            }
        }
        Ok(())
    }

    fn reposition(
        &mut self,
        idx: usize,
        branches: &mut [Box<dyn NestedIterator<T>>],
        context: &T,
        transformer: &dyn KeyTransformer<T>,
    ) -> Result<()> {
        match branches[idx].move_to(context)? {
            Some(value) => self.heads.insert(transformer.transform(&value), idx),
            None => {
                self.exhausted.insert(idx);
            }
        }
        Ok(())
    }

    /// The lowest value producible by unioning the branches against the
    /// context, or `None` when every branch is exhausted.
    pub fn union(
        &mut self,
        context: &T,
        branches: &mut [Box<dyn NestedIterator<T>>],
        transformer: &dyn KeyTransformer<T>,
    ) -> Result<Option<T>> {
        self.advance_to(context, branches, transformer)?;
        Ok(self.heads.first_key().cloned())
    }

    /// Intersects the branches against the context: `Some(context)` iff every
    /// branch sits exactly on the context, `None` otherwise.
    pub fn intersect(
        &mut self,
        context: &T,
        branches: &mut [Box<dyn NestedIterator<T>>],
        transformer: &dyn KeyTransformer<T>,
    ) -> Result<Option<T>> {
        self.advance_to(context, branches, transformer)?;

        let all_at_context = !branches.is_empty()
            && self.exhausted.is_empty()
            && self.heads.branch_count() == branches.len()
            && self.heads.first_key() == Some(context)
            && self.heads.last_key() == Some(context);

        Ok(if all_at_context {
            Some(context.clone())
        } else {
            None
        })
    }

    /// The branches currently positioned at `key`, for document assembly.
    pub fn branches_at(&self, key: &T) -> Vec<usize> {
        self.heads.branches_at(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{ArrayIterator, IdentityTransform};

    fn branches(sets: &[&[i32]]) -> Vec<Box<dyn NestedIterator<i32>>> {
        sets.iter()
            .map(|values| {
                Box::new(ArrayIterator::for_context(values.to_vec()))
                    as Box<dyn NestedIterator<i32>>
            })
            .collect()
    }

    #[test]
    fn test_union_returns_lowest_at_or_after_context() {
        let mut set = DeferredSet::new();
        let mut branches = branches(&[&[2, 8], &[5, 9]]);

        let lowest = set.union(&4, &mut branches, &IdentityTransform).unwrap();
        assert_eq!(lowest, Some(5));

        // same context again is stable
        let lowest = set.union(&4, &mut branches, &IdentityTransform).unwrap();
        assert_eq!(lowest, Some(5));

        let lowest = set.union(&9, &mut branches, &IdentityTransform).unwrap();
        assert_eq!(lowest, Some(9));
    }

    #[test]
    fn test_union_exhausts() {
        let mut set = DeferredSet::new();
        let mut branches = branches(&[&[3]]);
        assert_eq!(
            set.union(&7, &mut branches, &IdentityTransform).unwrap(),
            None
        );
    }

    #[test]
    fn test_intersect_requires_all_branches_on_context() {
        let mut set = DeferredSet::new();
        let mut branches = branches(&[&[1, 5, 9], &[5, 6]]);

        assert_eq!(
            set.intersect(&5, &mut branches, &IdentityTransform).unwrap(),
            Some(5)
        );
        // 6 is present in one branch only
        assert_eq!(
            set.intersect(&6, &mut branches, &IdentityTransform).unwrap(),
            None
        );
    }

    #[test]
    fn test_intersect_fails_once_any_branch_is_exhausted() {
        let mut set = DeferredSet::new();
        let mut branches = branches(&[&[5], &[5, 8]]);

        assert_eq!(
            set.intersect(&5, &mut branches, &IdentityTransform).unwrap(),
            Some(5)
        );
        assert_eq!(
            set.intersect(&8, &mut branches, &IdentityTransform).unwrap(),
            None
        );
    }
}
