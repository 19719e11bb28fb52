use crate::document::Document;
use crate::error::{Error, Result};
use crate::iterator::context::DeferredSet;
use crate::iterator::head_map::HeadMap;
use crate::iterator::{
    merge_documents, IdentityTransform, IterKey, KeyTransformer, NestedIterator,
};
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

/// Performs a deduplicating union merge of child iterators.
///
/// Children fall into three classes: plain includes (always contribute),
/// context includes (contribute only once an evaluation context is supplied),
/// and context excludes (negated sub-trees folded in via De Morgan's law: the
/// context value survives the union unless every exclude matches it).
///
/// Plain includes are tracked in two tiers. *Hints* hold provisional
/// minimums peeked from branches but not yet consumed; *heads* hold consumed,
/// comparison-ready minimums. Heads is only trusted once convergence has
/// pulled every hint that could undercut its current minimum.
pub struct OrIterator<T: IterKey> {
    includes: Vec<Box<dyn NestedIterator<T>>>,
    context_includes: Vec<Box<dyn NestedIterator<T>>>,
    context_excludes: Vec<Box<dyn NestedIterator<T>>>,
    transformer: Arc<dyn KeyTransformer<T>>,
    evaluation_context: Option<T>,
    document: Document,
    prev_document: Document,
    state: Option<OrState<T>>,
}

/// Mutable per-execution state, created by `initialize`. Owned by one node
/// instance; deep copies get a fresh one.
struct OrState<T: IterKey> {
    include_heads: HeadMap<T>,
    include_hints: HeadMap<T>,
    /// Canonical key back to the original branch value it was derived from.
    transforms: BTreeMap<T, T>,
    context_include_set: DeferredSet<T>,
    context_exclude_set: DeferredSet<T>,
    converged: bool,
    /// Canonical key of the last emission. Kept in the canonical domain so
    /// dedup comparisons work when a transformer collapses several branch
    /// values onto one key.
    prev: Option<T>,
    next: Option<T>,
    /// Canonical key of the cached `next`.
    next_key: Option<T>,
}

impl<T: IterKey> OrState<T> {
    fn new() -> Self {
        OrState {
            include_heads: HeadMap::new(),
            include_hints: HeadMap::new(),
            transforms: BTreeMap::new(),
            context_include_set: DeferredSet::new(),
            context_exclude_set: DeferredSet::new(),
            converged: false,
            prev: None,
            next: None,
            next_key: None,
        }
    }
}

impl<T: IterKey + 'static> OrIterator<T> {
    pub fn new(sources: Vec<Box<dyn NestedIterator<T>>>) -> Self {
        Self::with_filters(sources, Vec::new())
    }

    /// `filters` are the negated sub-trees (context excludes).
    pub fn with_filters(
        sources: Vec<Box<dyn NestedIterator<T>>>,
        filters: Vec<Box<dyn NestedIterator<T>>>,
    ) -> Self {
        let (context_includes, includes): (Vec<_>, Vec<_>) = sources
            .into_iter()
            .partition(|source| source.is_context_required());

        OrIterator {
            includes,
            context_includes,
            context_excludes: filters,
            transformer: Arc::new(IdentityTransform),
            evaluation_context: None,
            document: Document::new(),
            prev_document: Document::new(),
            state: None,
        }
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn KeyTransformer<T>>) -> Self {
        self.transformer = transformer;
        self
    }

    fn uninitialized() -> Error {
        Error::IllegalState("initialize() was never called".to_string())
    }

    fn missing_context(op: &str) -> Error {
        Error::IllegalState(format!(
            "evaluation context must be set prior to calling {}",
            op
        ))
    }

    /// Pulls hints forward into heads until heads' minimum is proven to be
    /// the true global minimum among the plain includes: every hint that
    /// could be at or below `minimum` or below the current first head is
    /// confirmed (stepped) or bulk-moved.
    fn converge(&mut self, mut minimum: T) -> Result<()> {
        loop {
            let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;

            let first_hint = match state.include_hints.first_key() {
                Some(key) => key.clone(),
                None => break,
            };
            let trusted = match state.include_heads.first_key() {
                None => false,
                Some(first_head) => first_hint > minimum && first_hint > *first_head,
            };
            if trusted {
                break;
            }

            // hints strictly below the minimum are bulk-moved, hints exactly
            // at the minimum are stepped to confirm their position
            let move_keys = state.include_hints.keys_below(&minimum);
            let at_minimum = state.include_hints.remove_all(&minimum);
            if !at_minimum.is_empty() && !state.include_heads.contains_key(&minimum) {
                state.transforms.remove(&minimum);
            }
            for idx in at_minimum {
                let branch = &mut self.includes[idx];
                if branch.has_next()? {
                    if let Some(value) = branch.next()? {
                        let transform = self.transformer.transform(&value);
                        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                        state.transforms.insert(transform.clone(), value);
                        state.include_heads.insert(transform, idx);
                    }
                }
            }

            for key in move_keys {
                let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                let moved = state.include_hints.remove_all(&key);
                if !state.include_heads.contains_key(&key) {
                    state.transforms.remove(&key);
                }
                for idx in moved {
                    if let Some(value) = self.includes[idx].move_to(&minimum)? {
                        let transform = self.transformer.transform(&value);
                        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                        state.transforms.insert(transform.clone(), value);
                        state.include_heads.insert(transform, idx);
                    }
                }
            }

            // remaining hints may still undercut the confirmed heads; raise
            // the bar and keep pulling
            let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
            if let Some(first_hint) = state.include_hints.first_key() {
                let undercuts = match state.include_heads.first_key() {
                    None => true,
                    Some(first_head) => first_hint <= first_head,
                };
                if undercuts {
                    minimum = first_hint.clone();
                }
            }
        }
        Ok(())
    }

    /// Advances every confirmed head holding `key` by one step and returns
    /// its new position to the hints, deconverging the node.
    fn demote_heads(&mut self, key: &T) -> Result<()> {
        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
        state.transforms.remove(key);
        for idx in state.include_heads.remove_all(key) {
            if let Some(hint) = self.includes[idx].peek()? {
                let transform = self.transformer.transform(&hint);
                let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                state.transforms.insert(transform.clone(), hint);
                state.include_hints.insert(transform, idx);
            }
        }
        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
        state.converged = false;
        Ok(())
    }

    /// Bulk-skips every confirmed head holding `key` to at least `minimum`,
    /// keeping it in the heads tier.
    fn move_heads(&mut self, key: &T, minimum: &T) -> Result<()> {
        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
        state.transforms.remove(key);
        for idx in state.include_heads.remove_all(key) {
            if let Some(value) = self.includes[idx].move_to(minimum)? {
                let transform = self.transformer.transform(&value);
                let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                state.transforms.insert(transform.clone(), value);
                state.include_heads.insert(transform, idx);
            }
        }
        Ok(())
    }

    fn converge_if_needed(&mut self) -> Result<()> {
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        if !state.converged {
            if let Some(minimum) = state.include_hints.first_key().cloned() {
                self.converge(minimum)?;
            }
            if let Some(state) = self.state.as_mut() {
                state.converged = true;
            }
        }
        Ok(())
    }

    /// Converges if needed, then computes and caches the next output from the
    /// three candidate sources: the confirmed heads' minimum, the deferred
    /// union against the context, and the context value itself when not every
    /// exclude matches it. Candidates at or below the previous emission are
    /// dropped so the output stays strictly increasing.
    fn prepare_next(&mut self) -> Result<()> {
        self.converge_if_needed()?;

        // heads whose canonical key is at or below the previous emission are
        // duplicates of it (the transformer collapsed several branch values
        // onto one key); step those branches past them and reconverge rather
        // than mistaking the empty candidate set for exhaustion
        let prev = self
            .state
            .as_ref()
            .ok_or_else(Self::uninitialized)?
            .prev
            .clone();
        loop {
            let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
            let stale = match (state.include_heads.first_key(), prev.as_ref()) {
                (Some(head), Some(p)) if head <= p => Some(head.clone()),
                _ => None,
            };
            match stale {
                Some(key) => {
                    self.demote_heads(&key)?;
                    self.converge_if_needed()?;
                }
                None => break,
            }
        }

        let context = self.evaluation_context.clone();
        let mut lowest_context_include: Option<T> = None;
        let mut context_survives = false;
        if let Some(ctx) = &context {
            if !self.context_includes.is_empty() {
                let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                lowest_context_include = state.context_include_set.union(
                    ctx,
                    &mut self.context_includes,
                    self.transformer.as_ref(),
                )?;
            }
            if !self.context_excludes.is_empty() {
                let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
                // De Morgan's law: (~A) OR (~B) == ~(A AND B). The context
                // survives unless the intersection of all excludes equals it.
                let intersected = state.context_exclude_set.intersect(
                    ctx,
                    &mut self.context_excludes,
                    self.transformer.as_ref(),
                )?;
                context_survives = intersected.as_ref() != Some(ctx);
            }
        }

        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        let beyond_prev = |candidate: &T| prev.as_ref().map_or(true, |p| candidate > p);

        let mut candidates: Vec<T> = Vec::with_capacity(3);
        if let Some(first_head) = state.include_heads.first_key() {
            if beyond_prev(first_head) {
                candidates.push(first_head.clone());
            }
        }
        if let Some(value) = &lowest_context_include {
            if beyond_prev(value) {
                candidates.push(value.clone());
            }
        }
        if let (true, Some(ctx)) = (context_survives, &context) {
            if beyond_prev(ctx) {
                candidates.push(ctx.clone());
            }
        }

        let lowest = match candidates.into_iter().min() {
            Some(lowest) => lowest,
            None => {
                if let Some(state) = self.state.as_mut() {
                    state.next = None;
                    state.next_key = None;
                }
                return Ok(());
            }
        };

        // tie-break when values coincide: a deferred include outranks a
        // confirmed head, which outranks bare context survival
        let mut demote = false;
        if lowest_context_include.as_ref() == Some(&lowest) {
            let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
            state.next = Some(lowest.clone());
            state.next_key = Some(lowest.clone());
            let contributors = state.context_include_set.branches_at(&lowest);
            self.document = merge_documents(&self.context_includes, contributors);
        } else if self.state.as_ref().ok_or_else(Self::uninitialized)?.include_heads.first_key()
            == Some(&lowest)
        {
            let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
            // emit the original branch value recorded behind the canonical key
            let original = state
                .transforms
                .get(&lowest)
                .cloned()
                .unwrap_or_else(|| lowest.clone());
            state.next = Some(original);
            state.next_key = Some(lowest.clone());
            let contributors = state.include_heads.branches_at(&lowest);
            self.document = merge_documents(&self.includes, contributors);
        } else {
            let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
            // survived the excludes only; presence without evidence
            state.next = context.clone();
            state.next_key = context.clone();
            self.document = Document::new();
        }

        // every confirmed head at the chosen value is advanced, not just one
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        if state.include_heads.contains_key(&lowest) {
            demote = true;
        }
        if demote {
            self.demote_heads(&lowest)?;
        }
        Ok(())
    }
}

impl<T: IterKey + 'static> NestedIterator<T> for OrIterator<T> {
    fn initialize(&mut self) -> Result<()> {
        let mut state = OrState::new();
        for (idx, branch) in self.includes.iter_mut().enumerate() {
            branch.initialize()?;
            if let Some(first) = branch.peek()? {
                let transform = self.transformer.transform(&first);
                state.transforms.insert(transform.clone(), first);
                state.include_hints.insert(transform, idx);
            }
        }
        // deferred children are initialized on demand, once a context arrives
        self.state = Some(state);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        if self.is_context_required() && self.evaluation_context.is_none() {
            return Err(Self::missing_context("has_next"));
        }
        if state.next.is_none() {
            self.prepare_next()?;
        }
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        Ok(state.next.is_some())
    }

    fn next(&mut self) -> Result<Option<T>> {
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        if self.is_context_required() && self.evaluation_context.is_none() {
            return Err(Self::missing_context("next"));
        }
        if state.next.is_none() {
            self.prepare_next()?;
        }

        let state = self.state.as_mut().ok_or_else(Self::uninitialized)?;
        let emitted = state.next.take();
        if emitted.is_some() {
            state.prev = state.next_key.take();
            self.prev_document = mem::take(&mut self.document);
        }
        Ok(emitted)
    }

    fn move_to(&mut self, minimum: &T) -> Result<Option<T>> {
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        if let Some(prev) = &state.prev {
            if prev >= minimum {
                return Err(Error::IllegalState(format!(
                    "move_to called at or beyond the move point: top={:?}, minimum={:?}",
                    prev, minimum
                )));
            }
        }
        // a cached next at or beyond the minimum can simply be emitted
        if state.next_key.as_ref().map_or(false, |key| key >= minimum) {
            return self.next();
        }

        if !state.converged {
            self.converge(minimum.clone())?;
            if let Some(state) = self.state.as_mut() {
                state.converged = true;
            }
        }

        // bulk-skip every confirmed head below the minimum
        let below = self
            .state
            .as_ref()
            .ok_or_else(Self::uninitialized)?
            .include_heads
            .keys_below(minimum);
        let moved = !below.is_empty();
        for key in &below {
            self.move_heads(key, minimum)?;
        }

        // moving may have put the heads at or beyond the smallest hint;
        // reconverge to whichever is smaller
        if moved {
            let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
            let reconverge = match (
                state.include_hints.first_key(),
                state.include_heads.first_key(),
            ) {
                (Some(first_hint), Some(first_head)) if first_head >= first_hint => {
                    Some(if minimum > first_head {
                        first_head.clone()
                    } else {
                        minimum.clone()
                    })
                }
                (Some(_), None) => Some(minimum.clone()),
                _ => None,
            };
            if let Some(bar) = reconverge {
                self.converge(bar)?;
            }
        }

        // the stale cached next is below the minimum; recompute
        if let Some(state) = self.state.as_mut() {
            state.next = None;
            state.next_key = None;
        }
        self.document = Document::new();
        self.prepare_next()?;

        let exhausted = self
            .state
            .as_ref()
            .ok_or_else(Self::uninitialized)?
            .next
            .is_none();
        if exhausted {
            if let Some(state) = self.state.as_mut() {
                state.include_heads.clear();
            }
            Ok(None)
        } else {
            self.next()
        }
    }

    /// The smallest pending candidate across hints and heads.
    fn peek(&self) -> Result<Option<T>> {
        let state = self.state.as_ref().ok_or_else(Self::uninitialized)?;
        let lowest = match (
            state.include_hints.first_key(),
            state.include_heads.first_key(),
        ) {
            (Some(hint), Some(head)) => Some(hint.min(head)),
            (Some(hint), None) => Some(hint),
            (None, Some(head)) => Some(head),
            (None, None) => None,
        };
        Ok(lowest.cloned())
    }

    fn document(&self) -> &Document {
        &self.prev_document
    }

    fn children(&self) -> Vec<&dyn NestedIterator<T>> {
        self.includes
            .iter()
            .chain(self.context_includes.iter())
            .chain(self.context_excludes.iter())
            .map(|branch| branch.as_ref())
            .collect()
    }

    fn leaves(&self) -> Vec<&dyn NestedIterator<T>> {
        // deferred branches stay opaque until a context is supplied
        self.includes
            .iter()
            .flat_map(|branch| branch.leaves())
            .collect()
    }

    fn is_context_required(&self) -> bool {
        !self.context_includes.is_empty() || !self.context_excludes.is_empty()
    }

    fn set_context(&mut self, context: T) {
        self.evaluation_context = Some(context);
    }

    fn deep_copy(&self) -> Result<Box<dyn NestedIterator<T>>> {
        fn copy_all<T: IterKey>(
            branches: &[Box<dyn NestedIterator<T>>],
        ) -> Result<Vec<Box<dyn NestedIterator<T>>>> {
            branches.iter().map(|branch| branch.deep_copy()).collect()
        }

        Ok(Box::new(OrIterator {
            includes: copy_all(&self.includes)?,
            context_includes: copy_all(&self.context_includes)?,
            context_excludes: copy_all(&self.context_excludes)?,
            transformer: Arc::clone(&self.transformer),
            evaluation_context: None,
            document: Document::new(),
            prev_document: Document::new(),
            state: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::ArrayIterator;

    fn include(values: &[i32]) -> Box<dyn NestedIterator<i32>> {
        Box::new(ArrayIterator::new(values.to_vec()))
    }

    fn deferred(values: &[i32]) -> Box<dyn NestedIterator<i32>> {
        Box::new(ArrayIterator::for_context(values.to_vec()))
    }

    fn drain(iter: &mut OrIterator<i32>) -> Vec<i32> {
        let mut out = Vec::new();
        while iter.has_next().unwrap() {
            out.push(iter.next().unwrap().unwrap());
        }
        out
    }

    #[test]
    fn test_union_deduplicates_overlapping_branches() {
        let mut or = OrIterator::new(vec![include(&[1, 4, 9]), include(&[4, 7, 9])]);
        or.initialize().unwrap();
        assert_eq!(drain(&mut or), vec![1, 4, 7, 9]);
    }

    #[test]
    fn test_output_is_strictly_increasing() {
        let mut or = OrIterator::new(vec![
            include(&[1, 2, 3, 5, 8]),
            include(&[2, 3, 5, 7]),
            include(&[1, 8, 13]),
        ]);
        or.initialize().unwrap();
        let out = drain(&mut or);
        assert_eq!(out, vec![1, 2, 3, 5, 7, 8, 13]);
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_colliding_canonical_keys_do_not_truncate_the_stream() {
        // 10 and 12 collapse onto canonical key 1; the union must step past
        // the duplicate and still surface 20
        struct DecadeTransform;
        impl KeyTransformer<i32> for DecadeTransform {
            fn transform(&self, value: &i32) -> i32 {
                value / 10
            }
        }

        let mut or = OrIterator::new(vec![include(&[10, 12, 20])])
            .with_transformer(Arc::new(DecadeTransform));
        or.initialize().unwrap();
        assert_eq!(drain(&mut or), vec![10, 20]);

        // a longer duplicate run across two branches
        let mut or = OrIterator::new(vec![include(&[10, 11, 12, 30]), include(&[13, 21])])
            .with_transformer(Arc::new(DecadeTransform));
        or.initialize().unwrap();
        let out = drain(&mut or);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0] / 10, 1);
        assert_eq!(out[1] / 10, 2);
        assert_eq!(out[2] / 10, 3);
    }

    #[test]
    fn test_single_branch_passthrough() {
        let mut or = OrIterator::new(vec![include(&[2, 4, 6])]);
        or.initialize().unwrap();
        assert_eq!(drain(&mut or), vec![2, 4, 6]);
    }

    #[test]
    fn test_next_without_has_next_converges_internally() {
        let mut or = OrIterator::new(vec![include(&[3, 5]), include(&[4])]);
        or.initialize().unwrap();
        assert_eq!(or.next().unwrap(), Some(3));
        assert_eq!(or.next().unwrap(), Some(4));
        assert_eq!(or.next().unwrap(), Some(5));
        assert_eq!(or.next().unwrap(), None);
    }

    #[test]
    fn test_peek_is_idempotent() {
        let mut or = OrIterator::new(vec![include(&[2, 6]), include(&[4])]);
        or.initialize().unwrap();
        assert_eq!(or.peek().unwrap(), Some(2));
        assert_eq!(or.peek().unwrap(), Some(2));
        assert_eq!(or.next().unwrap(), Some(2));
    }

    #[test]
    fn test_move_skips_without_emitting() {
        let mut or = OrIterator::new(vec![include(&[1, 4, 9]), include(&[4, 7, 9])]);
        or.initialize().unwrap();
        assert_eq!(or.move_to(&5).unwrap(), Some(7));
        assert_eq!(or.next().unwrap(), Some(9));
        assert_eq!(or.next().unwrap(), None);
    }

    #[test]
    fn test_move_to_exact_value() {
        let mut or = OrIterator::new(vec![include(&[1, 4, 9]), include(&[4, 7])]);
        or.initialize().unwrap();
        assert_eq!(or.move_to(&4).unwrap(), Some(4));
        assert_eq!(or.move_to(&9).unwrap(), Some(9));
        assert_eq!(or.next().unwrap(), None);
    }

    #[test]
    fn test_move_past_everything_exhausts() {
        let mut or = OrIterator::new(vec![include(&[1, 4])]);
        or.initialize().unwrap();
        assert_eq!(or.move_to(&10).unwrap(), None);
        assert!(!or.has_next().unwrap());
    }

    #[test]
    fn test_move_not_strictly_forward_is_a_contract_error() {
        let mut or = OrIterator::new(vec![include(&[1, 4, 9])]);
        or.initialize().unwrap();
        assert_eq!(or.next().unwrap(), Some(1));
        assert_eq!(or.next().unwrap(), Some(4));
        assert!(matches!(or.move_to(&4), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_use_before_initialize_is_a_contract_error() {
        let mut or = OrIterator::new(vec![include(&[1])]);
        assert!(matches!(or.has_next(), Err(Error::IllegalState(_))));
        assert!(matches!(or.peek(), Err(Error::IllegalState(_))));
        assert!(matches!(or.move_to(&1), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_context_required_without_context_is_a_contract_error() {
        let mut or = OrIterator::new(vec![include(&[1]), deferred(&[4])]);
        or.initialize().unwrap();
        assert!(or.is_context_required());
        assert!(matches!(or.has_next(), Err(Error::IllegalState(_))));
        assert!(matches!(or.next(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_context_include_contributes_to_union() {
        let mut or = OrIterator::new(vec![include(&[1, 9]), deferred(&[4])]);
        or.initialize().unwrap();
        or.set_context(4);
        assert_eq!(drain(&mut or), vec![1, 4, 9]);
    }

    #[test]
    fn test_context_exclude_suppresses_matching_context() {
        let mut or = OrIterator::with_filters(Vec::new(), vec![deferred(&[5])]);
        or.initialize().unwrap();
        or.set_context(5);
        assert!(!or.has_next().unwrap());
    }

    #[test]
    fn test_context_survives_non_matching_exclude() {
        let mut or = OrIterator::with_filters(Vec::new(), vec![deferred(&[3])]);
        or.initialize().unwrap();
        or.set_context(5);
        assert!(or.has_next().unwrap());
        assert_eq!(or.next().unwrap(), Some(5));
        // the surviving value carries no evidence
        assert!(or.document().is_empty());
    }

    #[test]
    fn test_context_survives_unless_every_exclude_matches() {
        // two excludes, only one matches: (~A) OR (~B) keeps the context
        let mut or = OrIterator::with_filters(Vec::new(), vec![deferred(&[5]), deferred(&[6])]);
        or.initialize().unwrap();
        or.set_context(5);
        assert_eq!(or.next().unwrap(), Some(5));

        let mut or = OrIterator::with_filters(Vec::new(), vec![deferred(&[5]), deferred(&[5])]);
        or.initialize().unwrap();
        or.set_context(5);
        assert!(!or.has_next().unwrap());
    }

    #[test]
    fn test_empty_sources() {
        let mut or: OrIterator<i32> = OrIterator::new(Vec::new());
        or.initialize().unwrap();
        assert!(!or.has_next().unwrap());
        assert_eq!(or.next().unwrap(), None);
    }

    #[test]
    fn test_exhausted_branch_drops_out() {
        let mut or = OrIterator::new(vec![include(&[1]), include(&[2, 3])]);
        or.initialize().unwrap();
        assert_eq!(drain(&mut or), vec![1, 2, 3]);
    }

    #[test]
    fn test_children_and_leaves() {
        let mut or = OrIterator::with_filters(
            vec![include(&[1]), include(&[2]), deferred(&[3])],
            vec![deferred(&[4])],
        );
        or.initialize().unwrap();
        assert_eq!(or.children().len(), 4);
        // deferred branches are opaque to leaves()
        assert_eq!(or.leaves().len(), 2);
    }

    #[test]
    fn test_nested_or_trees() {
        let inner = OrIterator::new(vec![include(&[2, 6]), include(&[4])]);
        let mut outer = OrIterator::new(vec![Box::new(inner), include(&[1, 6, 8])]);
        outer.initialize().unwrap();
        assert_eq!(drain(&mut outer), vec![1, 2, 4, 6, 8]);
    }

    #[test]
    fn test_document_merges_all_contributing_branches() {
        use bson::Bson;

        struct DocBranch {
            inner: ArrayIterator<i32>,
            doc: Document,
            label: &'static str,
        }
        impl DocBranch {
            fn new(values: &[i32], label: &'static str) -> Self {
                DocBranch {
                    inner: ArrayIterator::new(values.to_vec()),
                    doc: Document::new(),
                    label,
                }
            }
        }
        impl NestedIterator<i32> for DocBranch {
            fn initialize(&mut self) -> Result<()> {
                self.inner.initialize()
            }
            fn has_next(&mut self) -> Result<bool> {
                self.inner.has_next()
            }
            fn next(&mut self) -> Result<Option<i32>> {
                let value = self.inner.next()?;
                if let Some(v) = value {
                    self.doc = Document::new();
                    self.doc.put(self.label, Bson::Int32(v));
                }
                Ok(value)
            }
            fn move_to(&mut self, minimum: &i32) -> Result<Option<i32>> {
                let value = self.inner.move_to(minimum)?;
                if let Some(v) = value {
                    self.doc = Document::new();
                    self.doc.put(self.label, Bson::Int32(v));
                }
                Ok(value)
            }
            fn peek(&self) -> Result<Option<i32>> {
                self.inner.peek()
            }
            fn document(&self) -> &Document {
                &self.doc
            }
            fn children(&self) -> Vec<&dyn NestedIterator<i32>> {
                Vec::new()
            }
            fn leaves(&self) -> Vec<&dyn NestedIterator<i32>> {
                vec![self as &dyn NestedIterator<i32>]
            }
            fn set_context(&mut self, _context: i32) {}
            fn deep_copy(&self) -> Result<Box<dyn NestedIterator<i32>>> {
                Err(Error::UnsupportedOperation(
                    "not needed in this test".to_string(),
                ))
            }
        }

        let mut or = OrIterator::new(vec![
            Box::new(DocBranch::new(&[1, 4], "left")) as Box<dyn NestedIterator<i32>>,
            Box::new(DocBranch::new(&[4, 7], "right")) as Box<dyn NestedIterator<i32>>,
        ]);
        or.initialize().unwrap();

        assert_eq!(or.next().unwrap(), Some(1));
        assert!(or.document().get("left").is_some());
        assert!(or.document().get("right").is_none());

        // both branches hold 4; evidence merges from both
        assert_eq!(or.next().unwrap(), Some(4));
        assert!(or.document().get("left").is_some());
        assert!(or.document().get("right").is_some());

        assert_eq!(or.next().unwrap(), Some(7));
        assert!(or.document().get("right").is_some());
        assert!(or.document().get("left").is_none());
    }
}
