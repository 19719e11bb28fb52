//! The composition contract and its node implementations.
//!
//! A query plan is a tree of [`NestedIterator`] nodes built bottom-up: leaf
//! scans ([`FieldScanIterator`]) wrapped into merge nodes ([`OrIterator`]).
//! `initialize` is called once top-down, then the root is driven by repeated
//! `has_next`/`next`/`move_to` calls, optionally supplying a correlation
//! value via `set_context` between calls.

mod array;
mod context;
mod field_scan;
mod head_map;
mod or;

pub mod aggregator;

pub use array::ArrayIterator;
pub use field_scan::FieldScanIterator;
pub use or::OrIterator;

use crate::document::Document;
use crate::error::Result;
use crate::key::PostingKey;
use std::fmt::Debug;

/// Candidate keys flowing through a composition tree. Totally ordered and
/// cheap enough to clone; equal canonical values from different branches are
/// the same logical match.
pub trait IterKey: Ord + Clone + Debug {}

impl<T: Ord + Clone + Debug> IterKey for T {}

/// Maps a branch-native value into the canonical domain used for cross-branch
/// comparison. Applied every time a new candidate is pulled from a child.
pub trait KeyTransformer<T>: Send + Sync {
    fn transform(&self, value: &T) -> T;
}

/// The default transform: branches already produce canonical values.
pub struct IdentityTransform;

impl<T: Clone> KeyTransformer<T> for IdentityTransform {
    fn transform(&self, value: &T) -> T {
        value.clone()
    }
}

/// Canonicalizes a [`PostingKey`] to its record pointer so matches of
/// different fields on the same record deduplicate.
pub struct RecordPointerTransform;

impl KeyTransformer<PostingKey> for RecordPointerTransform {
    fn transform(&self, value: &PostingKey) -> PostingKey {
        value.record_pointer()
    }
}

/// The composition contract implemented by both leaves and internal merge
/// nodes.
///
/// Lifecycle: construct once per compiled plan, `initialize` exactly once,
/// then drive for the life of one query execution. Output of a correctly
/// driven node is strictly increasing and duplicate-free. Querying before
/// `initialize`, calling `move_to` with a minimum not strictly greater than
/// the last emitted value, and calling `next`/`has_next` on a
/// context-requiring node without a context are contract errors
/// ([`crate::Error::IllegalState`]), surfaced immediately.
pub trait NestedIterator<T: IterKey> {
    /// Recursively initializes non-deferred children and seeds the internal
    /// hint structures from their first candidates. Call exactly once.
    fn initialize(&mut self) -> Result<()>;

    /// Whether a next value exists. May perform work: triggers convergence
    /// and caches the next output on the first call after `initialize` or
    /// after an emission.
    fn has_next(&mut self) -> Result<bool>;

    /// Emits the next value, advancing every branch that contributed it.
    /// Converges internally when `has_next` was not called first. Returns
    /// `None` once exhausted.
    fn next(&mut self) -> Result<Option<T>>;

    /// Advances so the next emitted value is `>= minimum`, skipping
    /// intermediate values through the cheapest bulk-skip path each branch
    /// offers. Returns the emitted value, or `None` once exhausted.
    fn move_to(&mut self, minimum: &T) -> Result<Option<T>>;

    /// The smallest pending candidate without mutating state; idempotent
    /// between emissions.
    fn peek(&self) -> Result<Option<T>>;

    /// The accumulated evidence for the most recently emitted value.
    fn document(&self) -> &Document;

    /// Direct children, including deferred ones.
    fn children(&self) -> Vec<&dyn NestedIterator<T>>;

    /// Flattened non-deferred leaves. Deferred context branches stay opaque
    /// until a context is supplied.
    fn leaves(&self) -> Vec<&dyn NestedIterator<T>>;

    /// True iff this node has deferred (context-include or context-exclude)
    /// children.
    fn is_context_required(&self) -> bool {
        false
    }

    /// Injects the correlation value consumed by deferred branches. Must be
    /// set before `next`/`has_next` on a context-requiring node.
    fn set_context(&mut self, context: T);

    /// An independent, mutable-state-free clone sharing only immutable
    /// configuration, so one compiled plan can run concurrently over
    /// different partitions. Unsupported on physical scan leaves.
    fn deep_copy(&self) -> Result<Box<dyn NestedIterator<T>>>;
}

/// Merges the documents of the given branches into a fresh document for an
/// emitted value.
pub(crate) fn merge_documents<T: IterKey>(
    branches: &[Box<dyn NestedIterator<T>>],
    indices: impl IntoIterator<Item = usize>,
) -> Document {
    let mut doc = Document::new();
    for idx in indices {
        doc.merge(branches[idx].document());
    }
    doc
}
