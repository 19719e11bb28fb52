//! Boolean query-plan evaluation over sorted index cursors.
//!
//! A compiled query plan is a tree of [`iterator::NestedIterator`] nodes:
//! leaves scan one physically sorted postings range each, internal nodes merge
//! their children into a single ordered, deduplicated stream. The tree is
//! driven pull-style by a single caller through `initialize`/`has_next`/
//! `next`/`move_to`, optionally supplying a correlation value through
//! `set_context` for deferred branches (context-includes and negated subtrees
//! folded in via De Morgan's law).

pub mod cursor;
pub mod document;
pub mod error;
pub mod iterator;
pub mod key;
pub mod obs;

pub use crate::document::Document;
pub use crate::error::{Error, Result};
