use crate::document::Document;
use crate::error::{Error, Result};
use crate::iterator::{IterKey, NestedIterator};
use std::sync::Arc;

/// A leaf branch over an immutable, sorted in-memory sequence.
///
/// Used to assemble plans over pre-materialized candidate sets and throughout
/// the test suites. Unlike the physical scan leaf it supports `deep_copy`:
/// the value sequence is shared, the position is not.
pub struct ArrayIterator<T: IterKey> {
    values: Arc<Vec<T>>,
    context_required: bool,
    pos: usize,
    prev: Option<T>,
    document: Document,
    initialized: bool,
}

impl<T: IterKey> ArrayIterator<T> {
    pub fn new(mut values: Vec<T>) -> Self {
        values.sort();
        values.dedup();
        ArrayIterator {
            values: Arc::new(values),
            context_required: false,
            pos: 0,
            prev: None,
            document: Document::new(),
            initialized: false,
        }
    }

    /// A branch that participates only once a context is supplied, standing
    /// in for a deferred sub-tree.
    pub fn for_context(values: Vec<T>) -> Self {
        let mut iter = Self::new(values);
        iter.context_required = true;
        iter
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::IllegalState(
                "initialize() was never called".to_string(),
            ))
        }
    }
}

impl<T: IterKey + 'static> NestedIterator<T> for ArrayIterator<T> {
    fn initialize(&mut self) -> Result<()> {
        self.pos = 0;
        self.prev = None;
        self.initialized = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.pos < self.values.len())
    }

    fn next(&mut self) -> Result<Option<T>> {
        self.ensure_initialized()?;
        match self.values.get(self.pos) {
            Some(value) => {
                self.pos += 1;
                self.prev = Some(value.clone());
                Ok(Some(value.clone()))
            }
            None => Ok(None),
        }
    }

    fn move_to(&mut self, minimum: &T) -> Result<Option<T>> {
        self.ensure_initialized()?;
        if let Some(prev) = &self.prev {
            if prev >= minimum {
                return Err(Error::IllegalState(format!(
                    "move_to called at or beyond the move point: top={:?}, minimum={:?}",
                    prev, minimum
                )));
            }
        }
        while self.pos < self.values.len() && self.values[self.pos] < *minimum {
            self.pos += 1;
        }
        self.next()
    }

    fn peek(&self) -> Result<Option<T>> {
        self.ensure_initialized()?;
        Ok(self.values.get(self.pos).cloned())
    }

    fn document(&self) -> &Document {
        &self.document
    }

    fn children(&self) -> Vec<&dyn NestedIterator<T>> {
        Vec::new()
    }

    fn leaves(&self) -> Vec<&dyn NestedIterator<T>> {
        vec![self as &dyn NestedIterator<T>]
    }

    fn is_context_required(&self) -> bool {
        self.context_required
    }

    fn set_context(&mut self, _context: T) {
        // deferred branches are advanced by their parent against the context
    }

    fn deep_copy(&self) -> Result<Box<dyn NestedIterator<T>>> {
        Ok(Box::new(ArrayIterator {
            values: Arc::clone(&self.values),
            context_required: self.context_required,
            pos: 0,
            prev: None,
            document: Document::new(),
            initialized: false,
        }))
    }
}
