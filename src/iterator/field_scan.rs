use crate::cursor::{ScanRange, SortedCursor};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::event;
use crate::iterator::aggregator::FieldAggregator;
use crate::iterator::NestedIterator;
use crate::key::{PostingKey, POSTING_FAMILY};
use crate::obs::logger::LoggerAndTracer;
use std::mem;
use std::ops::Bound;
use std::sync::Arc;

/// Entries stepped over while positioned before the target field, before
/// falling back to a direct re-seek at the field boundary. Keeps the scan
/// from walking linearly across unrelated fields that happen to sort between
/// the current position and the target.
const MAX_FIELD_LOOKAHEAD: usize = 32;

/// Scans one physically sorted postings range restricted to a single field,
/// yielding matches whose field value falls within the configured bound.
///
/// The physical scan range is built lazily on first use, never at
/// construction. Evidence aggregation is delegated to a [`FieldAggregator`]
/// since one logical match may span several physical pairs.
///
/// This leaf is constructed fully formed for one physical scan:
/// re-initialization and `deep_copy` are deliberately unsupported, unlike
/// internal composition nodes.
pub struct FieldScanIterator<C: SortedCursor> {
    source: C,
    start_key: PostingKey,
    start_inclusive: bool,
    end_key: PostingKey,
    end_inclusive: bool,
    field: String,
    build_document: bool,
    aggregator: Arc<dyn FieldAggregator>,
    logger: Arc<dyn LoggerAndTracer>,
    scan_range: Option<ScanRange>,
    top: Option<PostingKey>,
    document: Document,
    prev_document: Document,
    initialized: bool,
}

impl<C: SortedCursor> FieldScanIterator<C> {
    /// Fails on an unparseable start/stop key or on keys targeting different
    /// fields, so a broken plan is distinguishable from an empty result.
    pub fn new(
        start: &[u8],
        start_inclusive: bool,
        end: &[u8],
        end_inclusive: bool,
        source: C,
        build_document: bool,
        aggregator: Arc<dyn FieldAggregator>,
        logger: Arc<dyn LoggerAndTracer>,
    ) -> Result<Self> {
        let start_key = PostingKey::parse(start)?;
        let end_key = PostingKey::parse(end)?;
        if start_key.field_name != end_key.field_name {
            return Err(Error::MalformedKey(format!(
                "start and stop keys target different fields: {} vs {}",
                start_key.field_name, end_key.field_name
            )));
        }
        let field = start_key.field_name.clone();

        Ok(FieldScanIterator {
            source,
            start_key,
            start_inclusive,
            end_key,
            end_inclusive,
            field,
            build_document,
            aggregator,
            logger,
            scan_range: None,
            top: None,
            document: Document::new(),
            prev_document: Document::new(),
            initialized: false,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
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

    fn ensure_scan_range(&mut self) {
        if self.scan_range.is_some() {
            return;
        }
        let start = if self.start_inclusive {
            Bound::Included(self.start_key.encode())
        } else {
            Bound::Excluded(self.start_key.encode())
        };
        let end = if self.end_inclusive {
            Bound::Included(self.end_key.encode())
        } else {
            Bound::Excluded(self.end_key.encode())
        };
        event!(self.logger, "event: scan range built, field={}", self.field);
        self.scan_range = Some(ScanRange::new(start, end).with_family(POSTING_FAMILY.to_vec()));
    }

    /// Advances the source until it rests on an accepted match, aggregating
    /// it into `top` and `document`, or exhausts the range.
    fn find_top(&mut self) -> Result<()> {
        self.top = None;
        self.document = Document::new();

        loop {
            let entry = match self.source.top() {
                Some((key, _)) => PostingKey::parse(key)?,
                None => break,
            };

            if entry.field_name != self.field {
                self.skip_to_field(entry)?;
                continue;
            }

            let value = entry.field_value.as_str();
            let below_start = if self.start_inclusive {
                value < self.start_key.field_value.as_str()
            } else {
                value <= self.start_key.field_value.as_str()
            };
            let past_end = if self.end_inclusive {
                value > self.end_key.field_value.as_str()
            } else {
                value >= self.end_key.field_value.as_str()
            };
            if below_start || past_end {
                self.source.advance()?;
                continue;
            }

            let pointer =
                self.aggregator
                    .apply(&mut self.source, &mut self.document, self.build_document)?;
            self.top = Some(pointer);
            break;
        }
        Ok(())
    }

    /// The current entry belongs to another field. Steps over a bounded run
    /// of entries sorting before the target field, then falls back to
    /// re-seeking the source directly at a synthesized field boundary.
    fn skip_to_field(&mut self, mut entry: PostingKey) -> Result<()> {
        if entry.field_name.as_str() > self.field.as_str() {
            self.source.advance()?;
            return Ok(());
        }

        let mut stepped = 0;
        while stepped < MAX_FIELD_LOOKAHEAD {
            self.source.advance()?;
            stepped += 1;
            match self.source.top() {
                Some((key, _)) => {
                    entry = PostingKey::parse(key)?;
                    if entry.field_name.as_str() >= self.field.as_str() {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            }
        }

        let boundary = PostingKey {
            shard: entry.shard,
            data_type: entry.data_type,
            record_id: entry.record_id,
            field_value: entry.field_value,
            field_name: self.field.clone(),
        };
        if let Some(range) = &self.scan_range {
            let forward = range.starting_at(Bound::Included(boundary.encode()));
            event!(
                self.logger,
                "event: field scan reseek, field={}",
                self.field
            );
            self.source.seek(&forward)?;
        }
        Ok(())
    }
}

impl<C: SortedCursor + 'static> NestedIterator<PostingKey> for FieldScanIterator<C> {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::IllegalState(
                "this scan cannot be re-initialized".to_string(),
            ));
        }
        self.ensure_scan_range();
        if let Some(range) = self.scan_range.clone() {
            self.source.seek(&range)?;
        }
        self.initialized = true;
        self.find_top()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.top.is_some())
    }

    fn next(&mut self) -> Result<Option<PostingKey>> {
        self.ensure_initialized()?;
        let emitted = self.top.take();
        if emitted.is_some() {
            self.prev_document = mem::take(&mut self.document);
            self.find_top()?;
        }
        Ok(emitted)
    }

    fn move_to(&mut self, pointer: &PostingKey) -> Result<Option<PostingKey>> {
        self.ensure_initialized()?;
        if let Some(top) = &self.top {
            if top >= pointer {
                return Err(Error::IllegalState(format!(
                    "move_to called at or beyond the move point: top={:?}, minimum={:?}",
                    top, pointer
                )));
            }
        }
        // no cheaper bulk-skip exists on this leaf
        loop {
            match self.next()? {
                Some(value) => {
                    if value >= *pointer {
                        return Ok(Some(value));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn peek(&self) -> Result<Option<PostingKey>> {
        self.ensure_initialized()?;
        Ok(self.top.clone())
    }

    fn document(&self) -> &Document {
        &self.prev_document
    }

    fn children(&self) -> Vec<&dyn NestedIterator<PostingKey>> {
        Vec::new()
    }

    fn leaves(&self) -> Vec<&dyn NestedIterator<PostingKey>> {
        vec![self as &dyn NestedIterator<PostingKey>]
    }

    fn set_context(&mut self, _context: PostingKey) {
        // a physical scan has no deferred branches
    }

    fn deep_copy(&self) -> Result<Box<dyn NestedIterator<PostingKey>>> {
        Err(Error::UnsupportedOperation(
            "a field scan cannot be deep copied; construct a new scan over the range".to_string(),
        ))
    }
}
