use crate::cursor::SortedCursor;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::key::PostingKey;
use bson::Bson;

/// Strategy deciding how the physical entries of one logical match become a
/// [`Document`]. Injected into the scan leaf at construction so the leaf
/// stays decoupled from how multi-part values merge.
pub trait FieldAggregator: Send + Sync {
    /// Consumes every physical entry belonging to one logical match, adding
    /// evidence to `doc` when `build_document` is set, and returns the
    /// match's posting key. Leaves the source positioned after the match.
    fn apply(
        &self,
        source: &mut dyn SortedCursor,
        doc: &mut Document,
        build_document: bool,
    ) -> Result<PostingKey>;
}

/// Default aggregation: one logical match is the run of consecutive entries
/// for one record and field; each entry contributes its field value as an
/// attribute (multi-value postings).
#[derive(Debug, Default)]
pub struct FieldValueAggregator;

impl FieldValueAggregator {
    pub fn new() -> Self {
        FieldValueAggregator
    }
}

impl FieldAggregator for FieldValueAggregator {
    fn apply(
        &self,
        source: &mut dyn SortedCursor,
        doc: &mut Document,
        build_document: bool,
    ) -> Result<PostingKey> {
        let first = match source.top() {
            Some((key, _)) => PostingKey::parse(key)?,
            None => {
                return Err(Error::IllegalState(
                    "aggregation requires a positioned source".to_string(),
                ))
            }
        };
        if build_document {
            doc.put(
                first.field_name.clone(),
                Bson::String(first.field_value.clone()),
            );
        }
        source.advance()?;

        loop {
            let entry = match source.top() {
                Some((key, _)) => PostingKey::parse(key)?,
                None => break,
            };
            if !entry.same_record(&first) || entry.field_name != first.field_name {
                break;
            }
            if build_document {
                doc.put(
                    entry.field_name.clone(),
                    Bson::String(entry.field_value.clone()),
                );
            }
            source.advance()?;
        }
        Ok(first)
    }
}
