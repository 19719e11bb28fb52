use bson::Bson;
use std::collections::BTreeMap;

/// Accumulated match evidence for one emitted candidate key.
///
/// A document is built incrementally as branches of the composition tree
/// contribute: every branch whose head equals the chosen output merges its
/// attributes in. A value that survived purely through the evaluation context
/// (no branch matched it) carries an empty, presence-only document.
///
/// Attributes are multi-valued: one field of one record may hold several
/// postings within the scanned bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    attributes: BTreeMap<String, Vec<Bson>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the named attribute.
    pub fn put(&mut self, field: impl Into<String>, value: Bson) {
        self.attributes.entry(field.into()).or_default().push(value);
    }

    /// Merges all attributes of `other` into this document.
    pub fn merge(&mut self, other: &Document) {
        for (field, values) in &other.attributes {
            self.attributes
                .entry(field.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    pub fn get(&self, field: &str) -> Option<&[Bson]> {
        self.attributes.get(field).map(Vec::as_slice)
    }

    /// Number of distinct attribute names.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
