use crate::error::{Error, Result};

/// The column family under which field-index postings are stored.
pub const POSTING_FAMILY: &[u8] = b"fi";

const SEPARATOR: u8 = 0;

/// A structured key addressing one field-index posting:
/// `(shard, data type, record id, field value, field name)`.
///
/// The derived ordering matches the byte ordering of [`PostingKey::encode`],
/// provided no component contains a NUL byte (the encoding separator sorts
/// below every other byte). Keys for the same record differ only in their
/// field components, so clearing those via [`PostingKey::record_pointer`]
/// yields the canonical comparison domain used across branches of a
/// composition tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostingKey {
    pub shard: String,
    pub data_type: String,
    pub record_id: String,
    pub field_value: String,
    pub field_name: String,
}

impl PostingKey {
    pub fn new(
        shard: impl Into<String>,
        data_type: impl Into<String>,
        record_id: impl Into<String>,
        field_value: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        PostingKey {
            shard: shard.into(),
            data_type: data_type.into(),
            record_id: record_id.into(),
            field_value: field_value.into(),
            field_name: field_name.into(),
        }
    }

    /// Encodes the key into raw bytes that sort identically to the struct:
    /// `[family][\0][shard][\0][data_type][\0][record_id][\0][field_value][\0][field_name]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            POSTING_FAMILY.len()
                + self.shard.len()
                + self.data_type.len()
                + self.record_id.len()
                + self.field_value.len()
                + self.field_name.len()
                + 5,
        );
        out.extend_from_slice(POSTING_FAMILY);
        for part in [
            &self.shard,
            &self.data_type,
            &self.record_id,
            &self.field_value,
            &self.field_name,
        ] {
            out.push(SEPARATOR);
            out.extend_from_slice(part.as_bytes());
        }
        out
    }

    /// Decodes a physical key. Fails on a wrong family, a wrong number of
    /// components, or non-UTF-8 content, so that a broken scan surfaces as an
    /// error rather than an empty result.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let parts: Vec<&[u8]> = bytes.split(|b| *b == SEPARATOR).collect();
        if parts.len() != 6 {
            return Err(Error::MalformedKey(format!(
                "expected 6 components, found {}",
                parts.len()
            )));
        }
        if parts[0] != POSTING_FAMILY {
            return Err(Error::MalformedKey(format!(
                "unexpected family: {:?}",
                String::from_utf8_lossy(parts[0])
            )));
        }
        fn decode(part: &[u8]) -> Result<String> {
            std::str::from_utf8(part)
                .map(str::to_owned)
                .map_err(|_| Error::MalformedKey("non-utf8 key component".to_string()))
        }
        Ok(PostingKey {
            shard: decode(parts[1])?,
            data_type: decode(parts[2])?,
            record_id: decode(parts[3])?,
            field_value: decode(parts[4])?,
            field_name: decode(parts[5])?,
        })
    }

    /// The canonical record pointer: this key with its field components
    /// cleared. Two postings of the same record compare equal through it.
    pub fn record_pointer(&self) -> PostingKey {
        PostingKey {
            shard: self.shard.clone(),
            data_type: self.data_type.clone(),
            record_id: self.record_id.clone(),
            field_value: String::new(),
            field_name: String::new(),
        }
    }

    /// True when `other` addresses the same record.
    pub fn same_record(&self, other: &PostingKey) -> bool {
        self.shard == other.shard
            && self.data_type == other.data_type
            && self.record_id == other.record_id
    }
}
