use std::io;
use std::ops::Bound;

/// A physical scan range over raw sorted keys.
///
/// Bounds follow the `std::ops::Bound` convention so inclusive, exclusive and
/// unbounded ends compose uniformly. An optional family prefix restricts the
/// scan to one column family; entries outside it are never surfaced.
#[derive(Debug, Clone)]
pub struct ScanRange {
    start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
    family: Option<Vec<u8>>,
}

impl ScanRange {
    pub fn new(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        ScanRange {
            start,
            end,
            family: None,
        }
    }

    pub fn with_family(mut self, family: Vec<u8>) -> Self {
        self.family = Some(family);
        self
    }

    pub fn start(&self) -> &Bound<Vec<u8>> {
        &self.start
    }

    pub fn end(&self) -> &Bound<Vec<u8>> {
        &self.end
    }

    pub fn family(&self) -> Option<&[u8]> {
        self.family.as_deref()
    }

    /// A copy of this range with its start bound replaced, used when a scan
    /// re-seeks forward within the same overall bound.
    pub fn starting_at(&self, start: Bound<Vec<u8>>) -> ScanRange {
        ScanRange {
            start,
            end: self.end.clone(),
            family: self.family.clone(),
        }
    }

    fn starts_before(&self, key: &[u8]) -> bool {
        match &self.start {
            Bound::Included(s) => s.as_slice() <= key,
            Bound::Excluded(s) => s.as_slice() < key,
            Bound::Unbounded => true,
        }
    }

    fn ends_after(&self, key: &[u8]) -> bool {
        match &self.end {
            Bound::Included(e) => key <= e.as_slice(),
            Bound::Excluded(e) => key < e.as_slice(),
            Bound::Unbounded => true,
        }
    }

    /// True when `key` falls within the bounds and the family restriction.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.starts_before(key) && self.ends_after(key) && self.matches_family(key)
    }

    fn matches_family(&self, key: &[u8]) -> bool {
        match &self.family {
            None => true,
            Some(f) => key.starts_with(f) && key.get(f.len()) == Some(&0),
        }
    }
}

/// The single capability this engine requires of a leaf's data source: a
/// cursor over physically sorted key-value pairs supporting seek-to-range and
/// single-step advance. A call may block on I/O against the storage engine;
/// errors propagate unmodified.
pub trait SortedCursor {
    /// Positions the cursor at the first entry within `range`.
    fn seek(&mut self, range: &ScanRange) -> io::Result<()>;

    /// Advances past the current entry.
    fn advance(&mut self) -> io::Result<()>;

    /// The current entry, or `None` once the range is exhausted.
    fn top(&self) -> Option<(&[u8], &[u8])>;
}

/// A [`SortedCursor`] over an in-memory sorted vector. Backs the unit and
/// integration tests; entries must be sorted by key.
pub struct VecCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
    range: Option<ScanRange>,
}

impl VecCursor {
    pub fn new(mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        VecCursor {
            entries,
            pos: 0,
            range: None,
        }
    }

    fn in_range(&self, pos: usize) -> bool {
        match (&self.range, self.entries.get(pos)) {
            (Some(range), Some((key, _))) => range.contains(key),
            _ => false,
        }
    }

    /// Skips entries excluded by the family restriction without leaving the
    /// bounded portion of the range.
    fn skip_filtered(&mut self) {
        while let (Some(range), Some((key, _))) = (&self.range, self.entries.get(self.pos)) {
            if !range.ends_after(key) {
                // past the end bound, exhausted
                self.pos = self.entries.len();
                break;
            }
            if range.contains(key) {
                break;
            }
            self.pos += 1;
        }
    }
}

impl SortedCursor for VecCursor {
    fn seek(&mut self, range: &ScanRange) -> io::Result<()> {
        self.range = Some(range.clone());
        self.pos = self
            .entries
            .partition_point(|(key, _)| match range.start() {
                Bound::Included(s) => key < s,
                Bound::Excluded(s) => key <= s,
                Bound::Unbounded => false,
            });
        self.skip_filtered();
        Ok(())
    }

    fn advance(&mut self) -> io::Result<()> {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
        self.skip_filtered();
        Ok(())
    }

    fn top(&self) -> Option<(&[u8], &[u8])> {
        if self.in_range(self.pos) {
            let (key, value) = &self.entries[self.pos];
            Some((key.as_slice(), value.as_slice()))
        } else {
            None
        }
    }
}
