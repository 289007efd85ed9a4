//! Vendor ID ranges used by the range encoding of vendor consents.
//!
use num_iter::range_inclusive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single entry of a range encoded vendor section.
///
/// The distinction between a single ID and a range is kept because both are
/// encoded differently, even when a range only covers one ID.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RangeEntry {
    Single(u16),
    Range(u16, u16),
}

impl RangeEntry {
    pub fn min(&self) -> u16 {
        match *self {
            RangeEntry::Single(id) => id,
            RangeEntry::Range(min, _) => min,
        }
    }

    pub fn max(&self) -> u16 {
        match *self {
            RangeEntry::Single(id) => id,
            RangeEntry::Range(_, max) => max,
        }
    }

    pub fn contains(&self, id: u16) -> bool {
        self.min() <= id && id <= self.max()
    }

    /// Iterates over all IDs covered by this entry.
    pub fn ids(&self) -> impl Iterator<Item = u16> {
        range_inclusive(self.min(), self.max())
    }

    pub(crate) fn is_range(&self) -> bool {
        matches!(self, RangeEntry::Range(..))
    }
}

/// An ordered list of vendor ID entries with fast membership lookup.
///
/// Entries are kept as given, in order, so that they can be encoded back
/// identically. Lookups go through a sorted list of disjoint intervals built
/// from the union of all entries, so overlapping or unsorted entries are
/// handled: an ID is a member if any entry covers it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(from = "Vec<RangeEntry>", into = "Vec<RangeEntry>")
)]
pub struct RangeSet {
    entries: Vec<RangeEntry>,
    intervals: Vec<(u16, u16)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RangeEntry) {
        self.entries.push(entry);
        // an inverted range covers nothing
        if entry.min() <= entry.max() {
            self.insert_interval(entry.min(), entry.max());
        }
    }

    pub fn contains(&self, id: u16) -> bool {
        let i = self.intervals.partition_point(|&(_, max)| max < id);
        self.intervals.get(i).is_some_and(|&(min, _)| min <= id)
    }

    pub fn entries(&self) -> &[RangeEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RangeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_interval(&mut self, min: u16, max: u16) {
        let (min32, max32) = (u32::from(min), u32::from(max));

        // intervals[start..end] overlap or touch [min, max] and get merged with it
        let start = self
            .intervals
            .partition_point(|&(_, hi)| u32::from(hi) + 1 < min32);
        let end = self
            .intervals
            .partition_point(|&(lo, _)| u32::from(lo) <= max32 + 1);

        let merged = if start < end {
            (
                min.min(self.intervals[start].0),
                max.max(self.intervals[end - 1].1),
            )
        } else {
            (min, max)
        };
        self.intervals.splice(start..end, [merged]);
    }
}

impl FromIterator<RangeEntry> for RangeSet {
    fn from_iter<T: IntoIterator<Item = RangeEntry>>(iter: T) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.push(entry);
        }
        set
    }
}

impl From<Vec<RangeEntry>> for RangeSet {
    fn from(entries: Vec<RangeEntry>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<RangeSet> for Vec<RangeEntry> {
    fn from(set: RangeSet) -> Self {
        set.entries
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a RangeEntry;
    type IntoIter = std::slice::Iter<'a, RangeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
