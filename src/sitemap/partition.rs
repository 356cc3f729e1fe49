//! Partitioning of the sitemap index across independent runs
//!
//! A run is handed `(offset, count)` and processes only that slice of the
//! index's leaf sitemaps. Runs share nothing, so many of them can cover one
//! site in parallel as long as their slices are disjoint.

use crate::config::PartitionConfig;
use std::fmt;
use std::ops::Range;

/// The slice `[offset, offset + count)` of leaf sitemaps a run owns
///
/// `count == 0` means "from `offset` to the end".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Partition {
    pub offset: usize,
    pub count: usize,
}

impl Partition {
    pub fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    pub fn from_config(config: &PartitionConfig) -> Self {
        Self::new(config.offset, config.count)
    }

    /// Index range covered within a list of `len` entries
    ///
    /// Offsets past the end give an empty range rather than an error.
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        let end = if self.count == 0 {
            len
        } else {
            self.offset.saturating_add(self.count).min(len)
        };
        start..end
    }

    /// The owned slice of `items`, in original order
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.bounds(items.len())]
    }

    pub fn is_unbounded(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "[{}, end)", self.offset)
        } else {
            write!(f, "[{}, {})", self.offset, self.offset.saturating_add(self.count))
        }
    }
}
