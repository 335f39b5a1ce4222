// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use std::ops::Range;

/// A set of ordered types.
///
/// Implemented as an ordered list of ranges that do not touch or overlap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RangeSet<T>(Vec<Range<T>>);

impl<T: Ord + Copy> RangeSet<T> {
    /// Returns a new empty `RangeSet`.
    #[inline]
    pub(crate) fn new() -> Self {
        RangeSet(Vec::new())
    }

    /// Returns whether all elements of `range` are contained in the set.
    #[inline]
    pub(crate) fn contains(&self, elements: Range<T>) -> bool {
        if elements.start >= elements.end {
            return true;
        }

        self.0
            .iter()
            .any(|range| range.start <= elements.start && range.end >= elements.end)
    }

    /// Returns an iterator over the ranges in the set.
    #[allow(dead_code)]
    #[inline]
    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Range<T>> {
        self.0.iter()
    }

    /// Inserts the elements of `elements` into the set.
    pub(crate) fn insert(&mut self, elements: Range<T>) {
        if elements.start >= elements.end {
            return;
        }

        // Find the first range that is not entirely before `elements`.
        let start_index = self
            .0
            .iter()
            .position(|range| range.end >= elements.start)
            .unwrap_or(self.0.len());

        // Find the first range that is entirely after `elements`.
        let end_index = self
            .0
            .iter()
            .position(|range| range.start > elements.end)
            .unwrap_or(self.0.len());

        if start_index < end_index {
            // `elements` touches or overlaps with the ranges in `start_index..end_index`.
            let start = std::cmp::min(self.0[start_index].start, elements.start);
            let end = std::cmp::max(self.0[end_index - 1].end, elements.end);
            self.0.drain(start_index + 1..end_index);
            self.0[start_index] = start..end;
        } else {
            self.0.insert(start_index, elements);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RangeSet;

    #[test]
    fn merges_touching_ranges() {
        let mut set = RangeSet::new();
        set.insert(16u32..48);
        set.insert(48..80);

        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), vec![16..80]);
        assert!(set.contains(20..80));
    }

    #[test]
    fn gaps_are_not_contained() {
        let mut set = RangeSet::new();
        set.insert(0u32..16);
        set.insert(32..48);

        assert!(set.contains(0..16));
        assert!(!set.contains(0..48));
        assert!(!set.contains(8..20));

        set.insert(12..36);
        assert!(set.contains(0..48));
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn empty_range() {
        let set = RangeSet::<u32>::new();
        assert!(set.contains(4..4));
        assert!(!set.contains(0..4));
    }
}
