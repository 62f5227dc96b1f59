//! # Memory-Segment Index
//!
//! Address-to-segment lookup and enumeration over the runtime's segment
//! bookkeeping.
//!
//! - [`SegmentIndex`] answers "which segment contains address A"
//! - [`dump_segment_list`] walks a native segment list, which is a chain of
//!   sub-lists each holding a linked list of segment descriptors
//!
//! Neither assumes the segments are disjoint. Overlapping and zero-length
//! ranges from a damaged image are kept and surfaced; [`SegmentIndex::overlaps`]
//! reports them so the caller can decide whether they indicate corruption.

mod walk;

pub use walk::{dump_segment_list, SegmentListDump, DEFAULT_SEGMENT_LIMIT};

use crate::types::{Address, MemorySegment};

#[derive(Debug, Clone)]
enum Lookup
{
    /// Indices ordered by base; every range ends at or before the next base.
    Sorted(Vec<usize>),
    /// Overlapping ranges present: scan in list order.
    Scan,
}

/// Lookup structure over a set of memory segments
///
/// Built once from the segments in list order. If the segments (in some
/// order) are pairwise disjoint, lookups use a binary search over a
/// base-sorted permutation. Otherwise they fall back to a linear scan that
/// returns the first containing segment in list order.
///
/// ## Example
///
/// ```rust
/// use coroner_core::segments::SegmentIndex;
/// use coroner_core::types::{Address, MemorySegment, SegmentKind};
///
/// let index = SegmentIndex::new(vec![
///     MemorySegment::new(Address::from(0x1000), 0x100, SegmentKind::Heap),
///     MemorySegment::new(Address::from(0x2000), 0x50, SegmentKind::Code),
/// ]);
///
/// assert_eq!(index.containing_segment(Address::from(0x1050)).map(|s| s.base), Some(Address::from(0x1000)));
/// assert!(index.containing_segment(Address::from(0x3000)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SegmentIndex
{
    segments: Vec<MemorySegment>,
    lookup: Lookup,
}

impl Default for SegmentIndex
{
    fn default() -> Self
    {
        Self::new(Vec::new())
    }
}

impl FromIterator<MemorySegment> for SegmentIndex
{
    fn from_iter<I: IntoIterator<Item = MemorySegment>>(iter: I) -> Self
    {
        Self::new(iter.into_iter().collect())
    }
}

impl SegmentIndex
{
    /// Index the given segments, keeping their list order.
    #[must_use]
    pub fn new(segments: Vec<MemorySegment>) -> Self
    {
        let lookup = Self::plan(&segments);
        Self { segments, lookup }
    }

    fn plan(segments: &[MemorySegment]) -> Lookup
    {
        let mut order: Vec<usize> = (0..segments.len()).collect();
        order.sort_by_key(|&i| (segments[i].base, segments[i].end()));

        let disjoint = order
            .windows(2)
            .all(|pair| segments[pair[0]].end() <= segments[pair[1]].base);

        if disjoint {
            Lookup::Sorted(order)
        } else {
            Lookup::Scan
        }
    }

    /// Segments in their original list order.
    pub fn segments(&self) -> &[MemorySegment]
    {
        &self.segments
    }

    /// Iterate segments in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemorySegment>
    {
        self.segments.iter()
    }

    /// Number of indexed segments.
    pub fn len(&self) -> usize
    {
        self.segments.len()
    }

    /// `true` if no segments are indexed.
    pub fn is_empty(&self) -> bool
    {
        self.segments.is_empty()
    }

    /// Whether lookups use binary search (segments are pairwise disjoint).
    pub fn is_sorted_disjoint(&self) -> bool
    {
        matches!(self.lookup, Lookup::Sorted(_))
    }

    /// The segment containing `address`, if any
    ///
    /// An address outside every segment is an ordinary empty result, not an
    /// error.
    pub fn containing_segment(&self, address: Address) -> Option<&MemorySegment>
    {
        match &self.lookup {
            Lookup::Sorted(order) => {
                let after = order.partition_point(|&i| self.segments[i].base <= address);
                let candidate = &self.segments[*order.get(after.checked_sub(1)?)?];
                candidate.contains(address).then_some(candidate)
            }
            Lookup::Scan => self.segments.iter().find(|segment| segment.contains(address)),
        }
    }

    /// Every segment containing `address`, in list order.
    pub fn segments_containing(&self, address: Address) -> Vec<&MemorySegment>
    {
        self.segments.iter().filter(|segment| segment.contains(address)).collect()
    }

    /// Pairs of list positions whose ranges share at least one byte
    ///
    /// Each pair is reported once as `(lower position, higher position)`.
    pub fn overlaps(&self) -> Vec<(usize, usize)>
    {
        let Lookup::Scan = self.lookup else {
            return Vec::new();
        };

        let mut order: Vec<usize> = (0..self.segments.len()).collect();
        order.sort_by_key(|&i| self.segments[i].base);

        let mut pairs = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            let current = &self.segments[i];
            for &j in &order[pos + 1..] {
                let other = &self.segments[j];
                if other.base >= current.end() {
                    break;
                }
                if current.overlaps(other) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

impl<'a> IntoIterator for &'a SegmentIndex
{
    type Item = &'a MemorySegment;
    type IntoIter = std::slice::Iter<'a, MemorySegment>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::SegmentKind;

    fn seg(base: u64, size: u64) -> MemorySegment
    {
        MemorySegment::new(Address::new(base), size, SegmentKind::Heap)
    }

    #[test]
    fn test_unsorted_disjoint_uses_binary_search()
    {
        let index = SegmentIndex::new(vec![seg(0x3000, 0x10), seg(0x1000, 0x100), seg(0x2000, 0x50)]);
        assert!(index.is_sorted_disjoint());
        assert_eq!(index.containing_segment(Address::new(0x2010)).unwrap().base, Address::new(0x2000));
        assert_eq!(index.containing_segment(Address::new(0x300f)).unwrap().base, Address::new(0x3000));
        assert!(index.containing_segment(Address::new(0x0fff)).is_none());
        assert!(index.containing_segment(Address::new(0x1100)).is_none());
    }

    #[test]
    fn test_zero_length_segment_between_neighbours()
    {
        let index = SegmentIndex::new(vec![seg(0x1000, 0x100), seg(0x1100, 0), seg(0x1100, 0x10)]);
        assert!(index.is_sorted_disjoint());
        assert_eq!(index.containing_segment(Address::new(0x1100)).unwrap().size, 0x10);
    }

    #[test]
    fn test_overlapping_segments_fall_back_to_scan()
    {
        let index = SegmentIndex::new(vec![seg(0x1000, 0x100), seg(0x1080, 0x100), seg(0x4000, 0x10)]);
        assert!(!index.is_sorted_disjoint());
        // First match in list order wins
        assert_eq!(index.containing_segment(Address::new(0x1090)).unwrap().base, Address::new(0x1000));
        assert_eq!(index.segments_containing(Address::new(0x1090)).len(), 2);
        assert_eq!(index.overlaps(), vec![(0, 1)]);
    }

    #[test]
    fn test_empty_index()
    {
        let index = SegmentIndex::default();
        assert!(index.is_empty());
        assert!(index.containing_segment(Address::new(0)).is_none());
        assert!(index.overlaps().is_empty());
    }
}
