//! Segment list chain walker.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::image::ImageView;
use crate::outcome::{CorruptKind, Entry};
use crate::types::{Address, MemorySegment, SegmentKind};

/// Largest number of segments decoded from one list before the walk is
/// declared truncated.
pub const DEFAULT_SEGMENT_LIMIT: usize = 1 << 20;

/// Everything recovered from one segment list
///
/// `entries` is in walk order. Valid segments are `Ok`; a walk that hit a
/// corrupt link carries exactly one `Err` at the position it was reached,
/// after which that sub-list contributes nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentListDump
{
    /// Address of the list header the walk started from.
    pub list: Address,
    /// Sub-list headers visited, in order.
    pub sublists: Vec<Address>,
    /// Segments and corruption markers in walk order.
    pub entries: Vec<Entry<MemorySegment>>,
}

impl SegmentListDump
{
    /// Valid segments, skipping corruption markers.
    pub fn segments(&self) -> impl Iterator<Item = &MemorySegment>
    {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    /// Number of valid segments.
    pub fn segment_count(&self) -> usize
    {
        self.segments().count()
    }

    /// `true` if any sub-list was cut short by corruption.
    pub fn is_truncated(&self) -> bool
    {
        self.entries.iter().any(Result::is_err)
    }

    /// Sum of segment sizes.
    pub fn total_size(&self) -> u64
    {
        self.segments().fold(0u64, |sum, segment| sum.saturating_add(segment.size))
    }

    /// Sum of allocated bytes (`alloc - base`) over all segments.
    pub fn total_in_use(&self) -> u64
    {
        self.segments().fold(0u64, |sum, segment| sum.saturating_add(segment.in_use()))
    }
}

/// Walk a segment list, returning every segment in order
///
/// The list is a chain of sub-list headers, each pointing at a singly linked
/// list of segment descriptors. The walk never fails as a whole:
///
/// - an unreadable segment (or a link that loops) truncates its sub-list with
///   one marker, then the walk moves on to the next sub-list, whose address
///   was read from the intact header
/// - an unreadable or looping sub-list header ends the walk with one marker
/// - more than `limit` segments ends the walk with a `Truncated` marker
///
/// A null `list` yields an empty dump.
pub fn dump_segment_list(view: &ImageView, list: Address, limit: usize) -> SegmentListDump
{
    let mut dump = SegmentListDump {
        list,
        sublists: Vec::new(),
        entries: Vec::new(),
    };
    let mut seen_lists = HashSet::new();
    let mut seen_segments = HashSet::new();
    let mut decoded = 0usize;
    let mut header = list;

    while !header.is_null() {
        if !seen_lists.insert(header) {
            dump.entries.push(Err(view.corrupt(header, "segment sub-list", CorruptKind::Cycle)));
            break;
        }

        let (next_list, first) = match read_sublist_header(view, header) {
            Ok(links) => links,
            Err(corrupt) => {
                debug!("Segment list {} ends at corrupt sub-list: {corrupt}", list.format(view.width()));
                dump.entries.push(Err(corrupt));
                break;
            }
        };
        dump.sublists.push(header);
        trace!("Walking segment sub-list {}", header.format(view.width()));

        let mut cursor = first;
        while !cursor.is_null() {
            if decoded >= limit {
                dump.entries.push(Err(view.corrupt(cursor, "memory segment", CorruptKind::Truncated { limit })));
                return dump;
            }
            if !seen_segments.insert(cursor) {
                dump.entries.push(Err(view.corrupt(cursor, "memory segment", CorruptKind::Cycle)));
                break;
            }
            match read_segment(view, cursor) {
                Ok((segment, next)) => {
                    dump.entries.push(Ok(segment));
                    decoded += 1;
                    cursor = next;
                }
                Err(corrupt) => {
                    debug!("Segment sub-list {} truncated: {corrupt}", header.format(view.width()));
                    dump.entries.push(Err(corrupt));
                    break;
                }
            }
        }

        header = next_list;
    }

    dump
}

/// Decode a sub-list header into its `(next_list, first_segment)` links.
fn read_sublist_header(view: &ImageView, header: Address) -> Entry<(Address, Address)>
{
    let layout = &view.layouts().segment_list;
    let next_list = view.pointer_field(header, layout.next_list, "segment sub-list")?;
    let first = view.pointer_field(header, layout.first_segment, "segment sub-list")?;
    Ok((next_list, first))
}

/// Decode one segment descriptor and its `next` link.
fn read_segment(view: &ImageView, record: Address) -> Entry<(MemorySegment, Address)>
{
    const WHAT: &str = "memory segment";
    let layout = &view.layouts().segment;

    let next = view.pointer_field(record, layout.next, WHAT)?;
    let base = view.pointer_field(record, layout.base, WHAT)?;
    let alloc = view.pointer_field(record, layout.alloc, WHAT)?;
    let size = view.uptr_field(record, layout.length, WHAT)?;
    let kind = view.u32_field(record, layout.kind, WHAT)?;
    let module = view.pointer_field(record, layout.module, WHAT)?;

    let segment = MemorySegment {
        descriptor: Some(record),
        base,
        size,
        alloc,
        kind: SegmentKind::from_raw(kind),
        module: (!module.is_null()).then_some(module),
    };
    Ok((segment, next))
}
