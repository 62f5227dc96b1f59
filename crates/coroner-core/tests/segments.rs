//! Tests for segment-list walking and segment lookup

mod common;

use std::sync::Arc;

use common::{ImageWriter, UNMAPPED};
use coroner_core::image::{ImageView, Layouts};
use coroner_core::outcome::CorruptKind;
use coroner_core::segments::{dump_segment_list, SegmentIndex, DEFAULT_SEGMENT_LIMIT};
use coroner_core::types::{Address, MemorySegment, PointerWidth, SegmentKind, SpaceId};

const LIST_A: u64 = 0x10000;
const LIST_B: u64 = 0x10040;
const SEG_1: u64 = 0x10100;
const SEG_2: u64 = 0x10200;
const SEG_3: u64 = 0x10300;

fn view(writer: ImageWriter) -> ImageView
{
    let layouts = Arc::new(writer.layouts().clone());
    ImageView::new(SpaceId::from_raw(7), writer.build(), layouts)
}

/// Two sub-lists: A holds segments 1 and 2, B holds segment 3.
fn two_sublists(width: PointerWidth, seg_2_next: u64, list_a_next: u64) -> ImageWriter
{
    let mut w = ImageWriter::new(width);
    w.segment_list(LIST_A, list_a_next, SEG_1, 0x150);
    w.segment_list(LIST_B, 0, SEG_3, 0x10);
    w.segment(SEG_1, SEG_2, 0x1000, 0x1080, 0x100, SegmentKind::RAW_HEAP, 0);
    w.segment(SEG_2, seg_2_next, 0x2000, 0x2000, 0x50, SegmentKind::RAW_CODE, 0x10800);
    w.segment(SEG_3, 0, 0x3000, 0x3010, 0x10, SegmentKind::RAW_STACK, 0);
    w
}

#[test]
fn test_dump_walks_every_sublist_in_order()
{
    let view = view(two_sublists(PointerWidth::Bits64, 0, LIST_B));
    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);

    assert_eq!(dump.list, Address::new(LIST_A));
    assert_eq!(dump.sublists, vec![Address::new(LIST_A), Address::new(LIST_B)]);
    assert!(!dump.is_truncated());

    let bases: Vec<u64> = dump.segments().map(|s| s.base.value()).collect();
    assert_eq!(bases, vec![0x1000, 0x2000, 0x3000]);

    let code = dump.segments().nth(1).unwrap();
    assert_eq!(code.kind, SegmentKind::Code);
    assert_eq!(code.descriptor, Some(Address::new(SEG_2)));
    assert_eq!(code.module, Some(Address::new(0x10800)));

    assert_eq!(dump.total_size(), 0x100 + 0x50 + 0x10);
    assert_eq!(dump.total_in_use(), 0x80 + 0x10);
}

#[test]
fn test_corrupt_segment_link_truncates_sublist_only()
{
    let view = view(two_sublists(PointerWidth::Bits64, UNMAPPED, LIST_B));
    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);

    assert_eq!(dump.entries.len(), 4);
    assert!(dump.entries[0].is_ok());
    assert!(dump.entries[1].is_ok());
    let marker = dump.entries[2].as_ref().unwrap_err();
    assert_eq!(marker.address, Address::new(UNMAPPED));
    assert_eq!(marker.what, "memory segment");
    assert_eq!(marker.space, SpaceId::from_raw(7));
    assert!(matches!(marker.kind, CorruptKind::Unreadable { .. }));

    // The next sub-list's link was already read, so it is still walked
    assert_eq!(dump.entries[3].as_ref().unwrap().base, Address::new(0x3000));
}

#[test]
fn test_corrupt_sublist_header_ends_walk()
{
    let view = view(two_sublists(PointerWidth::Bits64, 0, UNMAPPED));
    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);

    assert_eq!(dump.sublists, vec![Address::new(LIST_A)]);
    assert_eq!(dump.segment_count(), 2);
    assert_eq!(dump.entries.len(), 3);
    assert_eq!(dump.entries[2].as_ref().unwrap_err().what, "segment sub-list");
}

#[test]
fn test_segment_cycle_is_reported_once()
{
    let view = view(two_sublists(PointerWidth::Bits64, SEG_1, 0));
    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);

    assert_eq!(dump.segment_count(), 2);
    let marker = dump.entries.last().unwrap().as_ref().unwrap_err();
    assert_eq!(marker.kind, CorruptKind::Cycle);
    assert_eq!(marker.address, Address::new(SEG_1));
}

#[test]
fn test_segment_limit_truncates()
{
    let view = view(two_sublists(PointerWidth::Bits64, 0, LIST_B));
    let dump = dump_segment_list(&view, Address::new(LIST_A), 1);

    assert_eq!(dump.entries.len(), 2);
    assert_eq!(dump.entries[1].as_ref().unwrap_err().kind, CorruptKind::Truncated { limit: 1 });
}

#[test]
fn test_null_list_is_empty()
{
    let view = view(ImageWriter::new(PointerWidth::Bits64));
    let dump = dump_segment_list(&view, Address::ZERO, DEFAULT_SEGMENT_LIMIT);
    assert!(dump.entries.is_empty());
    assert!(dump.sublists.is_empty());
}

#[test]
fn test_dump_32_bit_image()
{
    let view = view(two_sublists(PointerWidth::Bits32, 0, LIST_B));
    assert_eq!(view.layouts(), &Layouts::for_width(PointerWidth::Bits32));
    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);
    let sizes: Vec<u64> = dump.segments().map(|s| s.size).collect();
    assert_eq!(sizes, vec![0x100, 0x50, 0x10]);
}

#[test]
fn test_zero_length_and_overlapping_segments_are_kept()
{
    let mut w = ImageWriter::new(PointerWidth::Bits64);
    w.segment_list(LIST_A, 0, SEG_1, 0);
    w.segment(SEG_1, SEG_2, 0x1000, 0x1000, 0x100, SegmentKind::RAW_HEAP, 0);
    w.segment(SEG_2, SEG_3, 0x1080, 0x1080, 0x100, SegmentKind::RAW_HEAP, 0);
    w.segment(SEG_3, 0, 0x5000, 0x5000, 0, SegmentKind::RAW_DATA, 0);
    let view = view(w);

    let dump = dump_segment_list(&view, Address::new(LIST_A), DEFAULT_SEGMENT_LIMIT);
    assert_eq!(dump.segment_count(), 3);

    let index: SegmentIndex = dump.segments().cloned().collect();
    assert!(!index.is_sorted_disjoint());
    assert_eq!(index.overlaps(), vec![(0, 1)]);
    assert_eq!(index.containing_segment(Address::new(0x10a0)).unwrap().base, Address::new(0x1000));
    assert!(index.containing_segment(Address::new(0x5000)).is_none());
}

#[test]
fn test_index_lookup_matches_linear_scan()
{
    let segments: Vec<MemorySegment> = (0..64u64)
        .rev()
        .map(|i| MemorySegment::new(Address::new(0x10_0000 + i * 0x1000), 0x800, SegmentKind::Heap))
        .collect();
    let index = SegmentIndex::new(segments.clone());
    assert!(index.is_sorted_disjoint());

    for raw in (0x0f_f000..0x15_0000u64).step_by(0x3f0) {
        let address = Address::new(raw);
        let expected = segments.iter().find(|s| s.contains(address));
        assert_eq!(index.containing_segment(address), expected, "raw 0x{raw:x}");
    }
}
