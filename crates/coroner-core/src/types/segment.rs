//! Memory segment types.

use std::fmt;

use super::Address;

/// What a memory segment holds
///
/// Decoded from the segment's `kind` field. Values the model does not know
/// are kept verbatim in `Unknown` rather than rejected, since an unfamiliar
/// kind is not by itself evidence of corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind
{
    /// Executable code
    Code,
    /// Managed or native heap
    Heap,
    /// Thread stack
    Stack,
    /// Static or runtime metadata
    Data,
    /// Any other raw kind value
    Unknown(u32),
}

impl SegmentKind
{
    /// Raw kind value for `Code`.
    pub const RAW_CODE: u32 = 1;
    /// Raw kind value for `Heap`.
    pub const RAW_HEAP: u32 = 2;
    /// Raw kind value for `Stack`.
    pub const RAW_STACK: u32 = 3;
    /// Raw kind value for `Data`.
    pub const RAW_DATA: u32 = 4;

    /// Decode a raw kind value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self
    {
        match raw {
            Self::RAW_CODE => SegmentKind::Code,
            Self::RAW_HEAP => SegmentKind::Heap,
            Self::RAW_STACK => SegmentKind::Stack,
            Self::RAW_DATA => SegmentKind::Data,
            other => SegmentKind::Unknown(other),
        }
    }

    /// Encode back to the raw value.
    #[must_use]
    pub const fn raw(self) -> u32
    {
        match self {
            SegmentKind::Code => Self::RAW_CODE,
            SegmentKind::Heap => Self::RAW_HEAP,
            SegmentKind::Stack => Self::RAW_STACK,
            SegmentKind::Data => Self::RAW_DATA,
            SegmentKind::Unknown(other) => other,
        }
    }
}

impl fmt::Display for SegmentKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            SegmentKind::Code => write!(f, "code"),
            SegmentKind::Heap => write!(f, "heap"),
            SegmentKind::Stack => write!(f, "stack"),
            SegmentKind::Data => write!(f, "data"),
            SegmentKind::Unknown(raw) => write!(f, "kind(0x{raw:x})"),
        }
    }
}

/// Contiguous byte range `[base, base + size)` in the captured image
///
/// Segments come from the runtime's own segment bookkeeping (or from a
/// thread's recorded stack) and are surfaced exactly as recorded: zero-length
/// and overlapping segments are representable, and the caller decides whether
/// they mean anything.
///
/// ## Example
///
/// ```rust
/// use coroner_core::types::{Address, MemorySegment, SegmentKind};
///
/// let heap = MemorySegment::new(Address::from(0x1000), 0x100, SegmentKind::Heap);
/// assert!(heap.contains(Address::from(0x1050)));
/// assert!(!heap.contains(Address::from(0x1100))); // End (exclusive)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySegment
{
    /// Address of the runtime record that described this segment, if any.
    pub descriptor: Option<Address>,
    /// First byte of the segment.
    pub base: Address,
    /// Length in bytes.
    pub size: u64,
    /// Allocation high-water mark (equal to `base` when unknown).
    pub alloc: Address,
    /// What the segment holds.
    pub kind: SegmentKind,
    /// Module record that owns this segment, if recorded.
    pub module: Option<Address>,
}

impl MemorySegment
{
    /// Create a segment with no descriptor, allocation mark, or owner.
    #[must_use]
    pub fn new(base: Address, size: u64, kind: SegmentKind) -> Self
    {
        Self {
            descriptor: None,
            base,
            size,
            alloc: base,
            kind,
            module: None,
        }
    }

    /// One past the last byte, saturating at the top of the address space.
    #[must_use]
    pub fn end(&self) -> Address
    {
        self.base.saturating_add(self.size)
    }

    /// `true` for zero-length segments.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.size == 0
    }

    /// Check if an address lies within this segment.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.base && address < self.end()
    }

    /// Bytes between `base` and the allocation mark (0 if the mark is below base).
    #[must_use]
    pub fn in_use(&self) -> u64
    {
        self.alloc.offset_from(self.base).unwrap_or(0)
    }

    /// Whether two segments share at least one byte.
    #[must_use]
    pub fn overlaps(&self, other: &MemorySegment) -> bool
    {
        !self.is_empty() && !other.is_empty() && self.base < other.end() && other.base < self.end()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_zero_length_segment_contains_nothing()
    {
        let segment = MemorySegment::new(Address::from(0x2000), 0, SegmentKind::Data);
        assert!(segment.is_empty());
        assert!(!segment.contains(Address::from(0x2000)));
    }

    #[test]
    fn test_end_saturates()
    {
        let segment = MemorySegment::new(Address::new(u64::MAX - 1), 0x10, SegmentKind::Heap);
        assert_eq!(segment.end(), Address::new(u64::MAX));
    }

    #[test]
    fn test_overlap()
    {
        let a = MemorySegment::new(Address::from(0x1000), 0x100, SegmentKind::Heap);
        let b = MemorySegment::new(Address::from(0x10ff), 0x10, SegmentKind::Heap);
        let c = MemorySegment::new(Address::from(0x1100), 0x10, SegmentKind::Heap);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_kind_round_trip_for_unknown()
    {
        assert_eq!(SegmentKind::from_raw(0x77), SegmentKind::Unknown(0x77));
        assert_eq!(SegmentKind::Unknown(0x77).raw(), 0x77);
    }
}
