//! Field offsets of the runtime records the model decodes.
//!
//! Layouts are normally produced by a generator from the runtime's own
//! headers. [`Layouts::for_width`] builds the default packing (natural
//! alignment, pointer-sized fields first-come) used by the reference runtime;
//! callers with a different runtime build construct their own `Layouts`.

use crate::types::PointerWidth;

/// Eyecatcher stored in the first word of every thread descriptor ("THRD").
pub const THREAD_EYECATCHER: u32 = 0x5448_5244;

/// Thread descriptor layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLayout
{
    pub eyecatcher: usize,
    pub expected_eyecatcher: u32,
    pub flags: usize,
    pub next: usize,
    pub os_tid: usize,
    pub name: usize,
    pub pc: usize,
    pub frame_pointer: usize,
    pub registers: usize,
    pub register_count: usize,
    pub stack_base: usize,
    pub stack_size: usize,
    pub record_size: usize,
}

/// One entry of a thread's register block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterLayout
{
    pub name: usize,
    pub value: usize,
    pub record_size: usize,
}

/// Frame record found at a frame pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout
{
    pub caller_frame: usize,
    pub return_pc: usize,
    pub slot_count: usize,
    /// Offset of the first local slot; slots are pointer-sized and packed.
    pub slots: usize,
}

/// Header of one sub-list in a segment list chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentListLayout
{
    pub next_list: usize,
    pub first_segment: usize,
    pub total_size: usize,
    pub record_size: usize,
}

/// Memory segment descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout
{
    pub next: usize,
    pub base: usize,
    pub alloc: usize,
    pub length: usize,
    pub kind: usize,
    pub module: usize,
    pub record_size: usize,
}

/// Loaded module record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout
{
    pub next: usize,
    pub name: usize,
    pub base: usize,
    pub length: usize,
    pub record_size: usize,
}

/// Every record layout for one pointer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layouts
{
    pub width: PointerWidth,
    pub thread: ThreadLayout,
    pub register: RegisterLayout,
    pub frame: FrameLayout,
    pub segment_list: SegmentListLayout,
    pub segment: SegmentLayout,
    pub module: ModuleLayout,
}

/// Appends fields with natural alignment and hands back their offsets.
struct FieldCursor
{
    offset: usize,
    pointer: usize,
}

impl FieldCursor
{
    fn new(width: PointerWidth) -> Self
    {
        Self {
            offset: 0,
            pointer: width.bytes(),
        }
    }

    fn place(&mut self, size: usize) -> usize
    {
        self.offset = self.offset.next_multiple_of(size);
        let at = self.offset;
        self.offset += size;
        at
    }

    fn u32(&mut self) -> usize
    {
        self.place(4)
    }

    fn pointer(&mut self) -> usize
    {
        self.place(self.pointer)
    }

    /// Current offset rounded up to pointer alignment.
    fn aligned_end(&self) -> usize
    {
        self.offset.next_multiple_of(self.pointer)
    }
}

impl Layouts
{
    /// Default layouts for the given pointer width
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_core::image::Layouts;
    /// use coroner_core::types::PointerWidth;
    ///
    /// let layouts = Layouts::for_width(PointerWidth::Bits64);
    /// assert_eq!(layouts.thread.next, 8);
    /// assert_eq!(layouts.segment.record_size, 48);
    /// ```
    #[must_use]
    pub fn for_width(width: PointerWidth) -> Self
    {
        let thread = {
            let mut c = FieldCursor::new(width);
            let eyecatcher = c.u32();
            let flags = c.u32();
            let next = c.pointer();
            let os_tid = c.pointer();
            let name = c.pointer();
            let pc = c.pointer();
            let frame_pointer = c.pointer();
            let registers = c.pointer();
            let register_count = c.u32();
            let stack_base = c.pointer();
            let stack_size = c.pointer();
            ThreadLayout {
                eyecatcher,
                expected_eyecatcher: THREAD_EYECATCHER,
                flags,
                next,
                os_tid,
                name,
                pc,
                frame_pointer,
                registers,
                register_count,
                stack_base,
                stack_size,
                record_size: c.aligned_end(),
            }
        };

        let register = {
            let mut c = FieldCursor::new(width);
            let name = c.pointer();
            let value = c.pointer();
            RegisterLayout {
                name,
                value,
                record_size: c.aligned_end(),
            }
        };

        let frame = {
            let mut c = FieldCursor::new(width);
            let caller_frame = c.pointer();
            let return_pc = c.pointer();
            let slot_count = c.u32();
            FrameLayout {
                caller_frame,
                return_pc,
                slot_count,
                slots: c.aligned_end(),
            }
        };

        let segment_list = {
            let mut c = FieldCursor::new(width);
            let next_list = c.pointer();
            let first_segment = c.pointer();
            let total_size = c.pointer();
            SegmentListLayout {
                next_list,
                first_segment,
                total_size,
                record_size: c.aligned_end(),
            }
        };

        let segment = {
            let mut c = FieldCursor::new(width);
            let next = c.pointer();
            let base = c.pointer();
            let alloc = c.pointer();
            let length = c.pointer();
            let kind = c.u32();
            let module = c.pointer();
            SegmentLayout {
                next,
                base,
                alloc,
                length,
                kind,
                module,
                record_size: c.aligned_end(),
            }
        };

        let module = {
            let mut c = FieldCursor::new(width);
            let next = c.pointer();
            let name = c.pointer();
            let base = c.pointer();
            let length = c.pointer();
            ModuleLayout {
                next,
                name,
                base,
                length,
                record_size: c.aligned_end(),
            }
        };

        Self {
            width,
            thread,
            register,
            frame,
            segment_list,
            segment,
            module,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_thread_layout_64()
    {
        let t = Layouts::for_width(PointerWidth::Bits64).thread;
        assert_eq!((t.eyecatcher, t.flags, t.next, t.os_tid), (0, 4, 8, 16));
        assert_eq!((t.register_count, t.stack_base, t.stack_size), (56, 64, 72));
        assert_eq!(t.record_size, 80);
    }

    #[test]
    fn test_thread_layout_32()
    {
        let t = Layouts::for_width(PointerWidth::Bits32).thread;
        assert_eq!((t.next, t.os_tid, t.name, t.pc), (8, 12, 16, 20));
        assert_eq!((t.register_count, t.stack_base, t.stack_size), (32, 36, 40));
        assert_eq!(t.record_size, 44);
    }

    #[test]
    fn test_frame_slots_are_pointer_aligned()
    {
        assert_eq!(Layouts::for_width(PointerWidth::Bits64).frame.slots, 24);
        assert_eq!(Layouts::for_width(PointerWidth::Bits32).frame.slots, 12);
    }

    #[test]
    fn test_segment_layout_32()
    {
        let s = Layouts::for_width(PointerWidth::Bits32).segment;
        assert_eq!((s.next, s.base, s.alloc, s.length, s.kind, s.module), (0, 4, 8, 12, 16, 20));
        assert_eq!(s.record_size, 24);
    }
}
