//! Threads and their stacks.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::OnceCell;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::WalkLimits;
use crate::image::view::MAX_STRING_LEN;
use crate::image::ImageView;
use crate::outcome::{CorruptData, CorruptKind, Entry, Outcome};
use crate::types::{Address, DumpKind, LocalSlot, MemorySegment, Register, SegmentKind, SpaceId, StackFrame};

/// Longest register name accepted.
const MAX_REGISTER_NAME: usize = 64;

/// What a thread can be asked for without every attribute coming back
/// unavailable
///
/// Computed from the descriptor header alone, so it never reads stack or
/// register memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities
{
    /// Registers were recorded for this thread.
    pub registers: bool,
    /// A frame chain is present to walk.
    pub stack_frames: bool,
    /// The thread's stack memory was recorded.
    pub stack_sections: bool,
    /// Descriptor header decoded, so properties are available.
    pub properties: bool,
}

/// A thread from the image
///
/// Both variants answer every accessor. A thread whose descriptor could not
/// be decoded is still a thread in the list, so the caller can report it and
/// move on to its siblings.
#[derive(Debug)]
pub enum Thread
{
    /// Descriptor header decoded; attributes are decoded on demand.
    Decoded(DecodedThread),
    /// Descriptor header unreadable.
    Corrupt(CorruptThread),
}

impl Thread
{
    /// Address of the thread descriptor.
    pub fn descriptor(&self) -> Address
    {
        match self {
            Thread::Decoded(thread) => thread.descriptor,
            Thread::Corrupt(thread) => thread.descriptor(),
        }
    }

    /// Owning address space.
    pub fn space(&self) -> SpaceId
    {
        match self {
            Thread::Decoded(thread) => thread.view.space(),
            Thread::Corrupt(thread) => thread.error.space,
        }
    }

    /// `true` for a thread whose descriptor could not be decoded.
    pub fn is_corrupt(&self) -> bool
    {
        matches!(self, Thread::Corrupt(_))
    }

    /// Operating-system thread id, formatted at pointer width.
    pub fn id(&self) -> Outcome<String>
    {
        match self {
            Thread::Decoded(thread) => thread.id(),
            Thread::Corrupt(thread) => Outcome::Corrupt(thread.error.clone()),
        }
    }

    /// Recorded registers.
    pub fn registers(&self) -> Outcome<Vec<Register>>
    {
        match self {
            Thread::Decoded(thread) => thread.registers().clone(),
            Thread::Corrupt(_) => Outcome::Unavailable,
        }
    }

    /// Stack frames, innermost first
    ///
    /// A walk that ran into corruption ends with one `Err` after the frames
    /// that did decode.
    pub fn stack_frames(&self) -> Outcome<Vec<Entry<StackFrame>>>
    {
        match self {
            Thread::Decoded(thread) => thread.stack_frames().clone(),
            Thread::Corrupt(_) => Outcome::Unavailable,
        }
    }

    /// Recorded stack memory.
    pub fn stack_sections(&self) -> Outcome<Vec<MemorySegment>>
    {
        match self {
            Thread::Decoded(thread) => thread.stack_sections(),
            Thread::Corrupt(_) => Outcome::Unavailable,
        }
    }

    /// Named descriptor properties (`name`, `flags`, `pc`).
    pub fn properties(&self) -> BTreeMap<String, Outcome<String>>
    {
        match self {
            Thread::Decoded(thread) => thread.properties(),
            Thread::Corrupt(_) => BTreeMap::new(),
        }
    }

    /// What this thread can provide.
    pub fn capabilities(&self) -> Capabilities
    {
        match self {
            Thread::Decoded(thread) => thread.capabilities(),
            Thread::Corrupt(_) => Capabilities::default(),
        }
    }
}

/// Decoded thread descriptor header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header
{
    flags: u32,
    next: Address,
    os_tid: u64,
    name: Address,
    pc: Address,
    frame_pointer: Address,
    registers: Address,
    register_count: u32,
    stack_base: Address,
    stack_size: u64,
}

/// Thread whose descriptor header decoded
///
/// Registers and frames are decoded the first time they are asked for and
/// cached; concurrent first callers share one decode.
#[derive(Debug)]
pub struct DecodedThread
{
    view: ImageView,
    dump_kind: DumpKind,
    limits: WalkLimits,
    descriptor: Address,
    header: Header,
    registers: OnceCell<Outcome<Vec<Register>>>,
    frames: OnceCell<Outcome<Vec<Entry<StackFrame>>>>,
}

impl DecodedThread
{
    /// Address of the thread descriptor.
    pub fn descriptor(&self) -> Address
    {
        self.descriptor
    }

    /// Operating-system thread id; unavailable when recorded as zero.
    pub fn id(&self) -> Outcome<String>
    {
        if self.header.os_tid == 0 {
            return Outcome::Unavailable;
        }
        Outcome::Present(Address::new(self.header.os_tid).format(self.view.width()))
    }

    /// Program counter recorded in the descriptor.
    pub fn pc(&self) -> Address
    {
        self.header.pc
    }

    /// Recorded registers, decoded on first use.
    pub fn registers(&self) -> &Outcome<Vec<Register>>
    {
        self.registers.get_or_init(|| self.decode_registers())
    }

    /// Stack frames, walked on first use.
    pub fn stack_frames(&self) -> &Outcome<Vec<Entry<StackFrame>>>
    {
        self.frames.get_or_init(|| self.walk_frames())
    }

    /// Recorded stack memory as a single `Stack` segment.
    pub fn stack_sections(&self) -> Outcome<Vec<MemorySegment>>
    {
        if !self.dump_kind.records_stack_sections() || self.header.stack_base.is_null() {
            return Outcome::Unavailable;
        }
        let mut section = MemorySegment::new(self.header.stack_base, self.header.stack_size, SegmentKind::Stack);
        section.descriptor = Some(self.descriptor);
        Outcome::Present(vec![section])
    }

    /// Named descriptor properties.
    pub fn properties(&self) -> BTreeMap<String, Outcome<String>>
    {
        let name = if self.header.name.is_null() {
            Outcome::Unavailable
        } else {
            self.view.read_c_string(self.header.name, MAX_STRING_LEN, "thread name").into()
        };

        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), name);
        properties.insert("flags".to_string(), Outcome::Present(format!("0x{:08x}", self.header.flags)));
        properties.insert("pc".to_string(), Outcome::Present(self.header.pc.format(self.view.width())));
        properties
    }

    /// What this thread can provide.
    pub fn capabilities(&self) -> Capabilities
    {
        Capabilities {
            registers: self.dump_kind.records_registers()
                && !self.header.registers.is_null()
                && self.header.register_count > 0,
            stack_frames: !self.header.frame_pointer.is_null(),
            stack_sections: self.dump_kind.records_stack_sections() && !self.header.stack_base.is_null(),
            properties: true,
        }
    }

    fn decode_registers(&self) -> Outcome<Vec<Register>>
    {
        let header = &self.header;
        if !self.dump_kind.records_registers() || header.registers.is_null() || header.register_count == 0 {
            return Outcome::Unavailable;
        }
        match self.read_register_block() {
            Ok(registers) => Outcome::Present(registers),
            Err(corrupt) => {
                debug!("Registers of thread {} unreadable: {corrupt}", self.descriptor.format(self.view.width()));
                Outcome::Corrupt(corrupt)
            }
        }
    }

    fn read_register_block(&self) -> Entry<Vec<Register>>
    {
        const WHAT: &str = "register entry";
        let layout = &self.view.layouts().register;
        let count = self.header.register_count;
        if count > self.limits.registers {
            let at = self
                .view
                .field(self.descriptor, self.view.layouts().thread.register_count, "thread descriptor")?;
            return Err(self.view.corrupt(
                at,
                "thread descriptor",
                CorruptKind::ExcessiveCount {
                    count: u64::from(count),
                    limit: u64::from(self.limits.registers),
                },
            ));
        }

        let mut registers = Vec::with_capacity(count as usize);
        let mut entry = self.header.registers;
        for _ in 0..count {
            let name_ptr = self.view.pointer_field(entry, layout.name, WHAT)?;
            if name_ptr.is_null() {
                return Err(self.view.corrupt(entry, WHAT, CorruptKind::BadString));
            }
            let name = self.view.read_c_string(name_ptr, MAX_REGISTER_NAME, "register name")?;
            let value = self.view.uptr_field(entry, layout.value, WHAT)?;
            registers.push(Register::new(name, value));
            entry = self.view.field(entry, layout.record_size, WHAT)?;
        }
        Ok(registers)
    }

    fn walk_frames(&self) -> Outcome<Vec<Entry<StackFrame>>>
    {
        if self.header.frame_pointer.is_null() {
            return Outcome::Unavailable;
        }

        let mut frames = Vec::new();
        let mut frame_pointer = self.header.frame_pointer;
        let mut pc = self.header.pc;

        loop {
            if frames.len() >= self.limits.frames {
                frames.push(Err(self.view.corrupt(
                    frame_pointer,
                    "frame record",
                    CorruptKind::Truncated {
                        limit: self.limits.frames,
                    },
                )));
                break;
            }

            let (frame, caller, return_pc) = match self.read_frame(frames.len(), frame_pointer, pc) {
                Ok(decoded) => decoded,
                Err(corrupt) => {
                    debug!("Stack of thread {} truncated: {corrupt}", self.descriptor.format(self.view.width()));
                    frames.push(Err(corrupt));
                    break;
                }
            };
            trace!("Frame #{} pc={} fp={}", frame.index, frame.pc, frame.frame_pointer);
            frames.push(Ok(frame));

            if caller.is_null() {
                break;
            }
            // Frames move towards the stack base; anything else is a loop or garbage
            if caller <= frame_pointer {
                frames.push(Err(self.view.corrupt(
                    frame_pointer,
                    "frame record",
                    CorruptKind::NonAscending { next: caller },
                )));
                break;
            }
            frame_pointer = caller;
            pc = return_pc;
        }

        Outcome::Present(frames)
    }

    /// Decode the frame record at `frame_pointer` into a frame plus its
    /// `(caller_frame, return_pc)` links.
    fn read_frame(&self, index: usize, frame_pointer: Address, pc: Address) -> Entry<(StackFrame, Address, Address)>
    {
        const WHAT: &str = "frame record";
        let layout = &self.view.layouts().frame;

        let caller = self.view.pointer_field(frame_pointer, layout.caller_frame, WHAT)?;
        let return_pc = self.view.pointer_field(frame_pointer, layout.return_pc, WHAT)?;
        let slot_count = self.view.u32_field(frame_pointer, layout.slot_count, WHAT)?;
        if slot_count > self.limits.frame_slots {
            return Err(self.view.corrupt(
                frame_pointer,
                WHAT,
                CorruptKind::ExcessiveCount {
                    count: u64::from(slot_count),
                    limit: u64::from(self.limits.frame_slots),
                },
            ));
        }

        let slot_size = self.view.width().bytes();
        let mut locals = SmallVec::new();
        let mut slot = self.view.field(frame_pointer, layout.slots, WHAT)?;
        for _ in 0..slot_count {
            let value = self.view.read_uptr(slot, "frame slot")?;
            locals.push(LocalSlot { address: slot, value });
            slot = self.view.field(slot, slot_size, "frame slot")?;
        }

        let frame = StackFrame {
            index,
            pc,
            frame_pointer,
            locals,
        };
        Ok((frame, caller, return_pc))
    }
}

/// Thread whose descriptor could not be decoded
///
/// Stands in for the thread so the list stays complete: `id` reports the
/// corruption, registers, frames and stack sections are unavailable, and it
/// has no properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptThread
{
    error: CorruptData,
}

impl CorruptThread
{
    /// Wrap the decode failure of a descriptor.
    #[must_use]
    pub fn new(error: CorruptData) -> Self
    {
        Self { error }
    }

    /// Address the failed descriptor was expected at.
    pub fn descriptor(&self) -> Address
    {
        self.error.address
    }

    /// The decode failure.
    pub fn error(&self) -> &CorruptData
    {
        &self.error
    }
}

/// Walk the thread list rooted at the descriptor `root`
///
/// The first descriptor that fails to decode becomes a [`CorruptThread`] and
/// ends this list. Descriptors visited twice or past the thread limit end it
/// the same way.
pub(crate) fn walk_thread_list(view: &ImageView, root: Address, dump_kind: DumpKind, limits: WalkLimits) -> Vec<Thread>
{
    let mut threads = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = root;

    while !cursor.is_null() {
        if threads.len() >= limits.threads {
            let error = view.corrupt(cursor, "thread descriptor", CorruptKind::Truncated { limit: limits.threads });
            threads.push(Thread::Corrupt(CorruptThread::new(error)));
            break;
        }
        if !seen.insert(cursor) {
            let error = view.corrupt(cursor, "thread descriptor", CorruptKind::Cycle);
            threads.push(Thread::Corrupt(CorruptThread::new(error)));
            break;
        }

        match read_header(view, cursor) {
            Ok(header) => {
                trace!("Thread descriptor {}", cursor.format(view.width()));
                threads.push(Thread::Decoded(DecodedThread {
                    view: view.clone(),
                    dump_kind,
                    limits,
                    descriptor: cursor,
                    header,
                    registers: OnceCell::new(),
                    frames: OnceCell::new(),
                }));
                cursor = header.next;
            }
            Err(error) => {
                debug!("Thread list {} ends at corrupt descriptor: {error}", root.format(view.width()));
                threads.push(Thread::Corrupt(CorruptThread::new(error)));
                break;
            }
        }
    }

    threads
}

fn read_header(view: &ImageView, descriptor: Address) -> Entry<Header>
{
    const WHAT: &str = "thread descriptor";
    let layout = &view.layouts().thread;

    let eyecatcher = view.u32_field(descriptor, layout.eyecatcher, WHAT)?;
    if eyecatcher != layout.expected_eyecatcher {
        return Err(view.corrupt(
            descriptor,
            WHAT,
            CorruptKind::BadEyecatcher {
                expected: layout.expected_eyecatcher,
                found: eyecatcher,
            },
        ));
    }

    Ok(Header {
        flags: view.u32_field(descriptor, layout.flags, WHAT)?,
        next: view.pointer_field(descriptor, layout.next, WHAT)?,
        os_tid: view.uptr_field(descriptor, layout.os_tid, WHAT)?,
        name: view.pointer_field(descriptor, layout.name, WHAT)?,
        pc: view.pointer_field(descriptor, layout.pc, WHAT)?,
        frame_pointer: view.pointer_field(descriptor, layout.frame_pointer, WHAT)?,
        registers: view.pointer_field(descriptor, layout.registers, WHAT)?,
        register_count: view.u32_field(descriptor, layout.register_count, WHAT)?,
        stack_base: view.pointer_field(descriptor, layout.stack_base, WHAT)?,
        stack_size: view.uptr_field(descriptor, layout.stack_size, WHAT)?,
    })
}
