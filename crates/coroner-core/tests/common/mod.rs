//! Synthetic image builder shared by the integration tests.
//!
//! Records are written at the offsets `Layouts::for_width` reports, so the
//! tests exercise the same layouts the model reads with.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use coroner_core::image::layout::THREAD_EYECATCHER;
use coroner_core::image::{Layouts, SparseImage};
use coroner_core::types::{Address, ByteOrder, PointerWidth};

/// Base of the single captured region every synthetic image has.
pub const REGION_BASE: u64 = 0x10000;
/// Size of that region.
pub const REGION_SIZE: usize = 0x10000;
/// An address guaranteed not to be captured.
pub const UNMAPPED: u64 = 0xdead_0000;

/// Thread descriptor contents.
#[derive(Debug, Clone)]
pub struct ThreadRecord
{
    pub eyecatcher: u32,
    pub flags: u32,
    pub next: u64,
    pub os_tid: u64,
    pub name: u64,
    pub pc: u64,
    pub frame_pointer: u64,
    pub registers: u64,
    pub register_count: u32,
    pub stack_base: u64,
    pub stack_size: u64,
}

impl Default for ThreadRecord
{
    fn default() -> Self
    {
        Self {
            eyecatcher: THREAD_EYECATCHER,
            flags: 0,
            next: 0,
            os_tid: 0,
            name: 0,
            pc: 0,
            frame_pointer: 0,
            registers: 0,
            register_count: 0,
            stack_base: 0,
            stack_size: 0,
        }
    }
}

/// Writes runtime records into a zero-filled region.
pub struct ImageWriter
{
    width: PointerWidth,
    layouts: Layouts,
    bytes: Vec<u8>,
}

impl ImageWriter
{
    pub fn new(width: PointerWidth) -> Self
    {
        Self {
            width,
            layouts: Layouts::for_width(width),
            bytes: vec![0; REGION_SIZE],
        }
    }

    pub fn layouts(&self) -> &Layouts
    {
        &self.layouts
    }

    fn at(&mut self, addr: u64, len: usize) -> &mut [u8]
    {
        let start = (addr - REGION_BASE) as usize;
        &mut self.bytes[start..start + len]
    }

    pub fn put_u32(&mut self, addr: u64, value: u32)
    {
        self.at(addr, 4).copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_uptr(&mut self, addr: u64, value: u64)
    {
        match self.width {
            PointerWidth::Bits32 => {
                let narrow = u32::try_from(value).expect("value fits in 32 bits");
                self.at(addr, 4).copy_from_slice(&narrow.to_le_bytes());
            }
            PointerWidth::Bits64 => self.at(addr, 8).copy_from_slice(&value.to_le_bytes()),
        }
    }

    pub fn put_str(&mut self, addr: u64, text: &str)
    {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.at(addr, bytes.len()).copy_from_slice(&bytes);
    }

    pub fn thread(&mut self, at: u64, record: &ThreadRecord)
    {
        let l = self.layouts.thread.clone();
        let off = |field: usize| at + field as u64;
        self.put_u32(off(l.eyecatcher), record.eyecatcher);
        self.put_u32(off(l.flags), record.flags);
        self.put_uptr(off(l.next), record.next);
        self.put_uptr(off(l.os_tid), record.os_tid);
        self.put_uptr(off(l.name), record.name);
        self.put_uptr(off(l.pc), record.pc);
        self.put_uptr(off(l.frame_pointer), record.frame_pointer);
        self.put_uptr(off(l.registers), record.registers);
        self.put_u32(off(l.register_count), record.register_count);
        self.put_uptr(off(l.stack_base), record.stack_base);
        self.put_uptr(off(l.stack_size), record.stack_size);
    }

    pub fn register(&mut self, at: u64, name: u64, value: u64)
    {
        let l = self.layouts.register.clone();
        self.put_uptr(at + l.name as u64, name);
        self.put_uptr(at + l.value as u64, value);
    }

    pub fn frame(&mut self, at: u64, caller: u64, return_pc: u64, slots: &[u64])
    {
        let l = self.layouts.frame.clone();
        self.put_uptr(at + l.caller_frame as u64, caller);
        self.put_uptr(at + l.return_pc as u64, return_pc);
        self.put_u32(at + l.slot_count as u64, u32::try_from(slots.len()).expect("slot count fits"));
        let slot_size = self.width.bytes() as u64;
        for (i, &value) in slots.iter().enumerate() {
            self.put_uptr(at + l.slots as u64 + i as u64 * slot_size, value);
        }
    }

    pub fn segment_list(&mut self, at: u64, next_list: u64, first_segment: u64, total_size: u64)
    {
        let l = self.layouts.segment_list.clone();
        self.put_uptr(at + l.next_list as u64, next_list);
        self.put_uptr(at + l.first_segment as u64, first_segment);
        self.put_uptr(at + l.total_size as u64, total_size);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn segment(&mut self, at: u64, next: u64, base: u64, alloc: u64, size: u64, kind: u32, module: u64)
    {
        let l = self.layouts.segment.clone();
        self.put_uptr(at + l.next as u64, next);
        self.put_uptr(at + l.base as u64, base);
        self.put_uptr(at + l.alloc as u64, alloc);
        self.put_uptr(at + l.length as u64, size);
        self.put_u32(at + l.kind as u64, kind);
        self.put_uptr(at + l.module as u64, module);
    }

    pub fn module(&mut self, at: u64, next: u64, name: u64, base: u64, size: u64)
    {
        let l = self.layouts.module.clone();
        self.put_uptr(at + l.next as u64, next);
        self.put_uptr(at + l.name as u64, name);
        self.put_uptr(at + l.base as u64, base);
        self.put_uptr(at + l.length as u64, size);
    }

    pub fn build(self) -> Arc<SparseImage>
    {
        Arc::new(
            SparseImage::builder(self.width, ByteOrder::Little)
                .map(Address::new(REGION_BASE), self.bytes)
                .build(),
        )
    }
}

/// Shared buffer that collects formatted log output.
#[derive(Clone, Default)]
pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter
{
    pub fn contents(&self) -> String
    {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CaptureWriter
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>
    {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()>
    {
        Ok(())
    }
}

/// Run `f` with every `tracing` event at `debug` and above captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String)
{
    capture_logs_at(tracing::Level::DEBUG, f)
}

/// Like [`capture_logs`], recording everything up to `level`.
pub fn capture_logs_at<R>(level: tracing::Level, f: impl FnOnce() -> R) -> (R, String)
{
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, writer.contents())
}
