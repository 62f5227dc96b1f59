//! Text rendering of inspection results.
//!
//! Every attribute is printed with its outcome, so a corrupt field shows up
//! as a `corrupt ...` line next to the fields that did decode.

use std::fmt::Write as _;

use coroner_core::model::{Library, SymbolLookup, Thread};
use coroner_core::outcome::{Entry, Outcome};
use coroner_core::resolver::{ArtifactOrigin, LibraryDataSource};
use coroner_core::segments::SegmentListDump;
use coroner_core::types::{Address, MemorySegment, PointerWidth, StackFrame};

/// Render an outcome as a single value
pub fn outcome<T>(outcome: &Outcome<T>, present: impl FnOnce(&T) -> String) -> String
{
    match outcome {
        Outcome::Present(value) => present(value),
        Outcome::Unavailable => "unavailable".to_string(),
        Outcome::Corrupt(corrupt) => corrupt.to_string(),
    }
}

pub fn region(base: Address, len: u64, width: PointerWidth) -> String
{
    format!("{}-{} 0x{len:x} bytes", base.format(width), base.saturating_add(len).format(width))
}

pub fn segment(segment: &MemorySegment, width: PointerWidth) -> String
{
    let mut line = format!(
        "{}-{} {:<7} size=0x{:x} in-use=0x{:x}",
        segment.base.format(width),
        segment.end().format(width),
        segment.kind.to_string(),
        segment.size,
        segment.in_use(),
    );
    if let Some(module) = segment.module {
        let _ = write!(line, " module={}", module.format(width));
    }
    line
}

pub fn segment_list(dump: &SegmentListDump, width: PointerWidth) -> String
{
    let mut out = format!("segment list {} ({} sub-lists)\n", dump.list.format(width), dump.sublists.len());
    for entry in &dump.entries {
        match entry {
            Ok(seg) => {
                let _ = writeln!(out, "  {}", segment(seg, width));
            }
            Err(corrupt) => {
                let _ = writeln!(out, "  ! {corrupt}");
            }
        }
    }
    let _ = write!(
        out,
        "  {} segments, size=0x{:x}, in-use=0x{:x}{}",
        dump.segment_count(),
        dump.total_size(),
        dump.total_in_use(),
        if dump.is_truncated() { " (incomplete)" } else { "" }
    );
    out
}

fn frame(entry: &Entry<StackFrame>, width: PointerWidth) -> String
{
    match entry {
        Ok(frame) => format!(
            "#{:<3} pc={} fp={} locals={}",
            frame.index,
            frame.pc.format(width),
            frame.frame_pointer.format(width),
            frame.local_count()
        ),
        Err(corrupt) => format!("! {corrupt}"),
    }
}

pub fn thread(thread: &Thread, width: PointerWidth, with_frames: bool) -> String
{
    let mut out = format!("thread {} ({})", thread.descriptor().format(width), thread.space());
    if let Thread::Corrupt(corrupt) = thread {
        let _ = write!(out, "\n  ! {}", corrupt.error());
        return out;
    }

    let _ = write!(out, "\n  id: {}", outcome(&thread.id(), Clone::clone));
    for (key, value) in thread.properties() {
        let _ = write!(out, "\n  {key}: {}", outcome(&value, Clone::clone));
    }
    let registers = outcome(&thread.registers(), |registers| {
        registers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    });
    let _ = write!(out, "\n  registers: {registers}");
    let sections = outcome(&thread.stack_sections(), |sections| {
        sections.iter().map(|s| segment(s, width)).collect::<Vec<_>>().join(", ")
    });
    let _ = write!(out, "\n  stack: {sections}");

    if with_frames {
        match thread.stack_frames() {
            Outcome::Present(frames) => {
                for entry in &frames {
                    let _ = write!(out, "\n    {}", frame(entry, width));
                }
            }
            other => {
                let _ = write!(out, "\n  frames: {}", outcome(&other, |_| String::new()));
            }
        }
    }
    out
}

pub fn library(entry: &Entry<Library>, width: PointerWidth) -> String
{
    match entry {
        Ok(lib) => format!("{}-{} {}", lib.base.format(width), lib.end().format(width), lib.name),
        Err(corrupt) => format!("! {corrupt}"),
    }
}

pub fn symbol(address: Address, lookup: &SymbolLookup, width: PointerWidth) -> String
{
    match lookup {
        SymbolLookup::Known { library, symbol, offset } => format!(
            "{} {}+0x{offset:x} in {} [{}]",
            address.format(width),
            symbol.display_name(),
            library.name,
            symbol.language()
        ),
        SymbolLookup::Unknown { reason } => format!("{} ?? ({reason})", address.format(width)),
    }
}

pub fn artifact(source: &LibraryDataSource, size: u64) -> String
{
    let origin = match source.origin() {
        ArtifactOrigin::Filesystem => "filesystem".to_string(),
        ArtifactOrigin::Store { store } => store.clone(),
    };
    let location = source
        .path()
        .map_or_else(|| "(in store)".to_string(), |path| path.display().to_string());
    format!("{} -> {location} [{origin}, {size} bytes]", source.name())
}
