//! Loaded modules and address-to-symbol lookup.

use std::collections::HashSet;

use object::{Object, ObjectSegment, ObjectSymbol, SymbolKind};
use tracing::{debug, trace};

use crate::image::view::MAX_STRING_LEN;
use crate::image::ImageView;
use crate::outcome::{CorruptKind, Entry};
use crate::types::{Address, SymbolName};

/// A module loaded in the captured process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library
{
    /// Address of the module record in the image.
    pub record: Address,
    /// Name as recorded (usually the path on the crashed machine).
    pub name: String,
    /// Load address.
    pub base: Address,
    /// Mapped size in bytes.
    pub size: u64,
}

impl Library
{
    /// One past the last mapped byte.
    pub fn end(&self) -> Address
    {
        self.base.saturating_add(self.size)
    }

    /// Check if an address lies within the module's mapping.
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.base && address < self.end()
    }
}

/// Result of mapping an address to a symbol
///
/// Lookup never fails: anything that stops it (no owning module, artifact
/// not found, unparseable artifact, no covering symbol) becomes `Unknown`
/// with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLookup
{
    /// Nearest covering symbol in the owning module.
    Known
    {
        /// Owning module.
        library: Library,
        /// Symbol covering the address.
        symbol: SymbolName,
        /// Distance from the symbol start.
        offset: u64,
    },
    /// No symbol context for this address.
    Unknown
    {
        /// Why lookup stopped.
        reason: String,
    },
}

impl SymbolLookup
{
    pub(crate) fn unknown(reason: impl Into<String>) -> Self
    {
        SymbolLookup::Unknown { reason: reason.into() }
    }

    /// `true` if a symbol was found.
    pub fn is_known(&self) -> bool
    {
        matches!(self, SymbolLookup::Known { .. })
    }
}

/// Decode the module record at `record`.
pub(crate) fn read_library(view: &ImageView, record: Address) -> Entry<(Library, Address)>
{
    const WHAT: &str = "module record";
    let layout = &view.layouts().module;

    let next = view.pointer_field(record, layout.next, WHAT)?;
    let name_ptr = view.pointer_field(record, layout.name, WHAT)?;
    if name_ptr.is_null() {
        return Err(view.corrupt(record, WHAT, CorruptKind::BadString));
    }
    let name = view.read_c_string(name_ptr, MAX_STRING_LEN, "module name")?;
    let base = view.pointer_field(record, layout.base, WHAT)?;
    let size = view.uptr_field(record, layout.length, WHAT)?;

    Ok((Library { record, name, base, size }, next))
}

/// Walk the module list rooted at `root`; the first bad record ends it.
pub(crate) fn walk_module_list(view: &ImageView, root: Address, limit: usize) -> Vec<Entry<Library>>
{
    let mut libraries = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = root;

    while !cursor.is_null() {
        if libraries.len() >= limit {
            libraries.push(Err(view.corrupt(cursor, "module record", CorruptKind::Truncated { limit })));
            break;
        }
        if !seen.insert(cursor) {
            libraries.push(Err(view.corrupt(cursor, "module record", CorruptKind::Cycle)));
            break;
        }
        match read_library(view, cursor) {
            Ok((library, next)) => {
                trace!("Module {} at {}", library.name, library.base.format(view.width()));
                libraries.push(Ok(library));
                cursor = next;
            }
            Err(corrupt) => {
                debug!("Module list {} ends at corrupt record: {corrupt}", root.format(view.width()));
                libraries.push(Err(corrupt));
                break;
            }
        }
    }

    libraries
}

/// Find the text symbol covering `offset` bytes past the module's load base
///
/// `offset` is relative to the lowest loadable address of the artifact, so
/// it works for both position-independent libraries (linked at 0) and
/// executables linked at a fixed address. Sized symbols must contain the
/// address; a zero-sized symbol covers everything up to the next symbol
/// start, sized or not.
///
/// ## Errors
///
/// A human-readable reason if the artifact cannot be parsed or no symbol
/// covers the address.
pub(crate) fn find_symbol(bytes: &[u8], offset: u64) -> std::result::Result<(SymbolName, u64), String>
{
    let file = object::File::parse(bytes).map_err(|err| format!("unparseable artifact: {err}"))?;
    let link_base = file.segments().map(|segment| segment.address()).min().unwrap_or(0);
    let target = link_base
        .checked_add(offset)
        .ok_or_else(|| "address beyond artifact range".to_string())?;

    let mut best: Option<(u64, u64, &str)> = None;
    // Greatest start at or below the target, whether or not it covers it
    let mut nearest_start: Option<u64> = None;
    for symbol in file.symbols().chain(file.dynamic_symbols()) {
        if symbol.kind() != SymbolKind::Text || !symbol.is_definition() {
            continue;
        }
        let (start, size) = (symbol.address(), symbol.size());
        if start > target {
            continue;
        }
        let Ok(name) = symbol.name() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        nearest_start = nearest_start.max(Some(start));
        if size != 0 && target - start >= size {
            continue;
        }
        // Prefer the closest start; on ties prefer the sized symbol
        let better = match best {
            None => true,
            Some((best_start, best_size, _)) => start > best_start || (start == best_start && best_size == 0 && size != 0),
        };
        if better {
            best = Some((start, size, name));
        }
    }

    let uncovered = || format!("no symbol covers offset 0x{offset:x}");
    let (start, size, name) = best.ok_or_else(uncovered)?;
    if size == 0 && nearest_start.is_some_and(|nearest| nearest > start) {
        return Err(uncovered());
    }
    Ok((SymbolName::from_linkage_name(name), target - start))
}
