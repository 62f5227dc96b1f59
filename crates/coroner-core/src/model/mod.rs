//! # Address-Space Model
//!
//! Typed, lazily built view of one captured image.
//!
//! [`AddressSpace`] is the root of the object graph. It owns the image view
//! and every collection decoded from it:
//!
//! - threads, walked from the configured thread-list roots
//! - the segment catalogue, built from the configured segment lists
//! - loaded libraries, walked from the configured module-list roots
//! - per-address segment-list dumps
//!
//! Each collection is built the first time it is asked for. Concurrent first
//! callers block on the same construction instead of starting their own.
//! Entities hand back [`Outcome`](crate::outcome::Outcome)s, so one corrupt
//! record never stops the rest of the graph from being inspected.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use coroner_core::image::SparseImage;
//! use coroner_core::model::AddressSpace;
//! use coroner_core::types::{Address, ByteOrder, PointerWidth};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let image = SparseImage::builder(PointerWidth::Bits64, ByteOrder::Little).build();
//!     let space = AddressSpace::builder(Arc::new(image)).build()?;
//!
//!     // Nothing configured: every collection is empty, nothing is an error
//!     assert!(space.threads().is_empty());
//!     assert!(space.containing_segment(Address::new(0x1000)).is_none());
//!     Ok(())
//! }
//! ```

mod library;
mod single_flight;
mod thread;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

pub use library::{Library, SymbolLookup};
pub use single_flight::SingleFlight;
pub use thread::{Capabilities, CorruptThread, DecodedThread, Thread};

use crate::error::{CoronerError, Result};
use crate::image::{ImageMemory, ImageView, Layouts};
use crate::outcome::{partition_entries, CorruptData, Entry, Outcome};
use crate::resolver::LibraryResolver;
use crate::segments::{self, SegmentIndex, SegmentListDump, DEFAULT_SEGMENT_LIMIT};
use crate::types::{Address, DumpKind, MemorySegment, PointerWidth, SpaceId};

/// Bounds on every walk over untrusted links
///
/// A damaged image can contain arbitrarily long or looping chains. Walks
/// that reach a limit stop with a `Truncated` corruption marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits
{
    /// Threads per thread list.
    pub threads: usize,
    /// Frames per stack.
    pub frames: usize,
    /// Local slots per frame record.
    pub frame_slots: u32,
    /// Registers per thread.
    pub registers: u32,
    /// Segments per segment list.
    pub segments: usize,
    /// Modules per module list.
    pub libraries: usize,
}

impl Default for WalkLimits
{
    fn default() -> Self
    {
        Self {
            threads: 65_536,
            frames: 4_096,
            frame_slots: 256,
            registers: 512,
            segments: DEFAULT_SEGMENT_LIMIT,
            libraries: 65_536,
        }
    }
}

/// Builder for [`AddressSpace`].
pub struct AddressSpaceBuilder
{
    memory: Arc<dyn ImageMemory>,
    layouts: Option<Layouts>,
    dump_kind: DumpKind,
    limits: WalkLimits,
    thread_lists: Vec<Address>,
    segment_lists: Vec<Address>,
    module_lists: Vec<Address>,
}

impl AddressSpaceBuilder
{
    /// Use custom record layouts instead of the defaults for the image's
    /// pointer width.
    #[must_use]
    pub fn layouts(mut self, layouts: Layouts) -> Self
    {
        self.layouts = Some(layouts);
        self
    }

    /// Set how much the capture recorded.
    #[must_use]
    pub fn dump_kind(mut self, dump_kind: DumpKind) -> Self
    {
        self.dump_kind = dump_kind;
        self
    }

    /// Override walk limits.
    #[must_use]
    pub fn limits(mut self, limits: WalkLimits) -> Self
    {
        self.limits = limits;
        self
    }

    /// Add a thread list: the address of its first thread descriptor.
    #[must_use]
    pub fn thread_list(mut self, root: Address) -> Self
    {
        self.thread_lists.push(root);
        self
    }

    /// Add a segment list to the segment catalogue.
    #[must_use]
    pub fn segment_list(mut self, list: Address) -> Self
    {
        self.segment_lists.push(list);
        self
    }

    /// Add a module list: the address of its first module record.
    #[must_use]
    pub fn module_list(mut self, root: Address) -> Self
    {
        self.module_lists.push(root);
        self
    }

    /// Finish building
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if custom layouts were given for a different
    /// pointer width than the image has.
    pub fn build(self) -> Result<AddressSpace>
    {
        let width = self.memory.pointer_width();
        let layouts = self.layouts.unwrap_or_else(|| Layouts::for_width(width));
        if layouts.width != width {
            return Err(CoronerError::InvalidArgument(format!(
                "layouts are for {} but the image is {width}",
                layouts.width
            )));
        }

        let id = SpaceId::next();
        debug!(
            "Created {id} ({width}, {:?}): {} thread lists, {} segment lists, {} module lists",
            self.dump_kind,
            self.thread_lists.len(),
            self.segment_lists.len(),
            self.module_lists.len()
        );

        Ok(AddressSpace {
            view: ImageView::new(id, self.memory, Arc::new(layouts)),
            dump_kind: self.dump_kind,
            limits: self.limits,
            thread_lists: self.thread_lists,
            segment_lists: self.segment_lists,
            module_lists: self.module_lists,
            threads: OnceCell::new(),
            catalogue: OnceCell::new(),
            libraries: OnceCell::new(),
            dumps: SingleFlight::new(),
        })
    }
}

/// Segments from every configured segment list, plus any corruption met
/// while walking them.
#[derive(Debug)]
struct Catalogue
{
    index: SegmentIndex,
    corruption: Vec<CorruptData>,
}

/// Root of the object graph for one captured image
///
/// `Send + Sync`: share it behind an `Arc` and inspect from any number of
/// threads. Everything it hands out is decoded at most once.
pub struct AddressSpace
{
    view: ImageView,
    dump_kind: DumpKind,
    limits: WalkLimits,
    thread_lists: Vec<Address>,
    segment_lists: Vec<Address>,
    module_lists: Vec<Address>,
    threads: OnceCell<Vec<Thread>>,
    catalogue: OnceCell<Catalogue>,
    libraries: OnceCell<Vec<Entry<Library>>>,
    dumps: SingleFlight<Address, Arc<SegmentListDump>>,
}

impl std::fmt::Debug for AddressSpace
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("AddressSpace")
            .field("id", &self.id())
            .field("width", &self.pointer_width())
            .field("dump_kind", &self.dump_kind)
            .finish_non_exhaustive()
    }
}

impl AddressSpace
{
    /// Start building a model over `memory`.
    pub fn builder(memory: Arc<dyn ImageMemory>) -> AddressSpaceBuilder
    {
        AddressSpaceBuilder {
            memory,
            layouts: None,
            dump_kind: DumpKind::default(),
            limits: WalkLimits::default(),
            thread_lists: Vec::new(),
            segment_lists: Vec::new(),
            module_lists: Vec::new(),
        }
    }

    /// Identity carried by every entity and corruption marker from this space.
    pub fn id(&self) -> SpaceId
    {
        self.view.space()
    }

    /// Pointer width of the image.
    pub fn pointer_width(&self) -> PointerWidth
    {
        self.view.width()
    }

    /// How much the capture recorded.
    pub fn dump_kind(&self) -> DumpKind
    {
        self.dump_kind
    }

    /// Walk limits in force.
    pub fn limits(&self) -> WalkLimits
    {
        self.limits
    }

    /// Typed reader over the image.
    pub fn view(&self) -> &ImageView
    {
        &self.view
    }

    /// Address ranges the image actually captured, as `(base, len)`.
    pub fn captured_ranges(&self) -> Vec<(Address, u64)>
    {
        self.view.memory().mapped_ranges()
    }

    /// Every thread from every thread list, in list order.
    pub fn threads(&self) -> &[Thread]
    {
        self.threads.get_or_init(|| {
            let threads: Vec<Thread> = self
                .thread_lists
                .iter()
                .flat_map(|&root| thread::walk_thread_list(&self.view, root, self.dump_kind, self.limits))
                .collect();
            debug!("{} has {} threads", self.id(), threads.len());
            threads
        })
    }

    fn catalogue(&self) -> &Catalogue
    {
        self.catalogue.get_or_init(|| {
            let mut segments = Vec::new();
            let mut corruption = Vec::new();
            for &list in &self.segment_lists {
                let (valid, corrupt) = partition_entries(&self.dump_segment_list(list).entries);
                segments.extend(valid);
                corruption.extend(corrupt);
            }
            let index = SegmentIndex::new(segments);
            if !index.is_sorted_disjoint() {
                debug!("{} segment catalogue has overlapping segments", self.id());
            }
            Catalogue { index, corruption }
        })
    }

    /// Index over every segment of the configured segment lists.
    pub fn segment_index(&self) -> &SegmentIndex
    {
        &self.catalogue().index
    }

    /// Corruption met while building the segment catalogue.
    pub fn segment_corruption(&self) -> &[CorruptData]
    {
        &self.catalogue().corruption
    }

    /// The catalogued segment containing `address`, if any.
    pub fn containing_segment(&self, address: Address) -> Option<&MemorySegment>
    {
        self.segment_index().containing_segment(address)
    }

    /// Walk the segment list at `list`
    ///
    /// Each list is walked once; later and concurrent callers share the
    /// result.
    pub fn dump_segment_list(&self, list: Address) -> Arc<SegmentListDump>
    {
        self.dumps.get_or_init(list, || {
            Arc::new(segments::dump_segment_list(&self.view, list, self.limits.segments))
        })
    }

    /// Every loaded module from every module list; corrupt records are
    /// `Err` entries.
    pub fn libraries(&self) -> &[Entry<Library>]
    {
        self.libraries.get_or_init(|| {
            self.module_lists
                .iter()
                .flat_map(|&root| library::walk_module_list(&self.view, root, self.limits.libraries))
                .collect()
        })
    }

    /// Decode the module record at `record`.
    pub fn library_at(&self, record: Address) -> Outcome<Library>
    {
        if record.is_null() {
            return Outcome::Unavailable;
        }
        library::read_library(&self.view, record)
            .map(|(library, _)| library)
            .into()
    }

    /// The module whose mapping contains `address`
    ///
    /// Checks the module lists first, then the owner recorded on the
    /// containing segment. Unavailable if neither knows.
    pub fn library_for_address(&self, address: Address) -> Outcome<Library>
    {
        let listed = self
            .libraries()
            .iter()
            .filter_map(|entry| entry.as_ref().ok())
            .find(|library| library.contains(address));
        if let Some(library) = listed {
            return Outcome::Present(library.clone());
        }

        match self.containing_segment(address).and_then(|segment| segment.module) {
            Some(record) => self.library_at(record),
            None => Outcome::Unavailable,
        }
    }

    /// Map `address` to the nearest covering symbol of its module
    ///
    /// The module's artifact is resolved silently through `resolver`. Any
    /// failure along the way is reported as [`SymbolLookup::Unknown`].
    pub fn symbolicate(&self, address: Address, resolver: &dyn LibraryResolver) -> SymbolLookup
    {
        let width = self.pointer_width();
        let library = match self.library_for_address(address) {
            Outcome::Present(library) => library,
            Outcome::Unavailable => {
                return SymbolLookup::unknown(format!("no module contains {}", address.format(width)));
            }
            Outcome::Corrupt(corrupt) => return SymbolLookup::unknown(corrupt.to_string()),
        };

        let artifact = match resolver.resolve_with(&library.name, true) {
            Ok(artifact) => artifact,
            Err(err) => return SymbolLookup::unknown(err.to_string()),
        };

        let offset = address.offset_from(library.base).unwrap_or(0);
        match artifact.with_bytes(|bytes| library::find_symbol(bytes, offset)) {
            Ok(Ok((symbol, offset))) => SymbolLookup::Known { library, symbol, offset },
            Ok(Err(reason)) => SymbolLookup::unknown(format!("{}: {reason}", library.name)),
            Err(err) => SymbolLookup::unknown(err.to_string()),
        }
    }
}
