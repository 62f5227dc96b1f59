//! Common module for library exports

pub use crate::error::{CoronerError, ErrorKind, Result};
pub use crate::image::{ImageMemory, Layouts, SparseImage};
pub use crate::model::{AddressSpace, Library, SymbolLookup, Thread};
pub use crate::outcome::{CorruptData, CorruptKind, Entry, Outcome};
pub use crate::resolver::{ChainResolver, LibraryDataSource, LibraryResolver, ResolverSettings};
pub use crate::segments::{SegmentIndex, SegmentListDump};
pub use crate::types::{Address, DumpKind, MemorySegment, PointerWidth, SegmentKind, SpaceId};
