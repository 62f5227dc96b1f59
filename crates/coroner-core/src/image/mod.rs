//! # Image Access
//!
//! Random-access, address-indexed reads over a captured image.
//!
//! The model never touches raw bytes directly. It goes through:
//!
//! - [`ImageMemory`]: the container-agnostic byte source (sparse in-memory
//!   regions, an ELF core file, or anything a caller implements)
//! - [`Layouts`]: field offsets of the runtime records, supplied per pointer
//!   width
//! - [`ImageView`]: typed field reads that turn a missing byte into a
//!   [`CorruptData`](crate::outcome::CorruptData) naming what was being read

pub mod layout;
pub mod sparse;
pub mod view;

pub use layout::{FrameLayout, Layouts, ModuleLayout, RegisterLayout, SegmentLayout, SegmentListLayout, ThreadLayout};
pub use sparse::{SparseImage, SparseImageBuilder};
pub use view::ImageView;

use crate::types::{Address, ByteOrder, PointerWidth};

/// A read that touched bytes the image does not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFault
{
    /// First address that could not be read.
    pub address: Address,
    /// Number of bytes requested in total.
    pub len: usize,
}

/// Byte source for a captured image
///
/// Implementations must be immutable after construction: the model caches
/// everything it decodes, and concurrent readers share one image without
/// locking.
pub trait ImageMemory: Send + Sync
{
    /// Fill `buf` with the bytes starting at `address`.
    ///
    /// ## Errors
    ///
    /// Returns a [`ReadFault`] if any byte of the range is not present.
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), ReadFault>;

    /// Pointer width of the captured process.
    fn pointer_width(&self) -> PointerWidth;

    /// Byte order of the captured process.
    fn byte_order(&self) -> ByteOrder;

    /// Address ranges with captured bytes, in ascending order of base.
    fn mapped_ranges(&self) -> Vec<(Address, u64)>;
}
