//! Address space identity and image properties.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_SPACE_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque identifier of an address space
///
/// Every entity and every corruption marker carries the id of the address
/// space it was decoded from. That back-reference is how a caller ties a
/// `CorruptData` to the image it came from without the entity owning the
/// space.
///
/// ## Example
///
/// ```rust
/// use coroner_core::types::SpaceId;
///
/// let id = SpaceId::from_raw(3);
/// assert_eq!(id.raw(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(u32);

impl SpaceId
{
    /// Allocate a fresh id, unique within this process.
    pub(crate) fn next() -> Self
    {
        SpaceId(NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an id from a raw value (for tests and deserialised reports).
    #[must_use]
    pub const fn from_raw(value: u32) -> Self
    {
        SpaceId(value)
    }

    /// Get the raw `u32` value of this identifier
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for SpaceId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "space#{}", self.0)
    }
}

/// Byte order of multi-byte fields in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder
{
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// How much the capture recorded
///
/// This is a structural property of the image. It is known without reading
/// any untrusted bytes, which is what makes an attribute *unavailable*
/// instead of *corrupt*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DumpKind
{
    /// Full capture: registers and stack sections are recorded.
    #[default]
    Full,
    /// Minimal capture: no registers and no stack sections for any thread.
    Minimal,
}

impl DumpKind
{
    /// Whether thread registers are recorded in this kind of dump.
    #[must_use]
    pub const fn records_registers(self) -> bool
    {
        matches!(self, DumpKind::Full)
    }

    /// Whether raw stack sections are recorded in this kind of dump.
    #[must_use]
    pub const fn records_stack_sections(self) -> bool
    {
        matches!(self, DumpKind::Full)
    }
}
