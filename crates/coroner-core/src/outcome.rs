//! # Diagnostic Outcomes
//!
//! The shared vocabulary every accessor in the model uses to report what it
//! found:
//!
//! - [`Outcome::Present`]: the value decoded cleanly
//! - [`Outcome::Unavailable`]: this image legitimately has no such data
//! - [`Outcome::Corrupt`]: bytes that should encode the value did not decode
//!
//! Walked sequences (threads of a list, segments of a chain, frames of a
//! stack) use [`Entry<T>`] for each position so that a corrupt link can sit in
//! the sequence right where the walk stopped.
//!
//! ## Example
//!
//! ```rust
//! use coroner_core::outcome::Outcome;
//!
//! let regs: Outcome<Vec<u64>> = Outcome::Unavailable;
//! // Unavailable and corrupt sequences iterate as empty
//! assert!(regs.as_slice().is_empty());
//! ```

use std::fmt;

use thiserror::Error;

use crate::types::{Address, PointerWidth, SpaceId};

/// One position in a walked sequence: a decoded item or the corruption that
/// ended the walk at that point.
pub type Entry<T> = std::result::Result<T, CorruptData>;

/// What went wrong while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptKind
{
    /// The bytes are not present in the image (unmapped or truncated region).
    Unreadable
    {
        /// Number of bytes that were requested.
        len: usize,
    },
    /// A record's tag did not match the record type the pointer claims.
    BadEyecatcher
    {
        /// Tag the layout expects.
        expected: u32,
        /// Tag found in the image.
        found: u32,
    },
    /// A link points back at a record already visited in this walk.
    Cycle,
    /// A frame chain link does not move towards the stack base.
    NonAscending
    {
        /// The offending caller frame pointer.
        next: Address,
    },
    /// A count field is larger than any sane record holds.
    ExcessiveCount
    {
        /// Value found.
        count: u64,
        /// Largest value accepted.
        limit: u64,
    },
    /// A string field has no terminator within its limit or is not UTF-8.
    BadString,
    /// The walk ran past its length limit without reaching the end.
    Truncated
    {
        /// Number of items visited before giving up.
        limit: usize,
    },
}

impl fmt::Display for CorruptKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            CorruptKind::Unreadable { len } => write!(f, "{len} bytes not present in image"),
            CorruptKind::BadEyecatcher { expected, found } => {
                write!(f, "eyecatcher 0x{found:08x} does not match 0x{expected:08x}")
            }
            CorruptKind::Cycle => write!(f, "link revisits an earlier record"),
            CorruptKind::NonAscending { next } => write!(f, "caller frame {next} does not ascend"),
            CorruptKind::ExcessiveCount { count, limit } => write!(f, "count {count} exceeds limit {limit}"),
            CorruptKind::BadString => write!(f, "unterminated or non UTF-8 string"),
            CorruptKind::Truncated { limit } => write!(f, "walk exceeded {limit} entries"),
        }
    }
}

/// A decode failure at a specific location
///
/// Carries everything a command layer needs to tell the user *what* is
/// corrupt: the owning address space, the address that was being decoded,
/// which structure it was supposed to be, and the pointer width used to
/// format the address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("corrupt {what} at {}: {kind}", address.format(*width))]
pub struct CorruptData
{
    /// Address space the bytes belong to.
    pub space: SpaceId,
    /// Address whose decode failed.
    pub address: Address,
    /// Structure or field being decoded (e.g. `"thread descriptor"`).
    pub what: &'static str,
    /// Failure detail.
    pub kind: CorruptKind,
    /// Pointer width of the image, for formatting `address`.
    pub width: PointerWidth,
}

impl CorruptData
{
    /// Build a corruption marker.
    #[must_use]
    pub fn new(space: SpaceId, width: PointerWidth, address: Address, what: &'static str, kind: CorruptKind) -> Self
    {
        Self {
            space,
            address,
            what,
            kind,
            width,
        }
    }
}

/// Result of reading a single entity attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T>
{
    /// Value fully decoded.
    Present(T),
    /// Structurally absent from this image. Not an error.
    Unavailable,
    /// Decode failure.
    Corrupt(CorruptData),
}

impl<T> Outcome<T>
{
    /// `Some(value)` maps to `Present`, `None` to `Unavailable`.
    pub fn from_option(value: Option<T>) -> Self
    {
        value.map_or(Outcome::Unavailable, Outcome::Present)
    }

    /// `true` if the value decoded.
    pub const fn is_present(&self) -> bool
    {
        matches!(self, Outcome::Present(_))
    }

    /// `true` if the data is structurally absent.
    pub const fn is_unavailable(&self) -> bool
    {
        matches!(self, Outcome::Unavailable)
    }

    /// `true` if decoding failed.
    pub const fn is_corrupt(&self) -> bool
    {
        matches!(self, Outcome::Corrupt(_))
    }

    /// Borrow the decoded value, if any.
    pub fn present(&self) -> Option<&T>
    {
        match self {
            Outcome::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the corruption marker, if any.
    pub fn corrupt(&self) -> Option<&CorruptData>
    {
        match self {
            Outcome::Corrupt(data) => Some(data),
            _ => None,
        }
    }

    /// Convert to an owned option, dropping the distinction between absent
    /// and corrupt.
    pub fn into_present(self) -> Option<T>
    {
        match self {
            Outcome::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Borrowing view of this outcome.
    pub fn as_ref(&self) -> Outcome<&T>
    {
        match self {
            Outcome::Present(value) => Outcome::Present(value),
            Outcome::Unavailable => Outcome::Unavailable,
            Outcome::Corrupt(data) => Outcome::Corrupt(data.clone()),
        }
    }

    /// Transform a present value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U>
    {
        match self {
            Outcome::Present(value) => Outcome::Present(f(value)),
            Outcome::Unavailable => Outcome::Unavailable,
            Outcome::Corrupt(data) => Outcome::Corrupt(data),
        }
    }

    /// Chain a further decode that may itself be absent or corrupt.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U>
    {
        match self {
            Outcome::Present(value) => f(value),
            Outcome::Unavailable => Outcome::Unavailable,
            Outcome::Corrupt(data) => Outcome::Corrupt(data),
        }
    }
}

impl<T> Outcome<Vec<T>>
{
    /// Items of a sequence attribute; empty unless present.
    pub fn as_slice(&self) -> &[T]
    {
        match self {
            Outcome::Present(items) => items,
            _ => &[],
        }
    }
}

impl<T> From<Entry<T>> for Outcome<T>
{
    fn from(entry: Entry<T>) -> Self
    {
        match entry {
            Ok(value) => Outcome::Present(value),
            Err(data) => Outcome::Corrupt(data),
        }
    }
}

/// Split a walked sequence into its decoded items and the corruption markers
/// found along the way.
pub fn partition_entries<T: Clone>(entries: &[Entry<T>]) -> (Vec<T>, Vec<CorruptData>)
{
    let mut items = Vec::new();
    let mut corrupt = Vec::new();
    for entry in entries {
        match entry {
            Ok(item) => items.push(item.clone()),
            Err(data) => corrupt.push(data.clone()),
        }
    }
    (items, corrupt)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn marker() -> CorruptData
    {
        CorruptData::new(
            SpaceId::from_raw(7),
            PointerWidth::Bits32,
            Address::new(0x40),
            "segment",
            CorruptKind::Unreadable { len: 4 },
        )
    }

    #[test]
    fn test_sequence_outcomes_iterate_as_empty()
    {
        let unavailable: Outcome<Vec<u8>> = Outcome::Unavailable;
        let corrupt: Outcome<Vec<u8>> = Outcome::Corrupt(marker());
        assert!(unavailable.as_slice().is_empty());
        assert!(corrupt.as_slice().is_empty());
        assert_eq!(Outcome::Present(vec![1u8, 2]).as_slice(), &[1, 2]);
    }

    #[test]
    fn test_corrupt_data_message_uses_pointer_width()
    {
        let message = marker().to_string();
        assert_eq!(message, "corrupt segment at 0x00000040: 4 bytes not present in image");
    }

    #[test]
    fn test_from_option_and_map()
    {
        assert!(Outcome::<u8>::from_option(None).is_unavailable());
        let doubled = Outcome::from_option(Some(21)).map(|v| v * 2);
        assert_eq!(doubled.present(), Some(&42));
    }

    #[test]
    fn test_partition_entries()
    {
        let entries: Vec<Entry<u8>> = vec![Ok(1), Ok(2), Err(marker())];
        let (items, corrupt) = partition_entries(&entries);
        assert_eq!(items, vec![1, 2]);
        assert_eq!(corrupt.len(), 1);
    }
}
