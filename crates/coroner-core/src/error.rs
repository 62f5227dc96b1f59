//! # Error Types
//!
//! Operation-level error handling for the inspection core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Attribute-level results (present / unavailable / corrupt) are *not* errors
//! and live in [`crate::outcome`]. `CoronerError` is what an operation returns
//! when it cannot produce an outcome at all: an artifact that cannot be found,
//! a handle used after its resolver was disposed, or a host I/O failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::outcome::CorruptData;

/// Main error type for inspection operations
///
/// ## Error Categories
///
/// 1. **Absence**: `NotFound` (artifact not present at any searched location)
/// 2. **Corruption**: `Corrupt` (decode failure at a known address)
/// 3. **Contract violations**: `ResourceMisuse`, `ReadOutOfRange`, `InvalidArgument`
/// 4. **Host failures**: `Io`, `ImageFormat`
///
/// None of these terminate an inspection session. The command layer reports
/// them and carries on with whatever else it was asked to do.
#[derive(Error, Debug)]
pub enum CoronerError
{
    /// No candidate location yielded a readable artifact
    ///
    /// This is recoverable: symbol lookups and module-relative decoding
    /// degrade to "unknown" when they see it.
    #[error("Artifact not found: {name} ({} locations searched)", searched.len())]
    NotFound
    {
        /// Name as recorded in the image
        name: String,
        /// Every location that was tried, in search order
        searched: Vec<PathBuf>,
    },

    /// Bytes that should decode to a valid value did not
    #[error(transparent)]
    Corrupt(#[from] CorruptData),

    /// A `LibraryDataSource` was used after its resolver was disposed
    ///
    /// This is a caller contract violation. It fails the operation that hit
    /// it, never the session.
    #[error("Handle for {name} used after its resolver was disposed")]
    ResourceMisuse
    {
        /// Name the handle was resolved for
        name: String,
    },

    /// A byte-range read extends past the end of an artifact
    #[error("Read of {len} bytes at offset {offset} exceeds {name} ({size} bytes)")]
    ReadOutOfRange
    {
        /// Artifact name
        name: String,
        /// Requested start offset
        offset: u64,
        /// Requested length
        len: usize,
        /// Actual artifact size
        size: u64,
    },

    /// The captured image itself could not be interpreted
    ///
    /// Raised while loading an image container (for example a core file that
    /// is not a valid ELF object), before any entity is modelled.
    #[error("Image format error: {0}")]
    ImageFormat(String),

    /// Invalid argument passed to an inspection function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error reading an artifact or the image on the host
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`CoronerError`]
///
/// The command layer uses this to decide how to render a failure without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind
{
    /// Artifact absent from every searched location.
    NotFound,
    /// Decode failure at a known location.
    Corrupt,
    /// Use of a disposed handle.
    ResourceMisuse,
    /// Host-level read failure or unreadable container.
    IoFailure,
    /// Bad input from the caller.
    InvalidArgument,
}

impl CoronerError
{
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind
    {
        match self {
            CoronerError::NotFound { .. } => ErrorKind::NotFound,
            CoronerError::Corrupt(_) => ErrorKind::Corrupt,
            CoronerError::ResourceMisuse { .. } => ErrorKind::ResourceMisuse,
            CoronerError::Io(_) | CoronerError::ImageFormat(_) => ErrorKind::IoFailure,
            CoronerError::ReadOutOfRange { .. } | CoronerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Whether callers are expected to degrade and continue
    ///
    /// `NotFound` and `Corrupt` are the conditions the model absorbs into
    /// "unknown" results. Everything else is reported to the command layer.
    #[must_use]
    pub fn is_recoverable(&self) -> bool
    {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Corrupt)
    }
}

/// Convenience type alias for `Result<T, CoronerError>`
///
/// ```rust
/// use coroner_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, CoronerError>;
