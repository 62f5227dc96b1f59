//! Artifact handles and the table that issues them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::error::{CoronerError, Result};

/// Where an artifact's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin
{
    /// Read from a file on the host.
    Filesystem,
    /// Fetched from an artifact store.
    Store
    {
        /// Store description, for diagnostics.
        store: String,
    },
}

/// Bytes of one resolved artifact, owned by a [`HandleTable`].
#[derive(Debug)]
pub(crate) struct Artifact
{
    bytes: Vec<u8>,
}

/// Read-only handle to a resolved artifact
///
/// Handles do not own the artifact. They hold a weak reference into their
/// resolver's handle table, so once the resolver is disposed every read
/// returns [`CoronerError::ResourceMisuse`] instead of stale bytes. Cloning a
/// handle is cheap; clones share the same bytes.
///
/// ## Example
///
/// ```rust,no_run
/// use coroner_core::resolver::{LibraryResolver, PathResolver};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>>
/// {
///     let resolver = PathResolver::new(".");
///     let lib = resolver.resolve("libfoo.so")?;
///     let magic = lib.read_at(0, 4)?;
///     println!("{} starts with {magic:02x?}", lib.name());
///
///     resolver.dispose();
///     assert!(lib.read_at(0, 4).is_err());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LibraryDataSource
{
    name: String,
    path: Option<PathBuf>,
    origin: ArtifactOrigin,
    generation: u64,
    artifact: Weak<Artifact>,
}

impl LibraryDataSource
{
    fn artifact(&self) -> Result<Arc<Artifact>>
    {
        self.artifact.upgrade().ok_or_else(|| CoronerError::ResourceMisuse {
            name: self.name.clone(),
        })
    }

    /// Name the artifact was resolved for.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Host path the bytes were read from, if they came from a file.
    pub fn path(&self) -> Option<&Path>
    {
        self.path.as_deref()
    }

    /// Where the bytes came from.
    pub fn origin(&self) -> &ArtifactOrigin
    {
        &self.origin
    }

    /// Handle-table generation this handle was issued in.
    pub fn generation(&self) -> u64
    {
        self.generation
    }

    /// `false` once the issuing resolver has been disposed.
    pub fn is_valid(&self) -> bool
    {
        self.artifact.strong_count() > 0
    }

    /// Artifact size in bytes.
    ///
    /// ## Errors
    ///
    /// `ResourceMisuse` if the resolver has been disposed.
    pub fn len(&self) -> Result<u64>
    {
        Ok(self.artifact()?.bytes.len() as u64)
    }

    /// `true` for a zero-length artifact.
    ///
    /// ## Errors
    ///
    /// `ResourceMisuse` if the resolver has been disposed.
    pub fn is_empty(&self) -> Result<bool>
    {
        Ok(self.artifact()?.bytes.is_empty())
    }

    /// Copy `len` bytes starting at `offset`
    ///
    /// ## Errors
    ///
    /// - `ResourceMisuse` if the resolver has been disposed
    /// - `ReadOutOfRange` if the range extends past the end of the artifact
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>
    {
        self.with_bytes(|bytes| -> Result<Vec<u8>> {
            let size = bytes.len() as u64;
            let out_of_range = || CoronerError::ReadOutOfRange {
                name: self.name.clone(),
                offset,
                len,
                size,
            };
            let start = usize::try_from(offset).map_err(|_| out_of_range())?;
            let end = start.checked_add(len).ok_or_else(out_of_range)?;
            bytes.get(start..end).map(<[u8]>::to_vec).ok_or_else(out_of_range)
        })?
    }

    /// Run `f` over the whole artifact without copying it.
    ///
    /// ## Errors
    ///
    /// `ResourceMisuse` if the resolver has been disposed.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R>
    {
        let artifact = self.artifact()?;
        Ok(f(&artifact.bytes))
    }
}

/// Resolver-owned table of open artifacts
///
/// Holds the only strong references to artifact bytes. Lookups and inserts
/// take the lock briefly; [`dispose`](Self::dispose) swaps the whole map out
/// in one step and bumps the generation, so a handle is either fully usable
/// or fully invalid.
#[derive(Debug, Default)]
pub struct HandleTable
{
    entries: RwLock<HashMap<String, OpenArtifact>>,
    generation: AtomicU64,
}

#[derive(Debug)]
struct OpenArtifact
{
    path: Option<PathBuf>,
    origin: ArtifactOrigin,
    artifact: Arc<Artifact>,
}

impl HandleTable
{
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn issue(&self, name: &str, entry: &OpenArtifact) -> LibraryDataSource
    {
        LibraryDataSource {
            name: name.to_string(),
            path: entry.path.clone(),
            origin: entry.origin.clone(),
            generation: self.generation(),
            artifact: Arc::downgrade(&entry.artifact),
        }
    }

    /// A fresh handle onto an already-open artifact.
    pub fn lookup(&self, name: &str) -> Option<LibraryDataSource>
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(|entry| self.issue(name, entry))
    }

    /// Open an artifact and return a handle onto it
    ///
    /// If another caller opened the same name first, their bytes are kept and
    /// `bytes` is dropped, so every handle for a name shares one buffer.
    pub fn insert(&self, name: &str, path: Option<PathBuf>, origin: ArtifactOrigin, bytes: Vec<u8>) -> LibraryDataSource
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(name.to_string()).or_insert_with(|| OpenArtifact {
            path,
            origin,
            artifact: Arc::new(Artifact { bytes }),
        });
        self.issue(name, entry)
    }

    /// Drop every open artifact, invalidating all issued handles
    ///
    /// Returns the number of artifacts released. Calling it again, or before
    /// anything was opened, releases nothing.
    pub fn dispose(&self) -> usize
    {
        let released = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *entries)
        };
        if !released.is_empty() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            debug!("Released {} open artifacts", released.len());
        }
        released.len()
    }

    /// Number of open artifacts.
    pub fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing is open.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// Number of disposals that released at least one artifact.
    pub fn generation(&self) -> u64
    {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_second_insert_shares_first_bytes()
    {
        let table = HandleTable::new();
        let first = table.insert("libfoo.so", None, ArtifactOrigin::Filesystem, vec![1, 2, 3]);
        let second = table.insert("libfoo.so", None, ArtifactOrigin::Filesystem, vec![9]);
        assert_eq!(second.len().unwrap(), 3);
        assert_eq!(first.read_at(1, 2).unwrap(), vec![2, 3]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_read_past_end_is_out_of_range()
    {
        let table = HandleTable::new();
        let handle = table.insert("a", None, ArtifactOrigin::Filesystem, vec![0; 4]);
        assert!(handle.read_at(4, 0).unwrap().is_empty());
        let err = handle.read_at(3, 2).unwrap_err();
        assert!(matches!(err, CoronerError::ReadOutOfRange { offset: 3, len: 2, size: 4, .. }));
        assert!(handle.read_at(u64::MAX, 1).is_err());
    }

    #[test]
    fn test_dispose_invalidates_and_bumps_generation()
    {
        let table = HandleTable::new();
        assert_eq!(table.dispose(), 0);
        assert_eq!(table.generation(), 0);

        let handle = table.insert("a", None, ArtifactOrigin::Filesystem, vec![0; 4]);
        assert!(handle.is_valid());
        assert_eq!(table.dispose(), 1);
        assert_eq!(table.generation(), 1);
        assert!(!handle.is_valid());
        assert!(matches!(handle.len(), Err(CoronerError::ResourceMisuse { .. })));
        assert!(table.lookup("a").is_none());
    }
}
