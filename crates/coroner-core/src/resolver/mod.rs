//! # Artifact Resolver
//!
//! Locates the on-disk copy of a module named in an image and hands back a
//! read-only handle onto its bytes.
//!
//! The name recorded in a core dump is the path the module had on the
//! machine that crashed. On the machine doing the analysis the file usually
//! lives somewhere else, so every resolver turns one recorded name into an
//! ordered list of candidate locations and takes the first readable one.
//!
//! | resolver               | candidates                                                 |
//! |------------------------|------------------------------------------------------------|
//! | [`PathResolver`]       | recorded path, working-dir relative, bare file name        |
//! | [`SearchPathResolver`] | recorded path re-rooted under each directory, bare name    |
//! | [`StoreResolver`]      | an [`ArtifactStore`] under a timeout, then a fallback      |
//! | [`ChainResolver`]      | each child resolver in order                               |
//!
//! A miss is [`CoronerError::NotFound`](crate::error::CoronerError::NotFound)
//! and is logged at `warn` unless the caller asked for a silent lookup.
//! Resolved artifacts live in the resolver's [`HandleTable`] until
//! [`LibraryResolver::dispose`] releases them all at once.

mod chain;
mod handle;
mod path;
mod search;
mod store;

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace, warn};

pub use chain::{ChainResolver, ResolverSettings, DEFAULT_STORE_TIMEOUT};
pub use handle::{ArtifactOrigin, HandleTable, LibraryDataSource};
pub use path::PathResolver;
pub use search::SearchPathResolver;
pub use store::{ArtifactStore, DirectoryStore, StoreFuture, StoreResolver};

use crate::error::{CoronerError, Result};

/// Maps a module name recorded in an image to a handle onto its bytes
///
/// Implementations are shared across threads; resolution of one name from
/// several threads at once yields handles onto the same bytes.
pub trait LibraryResolver: Send + Sync
{
    /// Resolve `name`, suppressing the miss warning when `silent` is set
    ///
    /// The result is the same either way; `silent` only controls logging.
    ///
    /// ## Errors
    ///
    /// `NotFound` listing every location searched.
    fn resolve_with(&self, name: &str, silent: bool) -> Result<LibraryDataSource>;

    /// Resolve `name`, warning on a miss.
    ///
    /// ## Errors
    ///
    /// `NotFound` listing every location searched.
    fn resolve(&self, name: &str) -> Result<LibraryDataSource>
    {
        self.resolve_with(name, false)
    }

    /// Release every open artifact and invalidate every issued handle
    ///
    /// Idempotent. The resolver stays usable; later resolutions open the
    /// artifacts again.
    fn dispose(&self);
}

/// Last path component of a recorded name (`/opt/app/lib/libfoo.so` → `libfoo.so`).
pub(crate) fn file_name(name: &str) -> Option<&Path>
{
    Path::new(name).file_name().map(Path::new)
}

/// A recorded path with its root and any `.`/`..` stripped, for re-rooting
/// under a search directory.
pub(crate) fn relative_form(name: &str) -> PathBuf
{
    Path::new(name)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Push `path` unless an equal candidate is already queued.
pub(crate) fn push_candidate(candidates: &mut Vec<PathBuf>, path: PathBuf)
{
    if !candidates.contains(&path) {
        candidates.push(path);
    }
}

/// Try each candidate in order, opening the first readable one in `table`
///
/// Missing files are skipped at `trace`; files that exist but cannot be read
/// (permissions, directories) are skipped at `debug`. A `silent` lookup logs
/// nothing for skipped candidates. On a miss the returned error lists every
/// candidate.
pub(crate) fn open_first(table: &HandleTable, name: &str, candidates: Vec<PathBuf>, silent: bool) -> Result<LibraryDataSource>
{
    for candidate in &candidates {
        match fs::read(candidate) {
            Ok(bytes) => {
                debug!("Resolved {name} to {} ({} bytes)", candidate.display(), bytes.len());
                return Ok(table.insert(name, Some(candidate.clone()), ArtifactOrigin::Filesystem, bytes));
            }
            Err(_) if silent => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!("No artifact at {}", candidate.display());
            }
            Err(err) => {
                debug!("Skipping unreadable candidate {}: {err}", candidate.display());
            }
        }
    }

    Err(miss(name, candidates, silent))
}

/// Build the `NotFound` error for a miss, warning unless `silent`.
pub(crate) fn miss(name: &str, searched: Vec<PathBuf>, silent: bool) -> CoronerError
{
    if !silent {
        warn!("Unable to locate artifact {name} ({} locations searched)", searched.len());
    }
    CoronerError::NotFound {
        name: name.to_string(),
        searched,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_relative_form_strips_root_and_dots()
    {
        assert_eq!(relative_form("/opt/app/./lib/libfoo.so"), PathBuf::from("opt/app/lib/libfoo.so"));
        assert_eq!(relative_form("libfoo.so"), PathBuf::from("libfoo.so"));
    }

    #[test]
    fn test_file_name()
    {
        assert_eq!(file_name("/opt/app/libfoo.so"), Some(Path::new("libfoo.so")));
        assert_eq!(file_name("/"), None);
    }
}
