//! Resolution from an artifact store.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::debug;

use super::{file_name, miss, ArtifactOrigin, HandleTable, LibraryDataSource, LibraryResolver};
use crate::error::{CoronerError, Result};

/// Future returned by [`ArtifactStore::fetch`].
pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = io::Result<Option<Vec<u8>>>> + Send + 'a>>;

/// Asynchronous source of artifact bytes (an archive, a symbol server)
///
/// `fetch` resolves to `Ok(None)` when the store simply does not have the
/// artifact; `Err` is reserved for the store itself failing. Both count as a
/// miss for the resolver.
pub trait ArtifactStore: Send + Sync
{
    /// Short description for logs (e.g. `archive:/var/crash/modules`).
    fn describe(&self) -> String;

    /// Where `name` would live in this store, reported in `NotFound`.
    fn location(&self, name: &str) -> PathBuf;

    /// Fetch the bytes of `name`.
    fn fetch<'a>(&'a self, name: &'a str) -> StoreFuture<'a>;
}

/// Store backed by a directory of previously collected artifacts
///
/// Artifacts are stored flat by file name, the way a crash collector copies
/// the modules of a dying process next to its core file.
#[derive(Debug, Clone)]
pub struct DirectoryStore
{
    root: PathBuf,
}

impl DirectoryStore
{
    /// Create a store over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self
    {
        Self { root: root.into() }
    }

    /// Archive directory.
    pub fn root(&self) -> &Path
    {
        &self.root
    }
}

impl ArtifactStore for DirectoryStore
{
    fn describe(&self) -> String
    {
        format!("archive:{}", self.root.display())
    }

    fn location(&self, name: &str) -> PathBuf
    {
        match file_name(name) {
            Some(file) => self.root.join(file),
            None => self.root.clone(),
        }
    }

    fn fetch<'a>(&'a self, name: &'a str) -> StoreFuture<'a>
    {
        Box::pin(async move {
            if file_name(name).is_none() {
                return Ok(None);
            }
            match tokio::fs::read(self.location(name)).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err),
            }
        })
    }
}

/// Resolves names through an [`ArtifactStore`], falling back to another
/// resolver on a miss
///
/// Store fetches run on a private current-thread runtime and are abandoned
/// after the configured timeout. Call [`resolve_with`](LibraryResolver::resolve_with)
/// from synchronous code only: blocking on the private runtime from inside
/// another async runtime panics.
pub struct StoreResolver
{
    store: Box<dyn ArtifactStore>,
    timeout: Duration,
    fallback: Option<Box<dyn LibraryResolver>>,
    runtime: Runtime,
    table: HandleTable,
}

impl std::fmt::Debug for StoreResolver
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("StoreResolver")
            .field("store", &self.store.describe())
            .field("timeout", &self.timeout)
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl StoreResolver
{
    /// Create a resolver over `store` with a per-fetch `timeout`.
    ///
    /// ## Errors
    ///
    /// `Io` if the fetch runtime cannot be started.
    pub fn new(store: impl ArtifactStore + 'static, timeout: Duration) -> Result<Self>
    {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            store: Box::new(store),
            timeout,
            fallback: None,
            runtime,
            table: HandleTable::new(),
        })
    }

    /// Consult `fallback` when the store misses.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl LibraryResolver + 'static) -> Self
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Per-fetch timeout.
    pub fn timeout(&self) -> Duration
    {
        self.timeout
    }

    fn fetch(&self, name: &str, silent: bool) -> Option<Vec<u8>>
    {
        let store = self.store.describe();
        // The timer must be created inside the runtime
        let fetched = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, self.store.fetch(name)).await });
        match fetched {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                if !silent {
                    debug!("Store {store} failed fetching {name}: {err}");
                }
                None
            }
            Err(_) => {
                if !silent {
                    debug!("Store {store} timed out after {:?} fetching {name}", self.timeout);
                }
                None
            }
        }
    }
}

impl LibraryResolver for StoreResolver
{
    fn resolve_with(&self, name: &str, silent: bool) -> Result<LibraryDataSource>
    {
        if let Some(handle) = self.table.lookup(name) {
            return Ok(handle);
        }

        if let Some(bytes) = self.fetch(name, silent) {
            debug!("Resolved {name} from {} ({} bytes)", self.store.describe(), bytes.len());
            let origin = ArtifactOrigin::Store {
                store: self.store.describe(),
            };
            return Ok(self.table.insert(name, None, origin, bytes));
        }

        let mut searched = vec![self.store.location(name)];
        if let Some(fallback) = &self.fallback {
            match fallback.resolve_with(name, true) {
                Ok(handle) => return Ok(handle),
                Err(CoronerError::NotFound { searched: more, .. }) => searched.extend(more),
                Err(err) if !silent => debug!("Fallback failed resolving {name}: {err}"),
                Err(_) => {}
            }
        }

        Err(miss(name, searched, silent))
    }

    fn dispose(&self)
    {
        self.table.dispose();
        if let Some(fallback) = &self.fallback {
            fallback.dispose();
        }
    }
}
