//! Ordered composition of resolvers, and construction from settings.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::{miss, DirectoryStore, LibraryDataSource, LibraryResolver, PathResolver, SearchPathResolver, StoreResolver};
use crate::error::{CoronerError, Result};

/// Store fetch timeout used when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tries each resolver in order; the first hit wins
///
/// Children are always asked silently. The chain itself emits at most one
/// warning per miss, listing every location any child searched.
#[derive(Default)]
pub struct ChainResolver
{
    resolvers: Vec<Box<dyn LibraryResolver>>,
}

impl std::fmt::Debug for ChainResolver
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ChainResolver").field("resolvers", &self.resolvers.len()).finish()
    }
}

impl ChainResolver
{
    /// Create an empty chain (every lookup misses).
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append a resolver to the end of the chain.
    #[must_use]
    pub fn with(mut self, resolver: impl LibraryResolver + 'static) -> Self
    {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Append a boxed resolver to the end of the chain.
    pub fn push(&mut self, resolver: Box<dyn LibraryResolver>)
    {
        self.resolvers.push(resolver);
    }

    /// Number of resolvers in the chain.
    pub fn len(&self) -> usize
    {
        self.resolvers.len()
    }

    /// `true` if the chain has no resolvers.
    pub fn is_empty(&self) -> bool
    {
        self.resolvers.is_empty()
    }
}

impl LibraryResolver for ChainResolver
{
    fn resolve_with(&self, name: &str, silent: bool) -> Result<LibraryDataSource>
    {
        let mut searched = Vec::new();
        for resolver in &self.resolvers {
            match resolver.resolve_with(name, true) {
                Ok(handle) => return Ok(handle),
                Err(CoronerError::NotFound { searched: more, .. }) => searched.extend(more),
                Err(err) if !silent => debug!("Resolver in chain failed for {name}: {err}"),
                Err(_) => {}
            }
        }
        Err(miss(name, searched, silent))
    }

    fn dispose(&self)
    {
        for resolver in &self.resolvers {
            resolver.dispose();
        }
    }
}

/// Where to look for artifacts
///
/// Built by the command layer from environment configuration and flags,
/// then turned into a resolver chain with [`build`](Self::build).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings
{
    /// Directory relative names are resolved against; the process working
    /// directory when unset.
    pub working_dir: Option<PathBuf>,
    /// Extra directories, searched in order after the working directory.
    pub search_path: Vec<PathBuf>,
    /// Directory of collected artifacts, consulted last.
    pub archive_dir: Option<PathBuf>,
    /// Timeout for each archive fetch.
    pub store_timeout: Duration,
}

impl Default for ResolverSettings
{
    fn default() -> Self
    {
        Self {
            working_dir: None,
            search_path: Vec::new(),
            archive_dir: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ResolverSettings
{
    /// Build the resolver chain: working directory, then search path, then
    /// archive
    ///
    /// ## Errors
    ///
    /// `Io` if the working directory is unset and the process working
    /// directory cannot be determined, or the archive fetch runtime cannot
    /// be started.
    pub fn build(&self) -> Result<ChainResolver>
    {
        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let mut chain = ChainResolver::new().with(PathResolver::new(working_dir));
        if !self.search_path.is_empty() {
            chain.push(Box::new(SearchPathResolver::new(self.search_path.iter().cloned())));
        }
        if let Some(archive) = &self.archive_dir {
            chain.push(Box::new(StoreResolver::new(DirectoryStore::new(archive), self.store_timeout)?));
        }

        debug!("Built resolver chain with {} resolvers", chain.len());
        Ok(chain)
    }
}
