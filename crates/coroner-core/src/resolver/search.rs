//! Resolution across an ordered list of search directories.

use std::path::PathBuf;

use super::{file_name, open_first, push_candidate, relative_form, HandleTable, LibraryDataSource, LibraryResolver};
use crate::error::Result;

/// Resolves recorded names under an ordered list of directories
///
/// For each directory in turn, the recorded path re-rooted under it is tried
/// first (`/opt/app/libfoo.so` → `<dir>/opt/app/libfoo.so`), then the bare
/// file name (`<dir>/libfoo.so`). This covers both a sysroot-style copy of
/// the crashed machine and a flat directory of collected modules.
#[derive(Debug)]
pub struct SearchPathResolver
{
    dirs: Vec<PathBuf>,
    table: HandleTable,
}

impl SearchPathResolver
{
    /// Create a resolver over `dirs`, searched in order.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            table: HandleTable::new(),
        }
    }

    /// Directories searched, in order.
    pub fn dirs(&self) -> &[PathBuf]
    {
        &self.dirs
    }

    /// Candidate locations for `name`, in search order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf>
    {
        let relative = relative_form(name);
        let file = file_name(name);
        let mut candidates = Vec::with_capacity(self.dirs.len() * 2);
        for dir in &self.dirs {
            if !relative.as_os_str().is_empty() {
                push_candidate(&mut candidates, dir.join(&relative));
            }
            if let Some(file) = file {
                push_candidate(&mut candidates, dir.join(file));
            }
        }
        candidates
    }
}

impl LibraryResolver for SearchPathResolver
{
    fn resolve_with(&self, name: &str, silent: bool) -> Result<LibraryDataSource>
    {
        if let Some(handle) = self.table.lookup(name) {
            return Ok(handle);
        }
        open_first(&self.table, name, self.candidates(name), silent)
    }

    fn dispose(&self)
    {
        self.table.dispose();
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_candidates_interleave_per_directory()
    {
        let resolver = SearchPathResolver::new(["/sysroot", "/flat"]);
        assert_eq!(
            resolver.candidates("/opt/libfoo.so"),
            vec![
                PathBuf::from("/sysroot/opt/libfoo.so"),
                PathBuf::from("/sysroot/libfoo.so"),
                PathBuf::from("/flat/opt/libfoo.so"),
                PathBuf::from("/flat/libfoo.so"),
            ]
        );
    }

    #[test]
    fn test_no_directories_no_candidates()
    {
        let resolver = SearchPathResolver::new(Vec::<PathBuf>::new());
        assert!(resolver.candidates("libfoo.so").is_empty());
    }
}
