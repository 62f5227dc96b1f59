//! Resolution against a single working directory.

use std::path::{Path, PathBuf};

use super::{file_name, open_first, push_candidate, HandleTable, LibraryDataSource, LibraryResolver};
use crate::error::Result;

/// Resolves recorded names against the recorded path and a working directory
///
/// Candidates, in order:
///
/// 1. the recorded path itself if it is absolute
/// 2. the recorded path joined onto the working directory
/// 3. the bare file name in the working directory
#[derive(Debug)]
pub struct PathResolver
{
    working_dir: PathBuf,
    table: HandleTable,
}

impl PathResolver
{
    /// Create a resolver rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self
    {
        Self {
            working_dir: working_dir.into(),
            table: HandleTable::new(),
        }
    }

    /// Directory relative names are resolved against.
    pub fn working_dir(&self) -> &Path
    {
        &self.working_dir
    }

    /// Candidate locations for `name`, in search order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf>
    {
        let recorded = Path::new(name);
        let mut candidates = Vec::new();
        if recorded.is_absolute() {
            push_candidate(&mut candidates, recorded.to_path_buf());
        } else {
            push_candidate(&mut candidates, self.working_dir.join(recorded));
        }
        if let Some(file) = file_name(name) {
            push_candidate(&mut candidates, self.working_dir.join(file));
        }
        candidates
    }
}

impl LibraryResolver for PathResolver
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
    fn test_candidates_for_absolute_name()
    {
        let resolver = PathResolver::new("/work");
        assert_eq!(
            resolver.candidates("/opt/app/libfoo.so"),
            vec![PathBuf::from("/opt/app/libfoo.so"), PathBuf::from("/work/libfoo.so")]
        );
    }

    #[test]
    fn test_candidates_for_bare_name_are_deduplicated()
    {
        let resolver = PathResolver::new("/work");
        assert_eq!(resolver.candidates("libfoo.so"), vec![PathBuf::from("/work/libfoo.so")]);
    }
}
