//! # Inspection Configuration
//!
//! Environment-driven defaults for locating artifacts. Command-line flags
//! are layered on top by the caller.
//!
//! - `CORONER_SEARCH_PATH`: directories to search, separated like `PATH`
//! - `CORONER_ARCHIVE_DIR`: artifact store directory consulted after the search path
//! - `CORONER_STORE_TIMEOUT_MS`: per-fetch store timeout in milliseconds

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Search directories for artifacts.
pub const SEARCH_PATH_VAR: &str = "CORONER_SEARCH_PATH";
/// Artifact store directory.
pub const ARCHIVE_DIR_VAR: &str = "CORONER_ARCHIVE_DIR";
/// Store fetch timeout, in milliseconds.
pub const STORE_TIMEOUT_VAR: &str = "CORONER_STORE_TIMEOUT_MS";

/// Settings for artifact resolution gathered from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectConfig
{
    /// Directories searched after the recorded path.
    pub search_path: Vec<PathBuf>,
    /// Artifact store, if any.
    pub archive_dir: Option<PathBuf>,
    /// Store timeout; `None` keeps the resolver default.
    pub store_timeout: Option<Duration>,
}

impl InspectConfig
{
    /// Read configuration from the process environment.
    ///
    /// ## Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|var| env::var_os(var))
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_utils::InspectConfig;
    ///
    /// let config = InspectConfig::from_lookup(|var| match var {
    ///     "CORONER_ARCHIVE_DIR" => Some("/srv/symbols".into()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.archive_dir.as_deref(), Some(std::path::Path::new("/srv/symbols")));
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns an error if the timeout is not a whole number of milliseconds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self, ConfigError>
    {
        let search_path = lookup(SEARCH_PATH_VAR)
            .map(|value| env::split_paths(&value).filter(|dir| !dir.as_os_str().is_empty()).collect())
            .unwrap_or_default();

        let archive_dir = lookup(ARCHIVE_DIR_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let store_timeout = match lookup(STORE_TIMEOUT_VAR) {
            None => None,
            Some(value) => Some(parse_millis(STORE_TIMEOUT_VAR, &value)?),
        };

        Ok(Self {
            search_path,
            archive_dir,
            store_timeout,
        })
    }
}

fn parse_millis(var: &'static str, value: &OsString) -> Result<Duration, ConfigError>
{
    let text = value.to_str().ok_or(ConfigError::NotUnicode { var })?;
    text.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: text.to_string(),
        })
}

/// Configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError
{
    /// A variable held something that does not parse
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue
    {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A variable that must be text is not valid Unicode
    #[error("{var} is not valid Unicode")]
    NotUnicode
    {
        /// Variable name.
        var: &'static str,
    },
}
