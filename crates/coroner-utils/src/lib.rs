//! # Coroner Utilities
//!
//! Shared logging and configuration for the Coroner workspace.
//!
//! Logging is built on `tracing`; configuration reads `CORONER_*`
//! environment variables that the command line can override.

pub mod config;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigError, InspectConfig};
pub use logging::{
    init_logging, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
