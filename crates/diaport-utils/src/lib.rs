//! # diaport Utilities
//!
//! Shared logging and configuration for the diaport workspace.
//!
//! The core library only emits `tracing` events; binaries decide where they
//! go by calling [`init_logging`] with [`Settings`] read from the environment.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Settings};
// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
