//! # Glint Utilities
//!
//! Shared utilities and logging for the Glint workspace.
//!
//! The interesting part is debugger-hook logging: the runtime prints its
//! command output on stdout, so diagnostics must go to a file instead.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_for_debugger, init_logging_with_level, LogFormat, LogLevel};
pub use tracing::{debug, error, info, trace, warn};
