//! Trifle Common
//!
//! Shared utilities for the Trifle PKI crates:
//! - Component-based structured logging with a context id (device or authority name)
//! - Logging configuration applied through `env_logger`

pub mod logging;

pub use logging::{Component, LogLevel, Logger, LoggingConfig};
