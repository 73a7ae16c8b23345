//! Logging utilities.
//!
//! Centralizes logger initialization behind the `log` facade; the backend is
//! `env_logger`.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
