//! Stratizens Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by the other Stratizens crates:
//! - Application configuration (channel endpoint, reconnect settings, identity)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Platform directory lookup and common constants

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, UserId};
pub use error::{SzError, SzResult};
pub use logging::init_logging;
pub use platform::Platform;
