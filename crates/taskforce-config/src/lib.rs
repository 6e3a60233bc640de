//! # Taskforce Config
//!
//! Configuration management for the taskforce runtime: call admission
//! limits, retry backoff, subagent defaults and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
