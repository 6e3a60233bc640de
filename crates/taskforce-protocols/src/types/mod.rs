//! Common types shared across the runtime.

mod common;
mod content;
mod message;

pub use common::*;
pub use content::*;
pub use message::*;
