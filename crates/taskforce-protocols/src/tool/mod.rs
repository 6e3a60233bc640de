//! Tool protocol definitions.
//!
//! Tools are the primary way agents interact with the world.

mod context;
mod definition;
mod result;
mod traits;

pub use context::*;
pub use definition::*;
pub use result::*;
pub use traits::*;
