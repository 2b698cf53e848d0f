//! Tool system modules and re-exports.

// === Modules ===

pub mod media;
pub mod registry;
pub mod spec;

// === Re-exports ===

// Re-export commonly used types from spec
pub use spec::ToolContext;

// Re-export registry types
pub use registry::{ToolRegistry, ToolRegistryBuilder};
