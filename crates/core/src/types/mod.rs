//! Core domain types for `ripple`.
//!
//! ## Organization
//!
//! - **`project`**: Projects loaded from the registry
//! - **`tasks`**: Task specifications and declared outputs
//! - **`cache`**: Cache modes and stored cache entries
//! - **`results`**: Per-item execution results and run summaries

pub mod cache;
pub mod project;
pub mod results;
pub mod tasks;

// Re-export all public types for convenient access
pub use cache::*;
pub use project::*;
pub use results::*;
pub use tasks::*;
