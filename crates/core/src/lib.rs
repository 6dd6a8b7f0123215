//! Core domain types, errors, and constants for `ripple`.
//!
//! Every other crate in the workspace builds on the types defined here:
//! projects from the registry, task specifications, execution results and
//! the shared error taxonomy.
//!
//! ## Key Components
//!
//! - **`errors`**: The primary `Error` enum and `Result` alias. Variants follow
//!   the failure classes the scheduler distinguishes (configuration, VCS,
//!   cache, execution).
//! - **`types`**: Projects, tasks, cache entries and run results.
//! - **`constants`**: File names, environment variable names and defaults.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt},
    types::*,
};
