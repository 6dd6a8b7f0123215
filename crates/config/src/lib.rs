//! Configuration for ripple
//!
//! Everything the rest of the workspace needs from disk or the environment is
//! loaded here once at startup: the immutable [`RuntimeConfig`], the project
//! registry, task specifications and the small persisted CLI state.

pub mod config;
pub mod file;
pub mod loader;
pub mod registry;
pub mod state;
pub mod tasks;

pub use config::{Adapter, RuntimeConfig, RuntimeOptions};
pub use file::ConfigFile;
pub use loader::ConfigLoader;
pub use registry::load_registry;
pub use state::{CliState, StateStore};
pub use tasks::{load_task_specs, parse_task_specs};
