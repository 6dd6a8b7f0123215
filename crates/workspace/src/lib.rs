//! Project graph and change detection for ripple
//!
//! - [`ProjectGraph`] orders projects topologically and expands a set of
//!   touched projects to everything that transitively depends on them.
//! - [`changes`] turns a git reference or time window into changed paths and
//!   maps those paths onto projects.
//! - [`affected`] combines both into the ordered list of projects to test.

pub mod affected;
pub mod changes;
pub mod graph;
pub mod render;

pub use affected::{compute_affected, AffectedMode, AffectedSet};
pub use changes::{
    collect_changes, match_projects_for_paths, ChangeRequest, ChangedFiles, GitCli, VcsClient,
};
pub use graph::{GraphWarning, ProjectGraph, TopoOrder};
pub use render::{render_graph, GraphFormat};
