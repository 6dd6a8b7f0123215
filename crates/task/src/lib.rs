//! Task planning and execution for ripple
//!
//! This crate turns projects and configured tasks into work items, orders
//! them into dependency tiers, and runs them through the [`Scheduler`] with
//! cache short-circuiting, retries and cancellation.

pub mod cancel;
pub mod items;
pub mod plan;
pub mod recorder;
pub mod runner;
pub mod scheduler;

pub use cancel::Cancellation;
pub use items::{project_run_item, project_test_items};
pub use plan::{resolve_tasks, WorkPlan};
pub use recorder::{load_last_results, JsonResultRecorder, NullRecorder, ResultSink};
pub use runner::{runner_for, truncate_line, CommandOutcome, CommandRunner, MockEvent, MockRunner, ShellRunner};
pub use scheduler::{ProgressFn, RunReport, Scheduler, SchedulerOptions};
