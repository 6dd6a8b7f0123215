//! Shared utilities for ripple
//!
//! Tracing setup, atomic file writes and retry-with-backoff used by the
//! cache backends, the result recorder and the CLI.

pub mod atomic_file;
pub mod retry;
pub mod tracing;

pub use atomic_file::*;
pub use retry::*;
