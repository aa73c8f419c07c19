//! End-to-end capture runs.
//!
//! - [`runner::CapturePipeline`] -- scoped simulator and sensors, the
//!   per-episode step loop, and sequential task/batch runs.
//! - [`batch::run_tasks_concurrently`] -- independent pipelines per task on
//!   blocking worker threads.
//! - [`summary`] -- what a task or batch run produced.

pub mod batch;
pub mod runner;
pub mod summary;

pub use batch::run_tasks_concurrently;
pub use runner::CapturePipeline;
pub use summary::{BatchSummary, EpisodeFailure, TaskOutcome, TaskSummary};
