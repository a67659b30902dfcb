//! Pipeline entry points.
//!
//! - `fetch`: one resumable pagination cycle
//! - `merge`: fold a run's raw batches into a snapshot
//! - `diff`: added/deleted records between two snapshots
//! - `counts`: following-count samples and their dumps

pub mod counts;
pub mod diff;
pub mod fetch;
pub mod invocation;
pub mod merge;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use diff::{DiffReport, DiffResult, diff_snapshots};
pub use fetch::{CycleReport, FetchCycle, FetchOutcome};
pub use invocation::{InvocationRequest, dispatch, invoke, query_kind};
pub use merge::{MergeReport, merge_batches};
pub use pipeline::{FetchRun, Pipeline};
