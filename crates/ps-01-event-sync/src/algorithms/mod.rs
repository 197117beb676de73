//! # Algorithms Module
//!
//! Pure planning, retry and merge logic used by the fetch pipeline.

pub mod batch_plan;
pub mod merge;
pub mod retry;

pub use batch_plan::{plan_fetch, split_range, FetchPlan};
pub use merge::{merge_events, MergeOutcome};
pub use retry::{parse_accepted_block, retry_range, RetryOutcome, RetryPolicy};
