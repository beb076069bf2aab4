//! Core pipeline orchestration for docdigest.
//!
//! This crate ties together crawling, splitting, and the map and reduce
//! stages into an end-to-end workflow (`run_digest`), plus planning for
//! per-subdirectory batch runs.

pub mod batch;
pub mod map;
pub mod packing;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reduce;

#[cfg(test)]
pub(crate) mod testing;

pub use map::{WorkUnit, map_stage, plan_work_units};
pub use pipeline::{
    DEFAULT_QUESTION, DigestConfig, DigestResult, persist_answer, resolve_question,
    run_and_persist, run_digest,
};
pub use progress::{ProgressReporter, QueryCounter, QueryRunner, SilentProgress};
pub use reduce::{ReductionBatch, approx_token_count, greedy_pack, reduce_stage};
