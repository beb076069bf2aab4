//! Query accounting and progress reporting.
//!
//! Every backend call goes through [`QueryRunner::ask`], which owns the single
//! [`QueryCounter`] for a run, rejects blank answers, and notifies the
//! [`ProgressReporter`].

use std::path::Path;

use tracing::debug;

use docdigest_llm::ChatBackend;
use docdigest_shared::{DigestError, Result};

use crate::prompts::prompt_preview;

// ---------------------------------------------------------------------------
// QueryCounter
// ---------------------------------------------------------------------------

/// Completed vs. expected backend queries.
///
/// `expected` starts as the map stage's estimate and only ever grows, when the
/// reducer discovers it needs extra merge passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounter {
    completed: usize,
    expected: usize,
}

impl QueryCounter {
    /// Start with an initial estimate.
    pub fn new(expected: usize) -> Self {
        Self {
            completed: 0,
            expected,
        }
    }

    /// Queries answered so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Current estimate of the total.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Revise the estimate upward by `extra` queries.
    pub fn expect_more(&mut self, extra: usize) {
        self.expected += extra;
    }

    /// Count one answered query.
    pub fn record(&mut self) {
        self.completed += 1;
        self.expected = self.expected.max(self.completed);
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for digest runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a matched file is extracted.
    fn file_ingesting(&self, path: &Path, current: usize);
    /// Called once per document after splitting.
    fn document_split(&self, name: &str, chunks: usize);
    /// Called right before a prompt is sent; `counter` excludes this query.
    fn query_started(&self, counter: &QueryCounter, detail: &str, prompt: &str);
    /// Called after a non-empty answer arrives.
    fn query_answered(&self, counter: &QueryCounter, answer: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_ingesting(&self, _path: &Path, _current: usize) {}
    fn document_split(&self, _name: &str, _chunks: usize) {}
    fn query_started(&self, _counter: &QueryCounter, _detail: &str, _prompt: &str) {}
    fn query_answered(&self, _counter: &QueryCounter, _answer: &str) {}
}

// ---------------------------------------------------------------------------
// QueryRunner
// ---------------------------------------------------------------------------

/// Sequential gateway to the backend for one run.
pub struct QueryRunner<'a> {
    backend: &'a dyn ChatBackend,
    progress: &'a dyn ProgressReporter,
    counter: QueryCounter,
}

impl<'a> QueryRunner<'a> {
    /// Create a runner with an initial query estimate.
    pub fn new(
        backend: &'a dyn ChatBackend,
        progress: &'a dyn ProgressReporter,
        expected: usize,
    ) -> Self {
        Self {
            backend,
            progress,
            counter: QueryCounter::new(expected),
        }
    }

    /// Snapshot of the counter.
    pub fn counter(&self) -> QueryCounter {
        self.counter
    }

    /// Revise the expected query count upward.
    pub fn expect_more(&mut self, extra: usize) {
        self.counter.expect_more(extra);
    }

    /// Send one prompt and wait for its answer.
    ///
    /// A blank answer is an [`DigestError::EmptyResponse`]; there is no retry.
    pub async fn ask(&mut self, prompt: &str, detail: &str) -> Result<String> {
        self.progress.query_started(&self.counter, detail, prompt);
        debug!(
            detail,
            prompt_chars = prompt.len(),
            preview = %prompt_preview(prompt),
            "sending prompt"
        );

        let answer = self.backend.invoke(prompt).await?;
        if answer.trim().is_empty() {
            return Err(DigestError::empty_response(prompt));
        }

        self.counter.record();
        debug!(
            completed = self.counter.completed(),
            expected = self.counter.expected(),
            answer_chars = answer.len(),
            "answer received"
        );
        self.progress.query_answered(&self.counter, &answer);
        Ok(answer)
    }
}
