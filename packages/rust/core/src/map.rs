//! Map stage: one grounded question per unit of work.
//!
//! Complete documents (split into a single segment) are packed together into
//! [`WorkUnit::DocumentBatch`]es; each segment of a multi-chunk document
//! becomes its own [`WorkUnit::Segment`]. A document is never both.

use tracing::{info, instrument};

use docdigest_shared::{Result, Segment};

use crate::packing::pack_greedy;
use crate::progress::QueryRunner;
use crate::prompts::{document_batch_prompt, segment_prompt};

/// One prompt's worth of source text.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkUnit<'a> {
    /// Whole documents whose combined length fits the chunk-size ceiling.
    DocumentBatch(Vec<&'a Segment>),
    /// One segment of a multi-chunk document.
    Segment(&'a Segment),
}

impl WorkUnit<'_> {
    /// Prompt for this unit.
    pub fn prompt(&self, question: &str) -> String {
        match self {
            WorkUnit::DocumentBatch(docs) => document_batch_prompt(docs, question),
            WorkUnit::Segment(segment) => segment_prompt(segment, question),
        }
    }

    /// Human-readable label for progress output.
    pub fn describe(&self) -> String {
        match self {
            WorkUnit::DocumentBatch(docs) => {
                let names: Vec<&str> = docs.iter().map(|d| d.document_name.as_str()).collect();
                format!("batch of {} document(s): {}", docs.len(), names.join(", "))
            }
            WorkUnit::Segment(s) => format!(
                "{} chunk {}/{} (global {}/{})",
                s.document_name, s.local_index, s.local_total, s.global_index, s.global_total
            ),
        }
    }
}

/// Partition segments into units of work.
///
/// Batches come first, packed greedily in crawl order under `ceiling`
/// characters, followed by multi-chunk segments in document then local-index
/// order.
pub fn plan_work_units(segments: &[Segment], ceiling: usize) -> Vec<WorkUnit<'_>> {
    let complete = segments.iter().filter(|s| s.is_complete_document());

    let mut units: Vec<WorkUnit<'_>> = pack_greedy(complete, ceiling, |s| s.char_len())
        .into_iter()
        .map(WorkUnit::DocumentBatch)
        .collect();

    let mut chunked: Vec<&Segment> = segments
        .iter()
        .filter(|s| !s.is_complete_document())
        .collect();
    chunked.sort_by_key(|s| (s.document_index, s.local_index));
    units.extend(chunked.into_iter().map(WorkUnit::Segment));

    units
}

/// Initial query estimate: one per unit plus a final reduce when there is
/// more than one answer to merge.
pub fn initial_query_estimate(units: usize) -> usize {
    units + usize::from(units > 1)
}

/// Ask the question of every unit, in order. The first failure aborts.
#[instrument(skip_all, fields(units = units.len()))]
pub async fn map_stage(
    units: &[WorkUnit<'_>],
    question: &str,
    runner: &mut QueryRunner<'_>,
) -> Result<Vec<String>> {
    let mut answers = Vec::with_capacity(units.len());

    for (i, unit) in units.iter().enumerate() {
        let detail = unit.describe();
        info!(unit = i + 1, total = units.len(), %detail, "mapping unit");
        let answer = runner.ask(&unit.prompt(question), &detail).await?;
        answers.push(answer);
    }

    Ok(answers)
}
