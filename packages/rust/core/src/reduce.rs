//! Reduce stage: merge map answers until one remains.
//!
//! Each level either fits every answer under the budget and asks for the
//! final consolidation, or packs answers into [`ReductionBatch`]es and
//! consolidates each batch into one intermediate answer. No batch handed to
//! the backend exceeds the budget unless it holds a single answer. Levels run
//! in a loop with a hard cap.

use tracing::{info, instrument};

use docdigest_shared::{DigestError, Result};

use crate::packing::pack_greedy;
use crate::progress::QueryRunner;
use crate::prompts::{final_prompt, intermediate_prompt};

/// Upper bound on reduction levels before giving up.
pub const MAX_REDUCTION_LEVELS: usize = 32;

/// Whitespace-delimited word count, used as the token budget measure.
pub fn approx_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Answers consolidated together in one intermediate prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionBatch<'a> {
    /// Member answers, in order.
    pub answers: Vec<&'a str>,
    /// Sum of the members' approximate token counts.
    pub tokens: usize,
}

impl<'a> ReductionBatch<'a> {
    fn new(answers: Vec<&'a str>) -> Self {
        let tokens = answers.iter().map(|a| approx_token_count(a)).sum();
        Self { answers, tokens }
    }

    /// Member answers joined with newlines.
    pub fn joined(&self) -> String {
        self.answers.join("\n")
    }
}

/// Pack answers in order into batches whose token count stays within `budget`.
///
/// An answer over budget on its own forms a singleton batch.
pub fn greedy_pack(answers: &[String], budget: usize) -> Vec<ReductionBatch<'_>> {
    pack_greedy(answers.iter().map(String::as_str), budget, |a| approx_token_count(a))
        .into_iter()
        .map(ReductionBatch::new)
        .collect()
}

/// Reduce `answers` to a single answer within `budget` approximate tokens.
///
/// A single answer is returned as-is without any backend call.
#[instrument(skip_all, fields(answers = answers.len(), budget))]
pub async fn reduce_stage(
    mut answers: Vec<String>,
    question: &str,
    budget: usize,
    runner: &mut QueryRunner<'_>,
) -> Result<String> {
    if answers.is_empty() {
        return Err(DigestError::validation("nothing to reduce: no answers"));
    }

    let mut level = 0;
    loop {
        if answers.len() == 1 {
            return Ok(answers.swap_remove(0));
        }
        if level == MAX_REDUCTION_LEVELS {
            return Err(DigestError::ReductionDidNotConverge {
                levels: level,
                remaining: answers.len(),
            });
        }
        level += 1;

        let combined = answers.join("\n");
        let tokens = approx_token_count(&combined);
        if tokens <= budget {
            info!(level, answers = answers.len(), tokens, "final consolidation");
            return runner
                .ask(&final_prompt(&combined, question), "final consolidation")
                .await;
        }

        let batches = greedy_pack(&answers, budget);
        info!(
            level,
            answers = answers.len(),
            batches = batches.len(),
            tokens,
            "answers exceed budget, consolidating in batches"
        );
        runner.expect_more(batches.len());

        let mut merged = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let detail = format!(
                "level {level} batch {}/{} ({} answers, ~{} tokens)",
                i + 1,
                batches.len(),
                batch.answers.len(),
                batch.tokens
            );
            let prompt = intermediate_prompt(&batch.joined(), question);
            merged.push(runner.ask(&prompt, &detail).await?);
        }
        answers = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::testing::ScriptedBackend;

    fn words(n: usize, tag: &str) -> String {
        vec![tag; n].join(" ")
    }

    #[test]
    fn token_count_is_word_count() {
        assert_eq!(approx_token_count(""), 0);
        assert_eq!(approx_token_count("  one\ttwo\n\nthree  "), 3);
    }

    #[test]
    fn pack_respects_budget_and_order() {
        let answers = vec![words(4, "a"), words(4, "b"), words(3, "c"), words(20, "d")];
        let batches = greedy_pack(&answers, 10);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].tokens, 8);
        assert_eq!(batches[1].tokens, 3);
        assert_eq!(batches[2].answers, vec![answers[3].as_str()]);
        for batch in &batches {
            assert!(!batch.answers.is_empty());
            assert!(batch.tokens <= 10 || batch.answers.len() == 1);
        }
    }

    #[tokio::test]
    async fn single_answer_needs_no_backend() {
        let backend = ScriptedBackend::echo();
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 1);

        let answer = reduce_stage(vec!["only [a.pdf]".into()], "q", 10, &mut runner)
            .await
            .unwrap();
        assert_eq!(answer, "only [a.pdf]");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn small_answers_go_straight_to_final_prompt() {
        let backend = ScriptedBackend::fixed("merged [a.pdf] [b.pdf]");
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 3);

        let answer = reduce_stage(
            vec!["x [a.pdf]".into(), "y [b.pdf]".into()],
            "q",
            100,
            &mut runner,
        )
        .await
        .unwrap();

        assert_eq!(answer, "merged [a.pdf] [b.pdf]");
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("<combined_content>\nx [a.pdf]\ny [b.pdf]\n</combined_content>"));
    }

    #[tokio::test]
    async fn over_budget_answers_reduce_in_levels() {
        let backend = ScriptedBackend::fixed("short [cited.pdf]");
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 5);
        let answers: Vec<String> = (0..4).map(|i| words(6, &format!("w{i}"))).collect();

        let answer = reduce_stage(answers, "q", 12, &mut runner).await.unwrap();

        assert_eq!(answer, "short [cited.pdf]");
        let prompts = backend.prompts();
        // Two intermediate batches of two answers, then one final prompt.
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("<partial_content>"));
        assert!(prompts[1].contains("<partial_content>"));
        assert!(prompts[2].contains("<combined_content>"));
        assert_eq!(runner.counter().completed(), 3);
        assert!(runner.counter().expected() >= 3);
    }

    /// Text inside the last `open` ... `close` pair of `prompt`.
    fn payload<'a>(prompt: &'a str, open: &str, close: &str) -> &'a str {
        let start = prompt.rfind(open).unwrap() + open.len();
        let end = prompt.rfind(close).unwrap();
        prompt[start..end].trim()
    }

    #[tokio::test]
    async fn batches_sent_to_backend_stay_within_budget() {
        let backend = ScriptedBackend::fixed("short [x.pdf]");
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 4);
        let answers: Vec<String> = (0..3).map(|i| words(6, &format!("w{i}"))).collect();

        let answer = reduce_stage(answers.clone(), "q", 10, &mut runner)
            .await
            .unwrap();
        assert_eq!(answer, "short [x.pdf]");

        let prompts = backend.prompts();
        // Three singleton intermediates, then one final prompt.
        assert_eq!(prompts.len(), 4);
        for prompt in &prompts[..3] {
            let body = payload(prompt, "<partial_content>", "</partial_content>");
            assert!(
                approx_token_count(body) <= 10 || answers.iter().any(|a| a == body),
                "over-budget batch sent: {body:?}"
            );
        }
        let body = payload(&prompts[3], "<combined_content>", "</combined_content>");
        assert!(approx_token_count(body) <= 10);
    }

    #[tokio::test]
    async fn oversized_singletons_reduce_one_by_one() {
        let backend = ScriptedBackend::fixed("short [big.pdf]");
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 0);
        let answers: Vec<String> = (0..5).map(|_| words(50, "big")).collect();

        let answer = reduce_stage(answers, "q", 10, &mut runner).await.unwrap();

        assert_eq!(answer, "short [big.pdf]");
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 5 + 1);
        for prompt in &prompts[..5] {
            let body = payload(prompt, "<partial_content>", "</partial_content>");
            assert_eq!(body, words(50, "big"));
        }
    }

    #[tokio::test]
    async fn answers_that_never_shrink_hit_the_level_cap() {
        let backend = ScriptedBackend::fixed(&words(50, "big"));
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 0);
        let answers: Vec<String> = (0..2).map(|_| words(50, "big")).collect();

        let err = reduce_stage(answers, "q", 10, &mut runner)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DigestError::ReductionDidNotConverge {
                levels: MAX_REDUCTION_LEVELS,
                remaining: 2
            }
        ));
        assert_eq!(backend.calls(), 2 * MAX_REDUCTION_LEVELS);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let backend = ScriptedBackend::echo();
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 0);
        let err = reduce_stage(Vec::new(), "q", 10, &mut runner)
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::Validation { .. }));
    }

    #[tokio::test]
    async fn empty_backend_answer_is_fatal() {
        let backend = ScriptedBackend::replies([""]);
        let mut runner = QueryRunner::new(&backend, &SilentProgress, 1);
        let err = reduce_stage(vec!["a".into(), "b".into()], "q", 100, &mut runner)
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::EmptyResponse { .. }));
    }
}
