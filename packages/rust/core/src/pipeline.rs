//! End-to-end digest pipeline: directory → crawl → split → map → reduce.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, instrument};

use docdigest_crawler::{CrawlProgress, CrawlReport, Crawler, PathFilter};
use docdigest_extract::TextExtractor;
use docdigest_llm::ChatBackend;
use docdigest_shared::{DigestError, Result, SplitConfig};
use docdigest_splitter::ChunkSplitter;

use crate::map::{initial_query_estimate, map_stage, plan_work_units};
use crate::progress::{ProgressReporter, QueryCounter, QueryRunner};
use crate::reduce::reduce_stage;

/// Question asked when neither a query nor a query file is given.
pub const DEFAULT_QUESTION: &str = "Summarize the input context.";

/// Configuration for one digest run.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Root directory to crawl.
    pub input_dir: PathBuf,
    /// Path regexes, combined with OR. Empty matches every file.
    pub patterns: Vec<String>,
    /// Question asked of every unit of work and of the reducer.
    pub question: String,
    /// Segment size and overlap, in characters.
    pub split: SplitConfig,
    /// Reduce budget in approximate tokens.
    pub budget: usize,
}

/// Result of a digest run.
#[derive(Debug)]
pub struct DigestResult {
    /// The consolidated answer.
    pub answer: String,
    /// Number of documents extracted.
    pub documents: usize,
    /// Number of segments produced.
    pub segments: usize,
    /// Final query accounting.
    pub queries: QueryCounter,
    /// Crawl statistics, including skipped files.
    pub crawl: CrawlReport,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Where the answer was written, if anywhere.
    pub saved_to: Option<PathBuf>,
}

/// Forwards crawler callbacks to the run's [`ProgressReporter`].
struct CrawlBridge<'a>(&'a dyn ProgressReporter);

impl CrawlProgress for CrawlBridge<'_> {
    fn file_ingesting(&self, path: &Path, matched_so_far: usize) {
        self.0.file_ingesting(path, matched_so_far);
    }
}

/// Run the full pipeline.
///
/// 1. Crawl: extract every matching file (failures are skipped)
/// 2. Split: cut documents into numbered segments
/// 3. Map: one answer per unit of work
/// 4. Reduce: consolidate answers within the budget
///
/// Any backend failure, including an empty answer, aborts the run.
#[instrument(skip_all, fields(input = %config.input_dir.display(), budget = config.budget))]
pub async fn run_digest(
    config: &DigestConfig,
    extractor: &dyn TextExtractor,
    backend: &dyn ChatBackend,
    progress: &dyn ProgressReporter,
) -> Result<DigestResult> {
    let start = Instant::now();

    let splitter = ChunkSplitter::new(config.split)?;
    if config.budget == 0 {
        return Err(DigestError::validation("reduce budget must be greater than 0"));
    }
    let filter = PathFilter::new(&config.patterns)?;

    // --- Phase 1: Crawl ---
    progress.phase("Extracting documents");
    let crawler = Crawler::new(extractor, filter);
    let (crawl, documents) = crawler
        .crawl(&config.input_dir, &CrawlBridge(progress))
        .await?;

    if documents.is_empty() {
        return Err(DigestError::validation(format!(
            "no documents extracted from '{}' ({} files matched, {} failed)",
            config.input_dir.display(),
            crawl.files_matched,
            crawl.errors.len()
        )));
    }

    // --- Phase 2: Split ---
    progress.phase("Splitting documents");
    let segments = splitter.split_documents(&documents);
    for (index, doc) in documents.iter().enumerate() {
        let chunks = segments
            .iter()
            .filter(|s| s.document_index == index)
            .count();
        progress.document_split(doc.name(), chunks);
    }

    // --- Phase 3: Map ---
    let units = plan_work_units(&segments, config.split.chunk_size);
    info!(
        documents = documents.len(),
        segments = segments.len(),
        units = units.len(),
        "work planned"
    );

    let mut runner = QueryRunner::new(backend, progress, initial_query_estimate(units.len()));
    progress.phase("Querying units of work");
    let answers = map_stage(&units, &config.question, &mut runner).await?;

    // --- Phase 4: Reduce ---
    progress.phase("Consolidating answers");
    let answer = reduce_stage(answers, &config.question, config.budget, &mut runner).await?;

    let result = DigestResult {
        answer,
        documents: documents.len(),
        segments: segments.len(),
        queries: runner.counter(),
        crawl,
        elapsed: start.elapsed(),
        saved_to: None,
    };

    info!(
        documents = result.documents,
        segments = result.segments,
        queries = result.queries.completed(),
        elapsed_ms = result.elapsed.as_millis(),
        "digest complete"
    );

    Ok(result)
}

/// Pick the question for a run: a query file wins over an inline query.
pub fn resolve_question(query: Option<&str>, query_file: Option<&Path>) -> Result<String> {
    if let Some(path) = query_file {
        let text = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;
        return Ok(text.trim().to_string());
    }
    Ok(query.unwrap_or(DEFAULT_QUESTION).to_string())
}

/// Run the pipeline, then write the answer to `output` if one is given.
///
/// Nothing is written when the run fails. A failed write is logged and leaves
/// `saved_to` empty; the answer is still returned.
pub async fn run_and_persist(
    config: &DigestConfig,
    output: Option<&Path>,
    extractor: &dyn TextExtractor,
    backend: &dyn ChatBackend,
    progress: &dyn ProgressReporter,
) -> Result<DigestResult> {
    let mut result = run_digest(config, extractor, backend, progress).await?;

    if let Some(path) = output {
        match persist_answer(path, &result.answer) {
            Ok(()) => result.saved_to = Some(path.to_path_buf()),
            Err(e) => error!(path = %path.display(), error = %e, "failed to write output file"),
        }
    }
    Ok(result)
}

/// Write the final answer to `path`.
pub fn persist_answer(path: &Path, answer: &str) -> Result<()> {
    std::fs::write(path, answer).map_err(|e| DigestError::io(path, e))?;
    info!(path = %path.display(), bytes = answer.len(), "answer written");
    Ok(())
}
