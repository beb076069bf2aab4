//! Sequential, filter-aware corpus crawler.
//!
//! The crawler walks a directory tree, keeps files whose full path matches at
//! least one pattern, and hands each one to a [`TextExtractor`]. Per-file
//! failures are logged and skipped; they never abort the crawl.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use docdigest_extract::TextExtractor;
use docdigest_shared::{DigestError, Result, SourceDocument};

// ---------------------------------------------------------------------------
// CrawlReport
// ---------------------------------------------------------------------------

/// Summary of a completed crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Files visited by the walk.
    pub files_seen: usize,
    /// Files whose path matched the filter.
    pub files_matched: usize,
    /// Files that produced a document.
    pub documents: usize,
    /// Matched files whose extracted text was empty.
    pub empty: usize,
    /// Per-file failures (path, error message).
    pub errors: Vec<(PathBuf, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

/// Progress callback for crawl operations.
pub trait CrawlProgress: Send + Sync {
    /// Called right before a matched file is sent to the extractor.
    fn file_ingesting(&self, path: &Path, matched_so_far: usize);
}

/// No-op crawl progress.
pub struct SilentCrawlProgress;

impl CrawlProgress for SilentCrawlProgress {
    fn file_ingesting(&self, _path: &Path, _matched_so_far: usize) {}
}

// ---------------------------------------------------------------------------
// Path filter
// ---------------------------------------------------------------------------

/// A set of regular expressions combined with logical OR.
///
/// A path qualifies if any pattern matches anywhere in its full string form.
/// An empty set matches everything.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<Regex>,
}

impl PathFilter {
    /// Compile each pattern; any invalid regex is a config error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref().trim();
                Regex::new(p)
                    .map_err(|e| DigestError::config(format!("invalid path pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Parse a comma-separated pattern list such as `.*\.pdf$,.*\.docx$`.
    pub fn from_comma_list(list: &str) -> Result<Self> {
        let parts: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        Self::new(&parts)
    }

    /// Whether `path` qualifies.
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let s = path.to_string_lossy();
        self.patterns.iter().any(|p| p.is_match(&s))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Directory crawler producing [`SourceDocument`]s in walk order.
pub struct Crawler<'a> {
    extractor: &'a dyn TextExtractor,
    filter: PathFilter,
}

impl<'a> Crawler<'a> {
    /// Create a crawler that extracts matching files with `extractor`.
    pub fn new(extractor: &'a dyn TextExtractor, filter: PathFilter) -> Self {
        Self { extractor, filter }
    }

    /// Walk `root` and extract every matching file.
    ///
    /// Entries are visited in file-name order within each directory, one at a
    /// time. Only an unreadable root is an error.
    #[instrument(skip_all, fields(root = %root.display(), patterns = self.filter.len()))]
    pub async fn crawl(
        &self,
        root: &Path,
        progress: &dyn CrawlProgress,
    ) -> Result<(CrawlReport, Vec<SourceDocument>)> {
        let start_time = Instant::now();

        if !root.is_dir() {
            return Err(DigestError::validation(format!(
                "input directory '{}' does not exist or is not a directory",
                root.display()
            )));
        }

        let mut report = CrawlReport::default();
        let mut documents = Vec::new();

        info!("starting crawl");

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry, skipping");
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    report.errors.push((path, e.to_string()));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            report.files_seen += 1;

            let path = entry.path();
            if !self.filter.matches(path) {
                debug!(path = %path.display(), "path filtered out");
                continue;
            }
            report.files_matched += 1;

            progress.file_ingesting(path, report.files_matched);
            debug!(path = %path.display(), "processing");

            match self.extractor.extract(path).await {
                Ok(text) if text.is_empty() => {
                    warn!(path = %path.display(), "extraction produced no text, skipping");
                    report.empty += 1;
                }
                Ok(text) => {
                    let doc = SourceDocument::new(text, path);
                    debug!(file = doc.name(), chars = doc.char_len(), "extracted");
                    documents.push(doc);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "error processing file, skipping");
                    report.errors.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        report.documents = documents.len();
        report.duration = start_time.elapsed();

        info!(
            files_seen = report.files_seen,
            files_matched = report.files_matched,
            documents = report.documents,
            empty = report.empty,
            errors = report.errors.len(),
            duration_ms = report.duration.as_millis(),
            "crawl completed"
        );

        Ok((report, documents))
    }
}
