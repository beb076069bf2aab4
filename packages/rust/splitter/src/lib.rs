//! Recursive, boundary-preferring chunk splitter.
//!
//! Text is cut at the largest structural boundary that keeps pieces within
//! `chunk_size` characters: paragraph breaks first, then line breaks, then
//! spaces, and finally single characters. Neighbouring pieces are packed back
//! together into segments, and each new segment re-uses up to
//! `chunk_overlap` characters of trailing pieces from the previous one.
//!
//! Separators stay attached to the piece they end, so every segment is an
//! exact slice of the source and [`reassemble`] can undo the split.

use std::collections::VecDeque;
use std::ops::Range;

use tracing::{debug, instrument};

use docdigest_shared::{Result, Segment, SourceDocument, SplitConfig};

/// Separators tried in priority order. The empty string means "every character".
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits documents into overlapping, size-bounded segments.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl ChunkSplitter {
    /// Create a splitter with the default separator ladder.
    pub fn new(config: SplitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator ladder.
    ///
    /// Without a trailing `""`, a piece longer than `chunk_size` that contains
    /// none of the separators is emitted on its own, over the limit.
    pub fn with_separators<S: Into<String>>(
        mut self,
        separators: impl IntoIterator<Item = S>,
    ) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Split `text` into byte ranges, in source order.
    pub fn split_ranges(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, 0..text.len(), &self.separators)
    }

    /// Split every document and number the segments.
    ///
    /// Local indices are assigned per document; global indices and the global
    /// total are assigned once every document has been split.
    #[instrument(skip_all, fields(documents = documents.len(), chunk_size = self.chunk_size))]
    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (document_index, doc) in documents.iter().enumerate() {
            let ranges = self.split_ranges(doc.text());
            let local_total = ranges.len();
            debug!(file = doc.name(), chunks = local_total, "document split");

            for (i, range) in ranges.into_iter().enumerate() {
                segments.push(Segment {
                    text: doc.text()[range.clone()].to_string(),
                    document_name: doc.name().to_string(),
                    source_path: doc.path().to_path_buf(),
                    document_index,
                    start: range.start,
                    end: range.end,
                    local_index: i + 1,
                    local_total,
                    global_index: segments.len() + 1,
                    global_total: 0,
                });
            }
        }

        let global_total = segments.len();
        for segment in &mut segments {
            segment.global_total = global_total;
        }
        debug!(global_total, "all documents split");

        segments
    }

    fn split_recursive(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[String],
    ) -> Vec<Range<usize>> {
        let slice = &text[range.clone()];

        let chosen = separators
            .iter()
            .position(|sep| sep.is_empty() || slice.contains(sep.as_str()));
        let (pieces, finer) = match chosen {
            Some(i) => (pieces_of(text, range, &separators[i]), &separators[i + 1..]),
            None => (vec![range], &separators[separators.len()..]),
        };

        let mut out = Vec::new();
        let mut fitting: Vec<(Range<usize>, usize)> = Vec::new();

        for piece in pieces {
            let len = text[piece.clone()].chars().count();
            if len <= self.chunk_size {
                fitting.push((piece, len));
                continue;
            }

            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_recursive(text, piece, finer));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }
        out
    }

    /// Pack contiguous pieces into segments of at most `chunk_size` characters.
    fn merge(&self, pieces: &[(Range<usize>, usize)]) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut window: VecDeque<&(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = piece.1;
            if total + len > self.chunk_size && !window.is_empty() {
                out.push(window_range(&window));
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= front.1,
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if !window.is_empty() {
            out.push(window_range(&window));
        }
        out
    }
}

fn window_range(window: &VecDeque<&(Range<usize>, usize)>) -> Range<usize> {
    let start = window.front().map_or(0, |p| p.0.start);
    let end = window.back().map_or(start, |p| p.0.end);
    start..end
}

/// Cut `range` after every occurrence of `separator` (or per character when empty).
fn pieces_of(text: &str, range: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let base = range.start;
    let slice = &text[range.clone()];

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (i, _) in slice.match_indices(separator) {
        let end = i + separator.len();
        pieces.push(base + cursor..base + end);
        cursor = end;
    }
    if cursor < slice.len() {
        pieces.push(base + cursor..range.end);
    }
    pieces
}

/// Rebuild a document's text from its segments by dropping each overlap.
///
/// `segments` must belong to one document and be in local-index order.
pub fn reassemble(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut covered = 0;

    for segment in segments {
        if segment.end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(segment.start);
        out.push_str(&segment.text[skip..]);
        covered = segment.end;
    }
    out
}
