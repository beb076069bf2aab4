//! Core domain types shared by the crawler, splitter, and map/reduce stages.

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// Plain text extracted from one file of the corpus.
///
/// Immutable once produced by the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    text: String,
    name: String,
    path: PathBuf,
}

impl SourceDocument {
    /// Build a document; the display name is the path's file name.
    pub fn new(text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            text: text.into(),
            name,
            path,
        }
    }

    /// Extracted text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Display name used in prompts and citations.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Originating file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// A contiguous slice of a [`SourceDocument`]'s text with position metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The slice itself.
    pub text: String,
    /// Name of the owning document.
    pub document_name: String,
    /// Path of the owning document.
    pub source_path: PathBuf,
    /// Position of the owning document in crawl order (0-based).
    pub document_index: usize,
    /// Byte offset of the slice start in the owning document's text.
    pub start: usize,
    /// Byte offset one past the slice end.
    pub end: usize,
    /// 1-based index within the owning document.
    pub local_index: usize,
    /// Number of segments in the owning document.
    pub local_total: usize,
    /// 1-based index across the whole corpus.
    pub global_index: usize,
    /// Number of segments across the whole corpus.
    pub global_total: usize,
}

impl Segment {
    /// A document reduced to a single segment is complete and eligible for batching.
    pub fn is_complete_document(&self) -> bool {
        self.local_total == 1
    }

    /// Length of the slice in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_is_file_name() {
        let doc = SourceDocument::new("hello", "/corpus/reports/q1.pdf");
        assert_eq!(doc.name(), "q1.pdf");
        assert_eq!(doc.path(), Path::new("/corpus/reports/q1.pdf"));
        assert_eq!(doc.text(), "hello");
    }

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let doc = SourceDocument::new("héllo wörld", "a.txt");
        assert_eq!(doc.char_len(), 11);
        assert!(doc.text().len() > 11);
    }
}
