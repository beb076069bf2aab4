//! XHTML → plain text flattening for Tika responses.

use scraper::Html;

/// Flatten an (X)HTML document to text.
///
/// Every text node becomes its own line, so paragraph and cell boundaries
/// survive as line breaks for the splitter. Leading/trailing whitespace of the
/// whole result is trimmed; inner whitespace is left untouched.
pub fn xhtml_to_text(markup: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }

    let doc = Html::parse_document(markup);
    let joined = doc.root_element().text().collect::<Vec<_>>().join("\n");
    joined.trim().to_string()
}
