//! PDF text extraction.
//!
//! Pages are read one at a time so a single undecodable page only loses its
//! own text. Output is capped at [`MAX_CHARS`] before it goes anywhere near
//! the summarizer.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::ExtractionError;

/// Maximum characters of extracted text kept for summarization.
pub const MAX_CHARS: usize = 12_000;
/// Appended when extracted text is cut at [`MAX_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n\n[...texte tronqué...]";

/// Turns a file on disk into plain text.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Page-level access to an opened document.
pub trait PageSource {
    /// Page numbers in document order.
    fn page_numbers(&self) -> Vec<u32>;

    /// Text of one page. Errors are per page and do not poison the document.
    fn page_text(&self, page: u32) -> Result<String, ExtractionError>;
}

/// Concatenate the text of every readable page.
///
/// Each page is trimmed; empty and failed pages are left out; the rest are
/// joined with a blank line and the result is capped at [`MAX_CHARS`].
pub fn collect_pages(source: &dyn PageSource) -> String {
    let mut chunks = Vec::new();
    for page in source.page_numbers() {
        match source.page_text(page) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    chunks.push(text.to_string());
                }
            }
            Err(e) => {
                debug!(page, error = %e, "Skipping unreadable page");
            }
        }
    }
    let text = chunks.join("\n\n").trim().to_string();
    truncate_chars(text, MAX_CHARS, TRUNCATION_MARKER)
}

/// Keep the first `max` characters of `text`, appending `marker` if anything
/// was cut.
pub(crate) fn truncate_chars(text: String, max: usize, marker: &str) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut kept = text[..cut].to_string();
            kept.push_str(marker);
            kept
        }
        None => text,
    }
}

/// [`PageSource`] over a lopdf document.
struct LopdfPages {
    document: Document,
}

impl PageSource for LopdfPages {
    fn page_numbers(&self) -> Vec<u32> {
        // BTreeMap keys, already ascending.
        self.document.get_pages().keys().copied().collect()
    }

    fn page_text(&self, page: u32) -> Result<String, ExtractionError> {
        self.document
            .extract_text(&[page])
            .map_err(|e| ExtractionError::Page {
                page,
                reason: e.to_string(),
            })
    }
}

/// lopdf-backed [`TextExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let document = Document::load(path).map_err(|e| ExtractionError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let pages = LopdfPages { document };
        let text = collect_pages(&pages);
        debug!(
            path = %path.display(),
            pages = pages.page_numbers().len(),
            chars = text.chars().count(),
            "Extracted PDF text"
        );
        Ok(text)
    }
}
