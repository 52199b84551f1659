//! Shared types for the instruction pipeline.

use std::path::PathBuf;

// ── Instruction ─────────────────────────────────────────────────────

/// Combine a subject line and message body into the free-text instruction
/// the pipeline routes on.
pub fn compose_instruction(subject: &str, body: &str) -> String {
    format!("{subject}\n\n{body}").trim().to_string()
}

// ── Attachment candidates ───────────────────────────────────────────

/// A saved inbound attachment the router may pick.
///
/// The file behind `path` belongs to the caller for the duration of one
/// request; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    /// Local temporary file holding the attachment bytes.
    pub path: PathBuf,
    /// Filename as sent by the mail provider, if any.
    pub original_name: Option<String>,
}

impl AttachmentCandidate {
    pub fn new(path: impl Into<PathBuf>, original_name: Option<String>) -> Self {
        Self {
            path: path.into(),
            original_name,
        }
    }

    /// True if the original filename or the temp path ends in `.pdf`
    /// (case-insensitive). Nothing else is consulted.
    pub fn is_pdf(&self) -> bool {
        let name_is_pdf = self
            .original_name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().ends_with(".pdf"));
        name_is_pdf
            || self
                .path
                .to_string_lossy()
                .to_lowercase()
                .ends_with(".pdf")
    }
}

// ── Routing result ──────────────────────────────────────────────────

/// A file produced by the pipeline, attached to the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAttachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub mime: String,
}

impl GeneratedAttachment {
    pub fn text(filename: impl Into<String>, content: &str) -> Self {
        Self {
            filename: filename.into(),
            data: content.as_bytes().to_vec(),
            mime: "text/plain".to_string(),
        }
    }
}

/// Terminal state reached by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No recognised intent.
    Stub,
    /// Summary requested but no usable attachment.
    NoAttachment,
    /// Document had no extractable text.
    EmptyText,
    /// Extraction or summarization failed.
    ProcessingError,
    /// Summary produced.
    Success,
}

impl RouteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::NoAttachment => "no_attachment",
            Self::EmptyText => "empty_text",
            Self::ProcessingError => "processing_error",
            Self::Success => "success",
        }
    }
}

/// What the router hands to the reply dispatcher. `summary` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingResult {
    pub outcome: RouteOutcome,
    pub summary: String,
    pub attachments: Vec<GeneratedAttachment>,
}

impl RoutingResult {
    /// A result with no attachments.
    pub fn message(outcome: RouteOutcome, summary: impl Into<String>) -> Self {
        Self {
            outcome,
            summary: summary.into(),
            attachments: Vec::new(),
        }
    }
}
