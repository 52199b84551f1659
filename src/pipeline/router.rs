//! Instruction router: decides what to do with an inbound instruction and
//! turns every outcome into a [`RoutingResult`].
//!
//! Flow (single pass, no retries):
//! 1. [`wants_pdf_summary`]: otherwise the stub reply
//! 2. [`select_pdf`]: otherwise "no attachment"
//! 3. extract text (blocking pool) → summarize
//!
//! Errors from extraction or summarization are logged and folded into the
//! result text; `route` itself cannot fail.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Error, ExtractionError};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::intent::{select_pdf, wants_pdf_summary};
use crate::pipeline::summarizer::Summarizer;
use crate::pipeline::types::{
    AttachmentCandidate, GeneratedAttachment, RouteOutcome, RoutingResult,
};

/// Reply when no known intent is found.
pub const STUB_MESSAGE: &str =
    "Demande reçue. Essayez : « Résume ce PDF » avec un .pdf en pièce jointe.";
/// Reply when a PDF summary was asked for but nothing could be selected.
pub const NO_ATTACHMENT_MESSAGE: &str =
    "Vous avez demandé un résumé PDF mais aucune pièce jointe .pdf n'a été trouvée.";
/// Reply when the document has no text layer.
pub const EMPTY_TEXT_MESSAGE: &str =
    "Le PDF ne contient pas de texte extractible (scanné ou image ?).";
/// Reply accompanying a generated summary.
pub const SUCCESS_MESSAGE: &str = "Résumé généré. Voir la pièce jointe `resume.txt`.";
/// Name of the generated summary attachment.
pub const SUMMARY_FILENAME: &str = "resume.txt";

/// Routes instructions to the PDF summarizer or the stub reply.
#[derive(Clone)]
pub struct InstructionRouter {
    extractor: Arc<dyn TextExtractor>,
    summarizer: Summarizer,
}

impl InstructionRouter {
    pub fn new(extractor: Arc<dyn TextExtractor>, summarizer: Summarizer) -> Self {
        Self {
            extractor,
            summarizer,
        }
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Route one instruction. Always yields a result with a non-empty summary.
    pub async fn route(
        &self,
        instruction: &str,
        candidates: &[AttachmentCandidate],
    ) -> RoutingResult {
        if !wants_pdf_summary(instruction, candidates) {
            return RoutingResult::message(RouteOutcome::Stub, STUB_MESSAGE);
        }

        let Some(pdf) = select_pdf(candidates) else {
            info!(
                attachments = candidates.len(),
                "PDF summary requested without a usable attachment"
            );
            return RoutingResult::message(RouteOutcome::NoAttachment, NO_ATTACHMENT_MESSAGE);
        };

        info!(
            path = %pdf.path.display(),
            original_name = pdf.original_name.as_deref().unwrap_or("-"),
            "Summarizing attachment"
        );

        match self.summarize_attachment(pdf).await {
            Ok(None) => RoutingResult::message(RouteOutcome::EmptyText, EMPTY_TEXT_MESSAGE),
            Ok(Some(summary)) => RoutingResult {
                outcome: RouteOutcome::Success,
                summary: SUCCESS_MESSAGE.to_string(),
                attachments: vec![GeneratedAttachment::text(SUMMARY_FILENAME, &summary)],
            },
            Err(e) => {
                error!(path = %pdf.path.display(), error = %e, "PDF summary failed");
                RoutingResult::message(
                    RouteOutcome::ProcessingError,
                    format!("Erreur lors du résumé du PDF : {e}"),
                )
            }
        }
    }

    /// Extract then summarize. `Ok(None)` means there was no text to summarize.
    async fn summarize_attachment(
        &self,
        pdf: &AttachmentCandidate,
    ) -> Result<Option<String>, Error> {
        let extractor = Arc::clone(&self.extractor);
        let path = pdf.path.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))??;

        if text.is_empty() {
            return Ok(None);
        }

        let summary = self.summarizer.summarize(&text).await?;
        Ok(Some(summary))
    }
}
