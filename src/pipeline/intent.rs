//! Intent detection and attachment selection.
//!
//! Both are plain keyword/suffix checks; no LLM is involved in deciding what
//! to do with a message.

use tracing::debug;

use crate::pipeline::types::AttachmentCandidate;

/// Substrings that signal a summary request (French and English).
pub const SUMMARY_KEYWORDS: &[&str] = &[
    "résume",
    "resume",
    "résumé",
    "summary",
    "summarize",
    "summarise",
    "synthèse",
    "synthétise",
];

/// Does the instruction ask for a summary of anything?
pub fn has_summary_intent(instruction: &str) -> bool {
    let lower = instruction.to_lowercase();
    SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Does the user want a PDF summarized?
///
/// Requires a summary keyword, plus either a mention of "pdf" or at least one
/// PDF-looking attachment.
pub fn wants_pdf_summary(instruction: &str, candidates: &[AttachmentCandidate]) -> bool {
    if !has_summary_intent(instruction) {
        return false;
    }
    let mentions_pdf = instruction.to_lowercase().contains("pdf");
    let has_pdf = candidates.iter().any(AttachmentCandidate::is_pdf);
    debug!(mentions_pdf, has_pdf, "Summary intent detected");
    mentions_pdf || has_pdf
}

/// Pick the attachment to summarize.
///
/// First PDF candidate wins. If there is none but exactly one attachment was
/// sent, that one is used whatever its type.
pub fn select_pdf(candidates: &[AttachmentCandidate]) -> Option<&AttachmentCandidate> {
    if let Some(pdf) = candidates.iter().find(|c| c.is_pdf()) {
        return Some(pdf);
    }
    match candidates {
        [only] => {
            debug!(path = %only.path.display(), "No PDF attachment, falling back to the only one");
            Some(only)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(path: &str) -> AttachmentCandidate {
        AttachmentCandidate::new(path, Some("doc.pdf".into()))
    }

    fn bin(path: &str) -> AttachmentCandidate {
        AttachmentCandidate::new(path, None)
    }

    #[test]
    fn summary_intent_is_case_insensitive() {
        assert!(has_summary_intent("RÉSUME ce document"));
        assert!(has_summary_intent("Can you give me a Summary?"));
        assert!(has_summary_intent("Please summarize this"));
        assert!(has_summary_intent("une synthèse svp"));
        assert!(!has_summary_intent("Bonjour, voici la facture"));
    }

    #[test]
    fn no_keyword_means_no_pdf_summary_even_with_pdf() {
        assert!(!wants_pdf_summary("Voici le PDF", &[pdf("/tmp/a.pdf")]));
    }

    #[test]
    fn keyword_without_pdf_signal_is_rejected() {
        assert!(!wants_pdf_summary("résumé de la réunion", &[]));
        assert!(!wants_pdf_summary("résumé de la réunion", &[bin("/tmp/a.docx")]));
    }

    #[test]
    fn keyword_with_pdf_mention() {
        assert!(wants_pdf_summary("Résume ce PDF", &[]));
    }

    #[test]
    fn keyword_with_pdf_attachment() {
        assert!(wants_pdf_summary("résumé", &[bin("/tmp/x.txt"), pdf("/tmp/y.bin")]));
    }

    #[test]
    fn select_first_pdf_in_order() {
        let candidates = vec![bin("/tmp/a.txt"), pdf("/tmp/b.bin"), pdf("/tmp/c.bin")];
        assert_eq!(select_pdf(&candidates).unwrap().path, candidates[1].path);
    }

    #[test]
    fn select_falls_back_to_single_candidate() {
        let candidates = vec![bin("/tmp/a.bin")];
        assert_eq!(select_pdf(&candidates), Some(&candidates[0]));
    }

    #[test]
    fn select_none_with_several_non_pdf() {
        let candidates = vec![bin("/tmp/a.bin"), bin("/tmp/b.png")];
        assert!(select_pdf(&candidates).is_none());
        assert!(select_pdf(&[]).is_none());
    }
}
