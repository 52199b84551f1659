//! Text summarization: LLM when a provider is configured, a local heuristic
//! otherwise.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::extract::truncate_chars;

/// Prefix of every heuristic (non-LLM) summary.
pub const LOCAL_SUMMARY_LABEL: &str = "Résumé (heuristique locale, sans LLM) :\n";
/// Appended when the heuristic summary is cut.
pub const LOCAL_TRUNCATION_MARKER: &str = "\n\n[Résumé local tronqué]";

const LOCAL_MAX_LINES: usize = 8;
const LOCAL_MAX_CHARS: usize = 1_500;
const TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "Tu es un assistant qui produit des résumés clairs, structurés et concis.\n\
Règles:\n\
- 6 à 10 puces maximum\n\
- Mots simples, pas de jargon\n\
- Extrais les chiffres clés s'il y en a\n\
- Conclus par 1 phrase 'À retenir'\n";

/// Produces a summary of extracted document text.
#[derive(Clone)]
pub struct Summarizer {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Summarizer {
    /// Summarizer backed by an LLM provider.
    pub fn with_provider(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm: Some(llm) }
    }

    /// Summarizer that only uses the local heuristic.
    pub fn local() -> Self {
        Self { llm: None }
    }

    /// Use `llm` if present, the heuristic otherwise.
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Human-readable name of the active mode, for startup logs.
    pub fn mode(&self) -> String {
        match &self.llm {
            Some(llm) => format!("llm ({})", llm.model_name()),
            None => "local heuristic".to_string(),
        }
    }

    /// Summarize non-empty text.
    ///
    /// Provider errors are returned as-is; the heuristic only stands in when
    /// no provider is configured. A blank completion is an
    /// [`LlmError::InvalidResponse`].
    pub async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        let Some(llm) = &self.llm else {
            warn!("No LLM provider configured, using local summary");
            return Ok(summarize_locally(text));
        };

        let user_prompt = format!(
            "Voici le texte extrait d'un PDF. Fais un résumé conforme aux règles ci-dessus.\n\n\
             === TEXTE ===\n{text}\n=== FIN ==="
        );
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ])
        .with_temperature(TEMPERATURE);

        let response = llm.complete(request).await?;
        info!(
            model = llm.model_name(),
            response_id = ?response.response_id,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "LLM summary generated"
        );

        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: llm.model_name().to_string(),
                reason: format!(
                    "empty summary (finish reason {:?})",
                    response.finish_reason
                ),
            });
        }
        if response.finish_reason == FinishReason::Length {
            warn!(
                model = llm.model_name(),
                "LLM summary hit the token limit and may be cut short"
            );
        }
        Ok(summary.to_string())
    }
}

/// Naive TL;DR: the first few non-empty lines, capped and labelled.
pub fn summarize_locally(text: &str) -> String {
    let head = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(LOCAL_MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{LOCAL_SUMMARY_LABEL}{}",
        truncate_chars(head, LOCAL_MAX_CHARS, LOCAL_TRUNCATION_MARKER)
    )
}
