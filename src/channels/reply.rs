//! Reply dispatcher: runs the router for one inbound message and emails the
//! result back to the sender.
//!
//! Every message gets exactly one reply attempt. If routing panics or the
//! reply cannot be delivered, a generic failure notice is sent instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::channels::transport::{MailTransport, OutgoingEmail};
use crate::error::Error;
use crate::pipeline::router::InstructionRouter;
use crate::pipeline::types::{AttachmentCandidate, RouteOutcome};

/// Subject used when the inbound message had none.
pub const DEFAULT_REPLY_SUBJECT: &str = "Re: Votre demande IA";

/// Body of the notice sent when processing fails unexpectedly.
pub const FAILURE_BODY: &str = "❗ Une erreur est survenue lors du traitement de votre demande.\n\
Merci de réessayer avec un fichier plus léger ou une instruction plus simple.";

/// Prefix the subject with `Re: ` unless it already is a reply.
pub fn build_reply_subject(original: &str) -> String {
    if original.to_lowercase().starts_with("re:") {
        original.to_string()
    } else if original.is_empty() {
        DEFAULT_REPLY_SUBJECT.to_string()
    } else {
        format!("Re: {original}")
    }
}

/// Replies go back to whoever sent the message.
pub fn infer_recipient(sender: &str) -> String {
    sender.to_string()
}

/// Wrap the router's summary in the reply body.
pub fn format_reply_body(summary: &str) -> String {
    format!(
        "✅ Voici le résultat de votre demande.\n\n\
         Résumé:\n{summary}\n\n\
         Fichiers générés en pièce jointe si applicable."
    )
}

/// One inbound message, ready for processing.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub sender: String,
    pub subject: String,
    pub instruction: String,
    pub candidates: Vec<AttachmentCandidate>,
    pub received_at: DateTime<Utc>,
}

/// Routes inbound requests and sends the replies.
#[derive(Clone)]
pub struct ReplyDispatcher {
    router: Arc<InstructionRouter>,
    transport: Arc<dyn MailTransport>,
}

impl ReplyDispatcher {
    pub fn new(router: Arc<InstructionRouter>, transport: Arc<dyn MailTransport>) -> Self {
        Self { router, transport }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Process one request end to end. Never fails; problems are logged and
    /// reported to the sender.
    pub async fn process_and_reply(&self, request: InboundRequest) {
        let to = infer_recipient(&request.sender);
        let subject = build_reply_subject(&request.subject);
        let received_at = request.received_at;

        info!("Processing instruction");
        match self.route_and_send(&to, &subject, request).await {
            Ok(outcome) => info!(
                outcome = outcome.label(),
                elapsed_ms = (Utc::now() - received_at).num_milliseconds(),
                "Reply sent"
            ),
            Err(e) => {
                error!(error = %e, "Processing failed, sending failure notice");
                let notice = OutgoingEmail {
                    to,
                    subject,
                    text: FAILURE_BODY.to_string(),
                    attachments: Vec::new(),
                };
                if let Err(e) = self.transport.send(&notice).await {
                    error!(error = %e, "Failed to send failure notice");
                }
            }
        }
    }

    async fn route_and_send(
        &self,
        to: &str,
        subject: &str,
        request: InboundRequest,
    ) -> Result<RouteOutcome, Error> {
        let router = Arc::clone(&self.router);
        let InboundRequest {
            instruction,
            candidates,
            ..
        } = request;

        // Own task so a panic inside routing is caught here as a JoinError.
        let result = tokio::spawn(async move { router.route(&instruction, &candidates).await })
            .await
            .map_err(|e| Error::Task(e.to_string()))?;

        let reply = OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: format_reply_body(&result.summary),
            attachments: result.attachments,
        };
        self.transport.send(&reply).await?;
        Ok(result.outcome)
    }
}
