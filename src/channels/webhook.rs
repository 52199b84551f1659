//! Inbound webhook: Mailgun-style multipart form endpoint plus health and
//! info routes.
//!
//! The handler saves attachments to temp files, answers `accepted`
//! immediately, and hands the message to the [`ReplyDispatcher`] on a spawned
//! task. Field names are matched loosely (`body-plain` / `body_plain` /
//! `stripped-text`, ...) since providers and hand-made test requests differ.

use std::sync::LazyLock;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use regex::Regex;
use tempfile::TempPath;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::channels::reply::{InboundRequest, ReplyDispatcher};
use crate::error::WebhookError;
use crate::pipeline::types::{AttachmentCandidate, compose_instruction};

/// Path of the inbound webhook.
pub const INBOUND_PATH: &str = "/webhooks/mailgun/inbound";

const DEFAULT_SENDER: &str = "unknown@example.com";
const SENDER_KEYS: &[&str] = &["sender", "from"];
const SUBJECT_KEYS: &[&str] = &["subject"];
const BODY_PLAIN_KEYS: &[&str] = &["body-plain", "body_plain", "stripped-text"];
const BODY_HTML_KEYS: &[&str] = &["body-html", "body_html", "stripped-html"];
const ATTACHMENT_COUNT_KEYS: &[&str] = &["attachment-count", "attachment_count"];
const ATTACHMENT_PREFIX: &str = "attachment-";

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("extension pattern is valid"));

// ── Router ──────────────────────────────────────────────────────────

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: ReplyDispatcher,
}

/// Build the Axum router with the webhook, health, and info routes.
pub fn webhook_routes(dispatcher: ReplyDispatcher, max_upload_bytes: usize) -> Router {
    let state = AppState { dispatcher };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(INBOUND_PATH, post(inbound))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "mail-summarizer",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "inbound": INBOUND_PATH,
    }))
}

// ── Inbound handler ─────────────────────────────────────────────────

async fn inbound(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, WebhookError> {
    let form = InboundForm::from_multipart(multipart).await?;
    info!(keys = ?form.keys(), "Inbound form received");

    let sender = form.sender().to_string();
    let subject = form.subject().to_string();
    let content = form.body_plain().or(form.body_html()).unwrap_or_default();

    let files = form.attachment_files();
    for (idx, file) in files.iter().enumerate() {
        info!(
            index = idx + 1,
            filename = ?file.filename,
            content_type = ?file.content_type,
            "Attachment detected"
        );
    }
    info!(
        from = %sender,
        subject = %subject,
        attachments_detected = files.len(),
        "Inbound email"
    );

    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        saved.push(save_attachment(file).await?);
    }

    let request = InboundRequest {
        sender,
        subject,
        instruction: compose_instruction(form.subject(), content),
        candidates: saved.iter().map(|s| s.candidate.clone()).collect(),
        received_at: Utc::now(),
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("inbound", %request_id, sender = %request.sender);
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(
        async move {
            dispatcher.process_and_reply(request).await;
            // Temp files live until the reply has gone out.
            drop(saved);
        }
        .instrument(span),
    );

    Ok(Json(serde_json::json!({
        "status": "accepted",
        "request_id": request_id,
    })))
}

// ── Form parsing ────────────────────────────────────────────────────

/// A file part of the inbound form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// The inbound multipart form, split into text and file fields, each kept in
/// submission order.
#[derive(Debug, Clone, Default)]
pub struct InboundForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
    /// Every part name, text and file interleaved as submitted.
    order: Vec<String>,
}

impl InboundForm {
    /// Read every part. A part with a filename is a file; anything else is text.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, WebhookError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| WebhookError::InvalidForm(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            form.order.push(name.clone());
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| WebhookError::InvalidForm(e.to_string()))?;
                    form.files.push(UploadedFile {
                        field: name,
                        filename: Some(filename).filter(|f| !f.is_empty()),
                        content_type,
                        data: data.to_vec(),
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| WebhookError::InvalidForm(e.to_string()))?;
                    form.fields.push((name, value));
                }
            }
        }
        Ok(form)
    }

    /// All part names in submission order.
    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value among `keys`.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }

    pub fn sender(&self) -> &str {
        self.first_of(SENDER_KEYS).unwrap_or(DEFAULT_SENDER)
    }

    pub fn subject(&self) -> &str {
        self.first_of(SUBJECT_KEYS).unwrap_or_default()
    }

    pub fn body_plain(&self) -> Option<&str> {
        self.first_of(BODY_PLAIN_KEYS)
    }

    pub fn body_html(&self) -> Option<&str> {
        self.first_of(BODY_HTML_KEYS)
    }

    /// Declared attachment count; 0 when missing or unparsable.
    pub fn attachment_count(&self) -> usize {
        self.first_of(ATTACHMENT_COUNT_KEYS)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0)
    }

    fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == key)
    }

    /// Attachment files: `attachment-1..=N` when a count is declared, else
    /// every file whose field starts with `attachment-`.
    pub fn attachment_files(&self) -> Vec<&UploadedFile> {
        let declared: Vec<&UploadedFile> = (1..=self.attachment_count())
            .filter_map(|i| self.file(&format!("{ATTACHMENT_PREFIX}{i}")))
            .collect();
        if !declared.is_empty() {
            return declared;
        }
        self.files
            .iter()
            .filter(|f| f.field.starts_with(ATTACHMENT_PREFIX))
            .collect()
    }
}

// ── Saving attachments ──────────────────────────────────────────────

/// An attachment written to a temp file. The file is removed on drop.
pub struct SavedAttachment {
    pub candidate: AttachmentCandidate,
    _file: TempPath,
}

/// Suffix for the saved file: `pdf` for PDF content types, otherwise the
/// filename's extension, otherwise `bin`.
pub fn saved_suffix(content_type: Option<&str>, filename: Option<&str>) -> String {
    if content_type.is_some_and(|c| c.to_lowercase().contains("pdf")) {
        return "pdf".to_string();
    }
    filename
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| EXTENSION.is_match(ext))
        .unwrap_or_else(|| "bin".to_string())
}

async fn save_attachment(file: &UploadedFile) -> Result<SavedAttachment, WebhookError> {
    let display_name = file.filename.clone().unwrap_or_else(|| file.field.clone());
    let io_err = |e: std::io::Error| WebhookError::Attachment {
        name: display_name.clone(),
        reason: e.to_string(),
    };

    let suffix = format!(
        ".{}",
        saved_suffix(file.content_type.as_deref(), file.filename.as_deref())
    );
    let path = tempfile::Builder::new()
        .prefix("inbound-")
        .suffix(&suffix)
        .tempfile()
        .map_err(io_err)?
        .into_temp_path();
    tokio::fs::write(&path, &file.data).await.map_err(io_err)?;

    info!(
        path = %path.display(),
        original = ?file.filename,
        bytes = file.data.len(),
        content_type = ?file.content_type,
        "Saved attachment"
    );

    Ok(SavedAttachment {
        candidate: AttachmentCandidate::new(path.to_path_buf(), file.filename.clone()),
        _file: path,
    })
}
