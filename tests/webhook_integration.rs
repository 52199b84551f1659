//! Integration tests for the inbound webhook.
//!
//! Each test serves the Axum app on a random port, posts a multipart form
//! with reqwest, and waits for the reply captured by a channel-backed mail
//! transport.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use mail_summarizer::channels::transport::{MailTransport, OutgoingEmail};
use mail_summarizer::channels::webhook::INBOUND_PATH;
use mail_summarizer::channels::{ReplyDispatcher, webhook_routes};
use mail_summarizer::error::{ExtractionError, MailError};
use mail_summarizer::pipeline::router::{
    NO_ATTACHMENT_MESSAGE, STUB_MESSAGE, SUCCESS_MESSAGE, SUMMARY_FILENAME,
};
use mail_summarizer::pipeline::summarizer::LOCAL_SUMMARY_LABEL;
use mail_summarizer::pipeline::{InstructionRouter, Summarizer, TextExtractor};

/// Maximum time any test is allowed to wait for a reply.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards every sent email to the test.
struct ChannelTransport(mpsc::UnboundedSender<OutgoingEmail>);

#[async_trait]
impl MailTransport for ChannelTransport {
    fn name(&self) -> &str {
        "channel"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.0.send(email.clone()).map_err(|e| MailError::SendFailed {
            name: "channel".into(),
            reason: e.to_string(),
        })
    }
}

/// Returns fixed text and records which files it was asked to read, along
/// with their contents at that moment.
#[derive(Default)]
struct RecordingExtractor {
    opened: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl TextExtractor for RecordingExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractionError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.opened.lock().unwrap().push((path.to_path_buf(), bytes));
        Ok("Chiffre clé : 42\n\nConclusion".to_string())
    }
}

struct TestServer {
    base: String,
    replies: mpsc::UnboundedReceiver<OutgoingEmail>,
    extractor: Arc<RecordingExtractor>,
}

async fn start_server() -> TestServer {
    let (tx, replies) = mpsc::unbounded_channel();
    let extractor = Arc::new(RecordingExtractor::default());
    let router = InstructionRouter::new(extractor.clone(), Summarizer::local());
    let dispatcher = ReplyDispatcher::new(Arc::new(router), Arc::new(ChannelTransport(tx)));
    let app = webhook_routes(dispatcher, 1024 * 1024);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        replies,
        extractor,
    }
}

async fn post_form(base: &str, form: Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}{INBOUND_PATH}"))
        .multipart(form)
        .send()
        .await
        .expect("webhook request failed")
}

async fn next_reply(server: &mut TestServer) -> OutgoingEmail {
    timeout(TEST_TIMEOUT, server.replies.recv())
        .await
        .expect("timed out waiting for reply")
        .expect("transport channel closed")
}

fn pdf_part(name: &str) -> Part {
    Part::bytes(b"%PDF-1.4 fake".to_vec())
        .file_name(name.to_string())
        .mime_str("application/pdf")
        .unwrap()
}

#[tokio::test]
async fn pdf_summary_round_trip() {
    let mut server = start_server().await;

    let form = Form::new()
        .text("sender", "alice@example.com")
        .text("subject", "Résume ce PDF")
        .text("body-plain", "Merci !")
        .text("attachment-count", "1")
        .part("attachment-1", pdf_part("rapport.pdf"));

    let response = post_form(&server.base, form).await;
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "accepted");
    assert!(json["request_id"].is_string());

    let reply = next_reply(&mut server).await;
    assert_eq!(reply.to, "alice@example.com");
    assert_eq!(reply.subject, "Re: Résume ce PDF");
    assert!(reply.text.contains(SUCCESS_MESSAGE));
    assert_eq!(reply.attachments.len(), 1);
    assert_eq!(reply.attachments[0].filename, SUMMARY_FILENAME);
    assert_eq!(reply.attachments[0].mime, "text/plain");
    assert_eq!(
        String::from_utf8(reply.attachments[0].data.clone()).unwrap(),
        format!("{LOCAL_SUMMARY_LABEL}Chiffre clé : 42\nConclusion")
    );

    let opened = server.extractor.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].0.to_string_lossy().ends_with(".pdf"));
    assert_eq!(opened[0].1, b"%PDF-1.4 fake");
}

#[tokio::test]
async fn attachments_found_by_scan_when_count_missing() {
    let mut server = start_server().await;

    let form = Form::new()
        .text("from", "bob@example.com")
        .text("subject", "Synthèse")
        .text("body_plain", "résumé du pdf joint")
        .part(
            "attachment-3",
            Part::bytes(b"raw scan".to_vec()).file_name("scan.bin".to_string()),
        );

    post_form(&server.base, form).await;
    let reply = next_reply(&mut server).await;

    // The sole attachment is only reachable through the prefix scan.
    assert_eq!(reply.to, "bob@example.com");
    assert!(reply.text.contains(SUCCESS_MESSAGE));
    let opened = server.extractor.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].0.to_string_lossy().ends_with(".bin"));
    assert_eq!(opened[0].1, b"raw scan");
}

#[tokio::test]
async fn declared_count_with_missing_indices_falls_back_to_scan() {
    let mut server = start_server().await;

    let form = Form::new()
        .text("sender", "dave@example.com")
        .text("subject", "Résume ce PDF")
        .text("attachment-count", "2")
        .part(
            "attachment-5",
            Part::bytes(b"first".to_vec())
                .file_name("a.pdf".to_string())
                .mime_str("application/pdf")
                .unwrap(),
        )
        .part(
            "attachment-6",
            Part::bytes(b"second".to_vec())
                .file_name("b.pdf".to_string())
                .mime_str("application/pdf")
                .unwrap(),
        );

    post_form(&server.base, form).await;
    let reply = next_reply(&mut server).await;

    assert!(reply.text.contains(SUCCESS_MESSAGE));
    let opened = server.extractor.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].1, b"first");
}

#[tokio::test]
async fn pdf_request_without_attachment() {
    let mut server = start_server().await;

    let form = Form::new()
        .text("sender", "carol@example.com")
        .text("subject", "")
        .text("stripped-text", "Peux-tu faire un résumé du pdf ?");

    post_form(&server.base, form).await;
    let reply = next_reply(&mut server).await;

    assert_eq!(reply.subject, "Re: Votre demande IA");
    assert!(reply.text.contains(NO_ATTACHMENT_MESSAGE));
    assert!(reply.attachments.is_empty());
}

#[tokio::test]
async fn plain_message_gets_stub_reply() {
    let mut server = start_server().await;

    let form = Form::new()
        .text("subject", "Re: Bonjour")
        .text("body-html", "<p>Salut</p>");

    post_form(&server.base, form).await;
    let reply = next_reply(&mut server).await;

    assert_eq!(reply.to, "unknown@example.com");
    assert_eq!(reply.subject, "Re: Bonjour");
    assert!(reply.text.contains(STUB_MESSAGE));
}

#[tokio::test]
async fn health_check() {
    let server = start_server().await;
    let json: serde_json::Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "ok");
}
