use std::sync::Arc;

use anyhow::Context;

use mail_summarizer::channels::webhook::INBOUND_PATH;
use mail_summarizer::channels::{ReplyDispatcher, create_transport, webhook_routes};
use mail_summarizer::config::AppConfig;
use mail_summarizer::llm::create_provider;
use mail_summarizer::pipeline::{InstructionRouter, PdfTextExtractor, Summarizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // ── Summarizer ──────────────────────────────────────────────────────
    let llm = match &config.llm {
        Some(llm_config) => Some(create_provider(llm_config)?),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, summaries will use the local heuristic");
            None
        }
    };
    let summarizer = Summarizer::new(llm);

    // ── Pipeline + mail ─────────────────────────────────────────────────
    let router = Arc::new(InstructionRouter::new(
        Arc::new(PdfTextExtractor),
        summarizer,
    ));
    let transport = create_transport(&config.mail)?;
    let dispatcher = ReplyDispatcher::new(Arc::clone(&router), transport);

    eprintln!("📬 Mail Summarizer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Summarizer: {}", router.summarizer().mode());
    eprintln!("   Transport: {}", dispatcher.transport_name());
    eprintln!("   From: {}", config.mail.from_address);
    eprintln!(
        "   Webhook: http://{}{}\n",
        config.server.bind_addr, INBOUND_PATH
    );

    let app = webhook_routes(dispatcher, config.server.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
