//! Outbound mail transports.
//!
//! - **Mailgun**: HTTP API via reqwest multipart
//! - **SMTP**: lettre, blocking send on the blocking pool
//! - **Log**: nothing configured, the email is only logged

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::{ConfigError, MailError};
use crate::pipeline::types::GeneratedAttachment;

const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";
const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SMTP_PORT: u16 = 587;

// ── Configuration ───────────────────────────────────────────────────

/// Mailgun HTTP API settings.
#[derive(Debug, Clone)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: SecretString,
    pub api_base: String,
    pub timeout: Duration,
}

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

/// Outbound mail configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_address: String,
    pub mailgun: Option<MailgunConfig>,
    pub smtp: Option<SmtpConfig>,
}

impl MailConfig {
    /// Build config from environment variables.
    ///
    /// Mailgun is enabled when both `MAILGUN_DOMAIN` and `MAILGUN_API_KEY` are
    /// set; SMTP when `EMAIL_SMTP_HOST` is set (and then `EMAIL_USERNAME` is
    /// required).
    pub fn from_env() -> Result<Self, ConfigError> {
        let domain = non_empty_var("MAILGUN_DOMAIN");
        let api_key = non_empty_var("MAILGUN_API_KEY");

        let from_address = non_empty_var("MAIL_FROM")
            .unwrap_or_else(|| default_from_address(domain.as_deref()));

        let mailgun = match (domain, api_key) {
            (Some(domain), Some(api_key)) => Some(MailgunConfig {
                domain,
                api_key: SecretString::from(api_key),
                api_base: non_empty_var("MAILGUN_API_BASE")
                    .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string()),
                timeout: Duration::from_secs(
                    std::env::var("MAIL_TIMEOUT_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_MAIL_TIMEOUT_SECS),
                ),
            }),
            _ => None,
        };

        let smtp = match non_empty_var("EMAIL_SMTP_HOST") {
            Some(host) => {
                let username = non_empty_var("EMAIL_USERNAME")
                    .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_USERNAME".into()))?;
                Some(SmtpConfig {
                    host,
                    port: std::env::var("EMAIL_SMTP_PORT")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_SMTP_PORT),
                    username,
                    password: SecretString::from(
                        std::env::var("EMAIL_PASSWORD").unwrap_or_default(),
                    ),
                })
            }
            None => None,
        };

        Ok(Self {
            from_address,
            mailgun,
            smtp,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `robot@{domain}` when a Mailgun domain is known, else a placeholder.
pub fn default_from_address(mailgun_domain: Option<&str>) -> String {
    match mailgun_domain {
        Some(domain) if !domain.is_empty() => format!("robot@{domain}"),
        _ => "robot@example.com".to_string(),
    }
}

// ── Transport trait ─────────────────────────────────────────────────

/// A reply ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<GeneratedAttachment>,
}

/// Delivers outgoing email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Pick the transport for `config`: Mailgun, then SMTP, then log-only.
pub fn create_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>, MailError> {
    if let Some(mailgun) = &config.mailgun {
        info!(domain = %mailgun.domain, "Using Mailgun transport");
        return Ok(Arc::new(MailgunTransport::new(
            mailgun.clone(),
            config.from_address.clone(),
        )?));
    }
    if let Some(smtp) = &config.smtp {
        info!(host = %smtp.host, port = smtp.port, "Using SMTP transport");
        return Ok(Arc::new(SmtpMailTransport::new(
            smtp.clone(),
            config.from_address.clone(),
        )));
    }
    warn!("No mail transport configured, replies will only be logged");
    Ok(Arc::new(LogTransport))
}

// ── Mailgun ─────────────────────────────────────────────────────────

/// Sends through the Mailgun messages API.
pub struct MailgunTransport {
    client: reqwest::Client,
    config: MailgunConfig,
    from_address: String,
}

impl MailgunTransport {
    pub fn new(config: MailgunConfig, from_address: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Config {
                name: "mailgun".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            config,
            from_address,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.domain
        )
    }
}

#[async_trait]
impl MailTransport for MailgunTransport {
    fn name(&self) -> &str {
        "mailgun"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let mut form = reqwest::multipart::Form::new()
            .text("from", self.from_address.clone())
            .text("to", email.to.clone())
            .text("subject", email.subject.clone())
            .text("text", email.text.clone());

        for att in &email.attachments {
            let part = reqwest::multipart::Part::bytes(att.data.clone())
                .file_name(att.filename.clone())
                .mime_str(&att.mime)
                .map_err(|e| MailError::Build {
                    to: email.to.clone(),
                    reason: format!("Invalid MIME type {}: {e}", att.mime),
                })?;
            form = form.part("attachment", part);
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(self.config.api_key.expose_secret()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MailError::SendFailed {
                name: "mailgun".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::SendFailed {
                name: "mailgun".into(),
                reason: format!("HTTP {status}: {}", body.chars().take(300).collect::<String>()),
            });
        }

        info!(to = %email.to, attachments = email.attachments.len(), "Email sent via Mailgun");
        Ok(())
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Sends through an SMTP relay with lettre.
pub struct SmtpMailTransport {
    config: SmtpConfig,
    from_address: String,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpConfig, from_address: String) -> Self {
        Self {
            config,
            from_address,
        }
    }
}

/// Build a `multipart/mixed` message: text body first, then attachments.
pub fn build_message(from: &str, email: &OutgoingEmail) -> Result<Message, MailError> {
    let build_err = |reason: String| MailError::Build {
        to: email.to.clone(),
        reason,
    };

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(email.text.clone()));
    for att in &email.attachments {
        let content_type = ContentType::parse(&att.mime)
            .map_err(|e| build_err(format!("Invalid MIME type {}: {e}", att.mime)))?;
        multipart = multipart
            .singlepart(Attachment::new(att.filename.clone()).body(att.data.clone(), content_type));
    }

    Message::builder()
        .from(
            from.parse()
                .map_err(|e| build_err(format!("Invalid from address: {e}")))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|e| build_err(format!("Invalid to address: {e}")))?)
        .subject(email.subject.clone())
        .multipart(multipart)
        .map_err(|e| build_err(format!("Failed to build email: {e}")))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(&self.from_address, email)?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| MailError::Config {
                name: "smtp".into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.port)
            .credentials(creds)
            .build();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::SendFailed {
                name: "smtp".into(),
                reason: format!("Send task failed: {e}"),
            })?
            .map_err(|e| MailError::SendFailed {
                name: "smtp".into(),
                reason: format!("SMTP send failed: {e}"),
            })?;

        info!(to = %email.to, "Email sent via SMTP");
        Ok(())
    }
}

// ── Log-only ────────────────────────────────────────────────────────

/// Logs the email instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        warn!("Mail transport not configured, simulating delivery");
        let attachments: Vec<&str> = email
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = ?attachments,
            "[SIMULATED EMAIL]\n{}",
            email.text
        );
        Ok(())
    }
}
