use crate::error::MailError;
use crate::types::Mail;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync + 'static {
    /// Makes exactly one delivery attempt.
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

/// Submits mail to an HTTP relay authenticated with a bearer token.
pub struct HttpMailSender {
    client: Client,
    relay_url: String,
    token: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl HttpMailSender {
    pub fn new(relay_url: String, token: String, timeout: Duration) -> Result<Self, MailError> {
        if !relay_url.starts_with("https://") {
            warn!(%relay_url, "Mail relay is not using https, messages travel unencrypted");
        }
        if token.is_empty() {
            return Err(MailError::Configuration(
                "mail relay token must not be empty".into(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            relay_url,
            token,
        })
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let payload = RelayPayload {
            from: &mail.from,
            to: &mail.to,
            subject: &mail.subject,
            text_body: &mail.body,
        };

        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "No mail relay configured, logging notification"
        );
        Ok(())
    }
}
