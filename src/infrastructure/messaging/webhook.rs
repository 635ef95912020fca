use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{application::services::delivery::DeliverySender, domain::errors::DomainError};

#[derive(Serialize)]
struct WebhookRequest<'a> {
    to: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WebhookResponse {
    #[serde(rename = "messageId", default)]
    message_id: String,
    #[serde(default)]
    error: Option<String>,
}

/// Delivers messages by POSTing them to a webhook that acknowledges with
/// `202 Accepted`.
pub struct WebhookSender {
    http: Client,
    url: String,
    character_limit: usize,
}

impl WebhookSender {
    pub fn new(
        url: impl Into<String>,
        character_limit: usize,
        timeout: Duration,
    ) -> anyhow::Result<Arc<Self>> {
        let http = Client::builder()
            .user_agent("notifier/webhook")
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;
        Ok(Arc::new(Self {
            http,
            url: url.into(),
            character_limit,
        }))
    }
}

#[async_trait]
impl DeliverySender for WebhookSender {
    async fn send(&self, recipient: &str, content: &str) -> anyhow::Result<String> {
        if content.chars().count() > self.character_limit {
            return Err(DomainError::ContentTooLong {
                limit: self.character_limit,
            }
            .into());
        }
        if recipient.trim().is_empty() {
            return Err(DomainError::RecipientEmpty.into());
        }

        let response = self
            .http
            .post(&self.url)
            .json(&WebhookRequest { to: recipient, content })
            .send()
            .await
            .context("failed to send webhook request")?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "webhook responded with unexpected status {}: {}",
                status.as_u16(),
                body
            );
        }

        let payload: WebhookResponse = response
            .json()
            .await
            .context("failed to decode webhook response body")?;

        if payload.message_id.trim().is_empty() {
            match payload.error.filter(|e| !e.is_empty()) {
                Some(error) => anyhow::bail!("webhook response did not contain a message id: {error}"),
                None => anyhow::bail!("webhook response did not contain a message id"),
            }
        }
        Ok(payload.message_id)
    }
}
