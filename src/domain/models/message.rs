use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MessageStatus::Pending),
            "sending" => Some(MessageStatus::Sending),
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub recipient: String,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub last_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Builds a new `pending` message, rejecting an empty recipient or content
    /// longer than `char_limit` characters.
    pub fn new(
        content: impl Into<String>,
        recipient: impl Into<String>,
        char_limit: usize,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        let recipient = recipient.into();

        if recipient.trim().is_empty() {
            return Err(DomainError::RecipientEmpty);
        }
        if content.chars().count() > char_limit {
            return Err(DomainError::ContentTooLong { limit: char_limit });
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            recipient,
            status: MessageStatus::Pending,
            external_id: None,
            last_failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn mark_as_sending(&mut self) {
        self.status = MessageStatus::Sending;
        self.touch();
    }

    pub fn mark_as_sent(&mut self, external_id: impl Into<String>) {
        self.status = MessageStatus::Sent;
        self.external_id = Some(external_id.into());
        self.last_failure_reason = None;
        self.touch();
    }

    pub fn mark_as_failed(&mut self, reason: impl Into<String>) {
        self.status = MessageStatus::Failed;
        self.last_failure_reason = Some(reason.into());
        self.touch();
    }

    // Keeps `updated_at` strictly increasing even when two transitions land
    // within the clock's resolution.
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }
}
