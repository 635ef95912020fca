use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{Message, MessageStatus},
    repositories::MessageRepository,
};

/// Insertion-ordered message store backed by process memory.
#[derive(Default, Clone)]
pub struct InMemoryMessageRepository {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, message_id: Uuid) -> Option<Message> {
        let messages = self.messages.read().await;
        messages.iter().find(|m| m.id == message_id).cloned()
    }

    pub async fn all(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn fetch_pending(&self, limit: usize) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<Message> = messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        pending.sort_by_key(|m| m.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn update_status(&self, message: &Message) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        let stored = messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| anyhow::anyhow!("message {} not found", message.id))?;

        stored.status = message.status;
        stored.external_id = message.external_id.clone();
        stored.last_failure_reason = message.last_failure_reason.clone();
        stored.updated_at = message.updated_at;
        Ok(())
    }

    async fn fetch_sent(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut sent: Vec<Message> = messages
            .iter()
            .filter(|m| m.status == MessageStatus::Sent)
            .cloned()
            .collect();
        sent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sent
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create_many(&self, new_messages: &[Message]) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if let Some(duplicate) = new_messages
            .iter()
            .find(|new| messages.iter().any(|m| m.id == new.id))
        {
            anyhow::bail!("message {} already exists", duplicate.id);
        }
        messages.extend_from_slice(new_messages);
        Ok(())
    }
}
