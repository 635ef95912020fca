use async_trait::async_trait;

use crate::domain::models::Message;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Up to `limit` messages in `pending` status, oldest first.
    async fn fetch_pending(&self, limit: usize) -> anyhow::Result<Vec<Message>>;

    /// Persists the message's status, external id, failure reason and
    /// `updated_at`.
    async fn update_status(&self, message: &Message) -> anyhow::Result<()>;

    async fn fetch_sent(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Message>>;

    /// Inserts all messages or none of them.
    async fn create_many(&self, messages: &[Message]) -> anyhow::Result<()>;
}
