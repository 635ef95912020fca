use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Hands one message to the external delivery endpoint.
#[async_trait]
pub trait DeliverySender: Send + Sync {
    /// Returns the identifier the provider assigned to the delivered message.
    async fn send(&self, recipient: &str, content: &str) -> anyhow::Result<String>;
}

/// Best-effort record of delivered messages. Callers treat every error as
/// non-fatal.
#[async_trait]
pub trait DeliveryCache: Send + Sync {
    async fn record_sent(
        &self,
        message_id: Uuid,
        external_id: &str,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

/// Cache used when no cache backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDeliveryCache;

#[async_trait]
impl DeliveryCache for NoopDeliveryCache {
    async fn record_sent(
        &self,
        _message_id: Uuid,
        _external_id: &str,
        _sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
