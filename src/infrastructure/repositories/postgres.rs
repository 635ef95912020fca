use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::domain::{
    models::{Message, MessageStatus},
    repositories::MessageRepository,
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn fetch_pending(&self, limit: usize) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, content, recipient, status, external_message_id, last_failure_reason,
                   created_at, updated_at
            FROM messages
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    async fn update_status(&self, message: &Message) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2,
                external_message_id = $3,
                last_failure_reason = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .bind(message.status.as_str())
        .bind(&message.external_id)
        .bind(&message.last_failure_reason)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("message {} not found", message.id);
        }
        Ok(())
    }

    async fn fetch_sent(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, content, recipient, status, external_message_id, last_failure_reason,
                   created_at, updated_at
            FROM messages
            WHERE status = 'sent'
            ORDER BY updated_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    async fn create_many(&self, messages: &[Message]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO messages (id, content, recipient, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(message.id)
            .bind(&message.content)
            .bind(&message.recipient)
            .bind(message.status.as_str())
            .bind(message.created_at)
            .bind(message.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                anyhow::anyhow!(
                    "failed to create message for recipient {}: {err}",
                    message.recipient
                )
            })?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    content: String,
    recipient: String,
    status: String,
    external_message_id: Option<String>,
    last_failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = anyhow::Error;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let status = MessageStatus::from_str(&value.status)
            .ok_or_else(|| anyhow::anyhow!("unknown message status {}", value.status))?;
        Ok(Self {
            id: value.id,
            content: value.content,
            recipient: value.recipient,
            status,
            external_id: value.external_message_id,
            last_failure_reason: value.last_failure_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
