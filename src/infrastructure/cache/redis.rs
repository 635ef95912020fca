use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::{Client, aio::MultiplexedConnection};
use tokio::time::timeout;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::services::delivery::DeliveryCache;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SENT_MESSAGE_TTL_SECS: u64 = 24 * 60 * 60;

/// Records delivered messages under `sent_messages:<id>` for a day.
///
/// Connection problems at startup are logged and every later write fails
/// fast, leaving delivery itself unaffected.
pub struct RedisDeliveryCache {
    conn: Option<MultiplexedConnection>,
}

impl RedisDeliveryCache {
    pub async fn connect(url: &str) -> Arc<Self> {
        let conn = match Self::open(url).await {
            Ok(conn) => {
                info!("connected to redis");
                Some(conn)
            }
            Err(err) => {
                error!(error = %err, "failed to connect to redis, caching will be unavailable");
                None
            }
        };
        Arc::new(Self { conn })
    }

    async fn open(url: &str) -> anyhow::Result<MultiplexedConnection> {
        let client = Client::open(url)?;
        match timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => anyhow::bail!(
                "connection timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            ),
        }
    }

    pub fn is_available(&self) -> bool {
        self.conn.is_some()
    }
}

fn sent_message_key(message_id: Uuid) -> String {
    format!("sent_messages:{message_id}")
}

fn sent_message_value(external_id: &str, sent_at: DateTime<Utc>) -> String {
    format!(
        "ext_id:{external_id};sent_at:{}",
        sent_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[async_trait]
impl DeliveryCache for RedisDeliveryCache {
    async fn record_sent(
        &self,
        message_id: Uuid,
        external_id: &str,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let Some(conn) = &self.conn else {
            anyhow::bail!("redis is unavailable, cannot cache message {message_id}");
        };

        let mut conn = conn.clone();
        let _: () = redis::cmd("SET")
            .arg(sent_message_key(message_id))
            .arg(sent_message_value(external_id, sent_at))
            .arg("EX")
            .arg(SENT_MESSAGE_TTL_SECS)
            .query_async(&mut conn)
            .await
            .map_err(|err| anyhow::anyhow!("failed to cache message {message_id}: {err}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn entries_use_the_sent_messages_layout() {
        let id = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
        let sent_at = Utc.with_ymd_and_hms(2025, 7, 9, 12, 30, 0).unwrap();

        assert_eq!(
            sent_message_key(id),
            "sent_messages:6f9619ff-8b86-d011-b42d-00c04fc964ff"
        );
        assert_eq!(
            sent_message_value("ext-42", sent_at),
            "ext_id:ext-42;sent_at:2025-07-09T12:30:00Z"
        );
    }

    #[tokio::test]
    async fn unavailable_cache_rejects_writes() {
        let cache = RedisDeliveryCache { conn: None };

        assert!(!cache.is_available());
        assert!(cache.record_sent(Uuid::new_v4(), "ext-1", Utc::now()).await.is_err());
    }
}
