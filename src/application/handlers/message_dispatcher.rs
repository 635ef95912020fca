use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::{
    sync::Mutex,
    task::JoinSet,
    time::{Instant, timeout, timeout_at},
};
use tracing::{debug, error, info, warn};

use crate::{
    application::services::delivery::{DeliveryCache, DeliverySender},
    domain::{models::Message, repositories::MessageRepository},
};

/// Budget for recording a delivered message in the cache, independent of the
/// batch deadline and the job timeout.
pub const CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to fetch pending messages: {0:#}")]
    Fetch(anyhow::Error),
    #[error("batch deadline exceeded with {unprocessed} message(s) left unprocessed")]
    DeadlineExceeded { unprocessed: usize },
    #[error("{panicked} dispatch worker(s) panicked")]
    WorkerPanicked { panicked: usize },
}

impl DispatchError {
    /// Deadline overruns are expected under load; the untouched messages stay
    /// `pending` and are fetched again on the next tick.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, DispatchError::DeadlineExceeded { .. })
    }
}

/// One batch of work driven by the scheduler.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch_pending(&self, deadline: Instant, limit: usize) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on concurrent workers per batch.
    pub worker_count: usize,
    /// Per-message budget for the claim write, the send, and the resolution
    /// write, each measured separately.
    pub job_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchTally {
    sent: usize,
    failed: usize,
    skipped: usize,
}

impl BatchTally {
    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Sent => self.sent += 1,
            MessageOutcome::Failed => self.failed += 1,
            MessageOutcome::Skipped => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: BatchTally) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    fn processed(&self) -> usize {
        self.sent + self.failed + self.skipped
    }
}

type WorkQueue = Arc<Mutex<VecDeque<Message>>>;

/// Fetches pending messages and pushes each one through
/// claim → send → resolve on a worker pool that lives for a single batch.
#[derive(Clone)]
pub struct MessageDispatcher {
    repo: Arc<dyn MessageRepository>,
    sender: Arc<dyn DeliverySender>,
    cache: Arc<dyn DeliveryCache>,
    config: DispatcherConfig,
}

impl MessageDispatcher {
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        sender: Arc<dyn DeliverySender>,
        cache: Arc<dyn DeliveryCache>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            repo,
            sender,
            cache,
            config,
        }
    }

    pub async fn run(&self, deadline: Instant, limit: usize) -> Result<(), DispatchError> {
        info!(limit, "fetching pending messages to process");
        let pending = match timeout_at(deadline, self.repo.fetch_pending(limit)).await {
            Ok(result) => result.map_err(DispatchError::Fetch)?,
            Err(_) => return Err(DispatchError::DeadlineExceeded { unprocessed: 0 }),
        };

        if pending.is_empty() {
            info!("no pending messages to process");
            return Ok(());
        }

        let fetched = pending.len();
        let worker_count = self.config.worker_count.clamp(1, fetched);
        let queue: WorkQueue = Arc::new(Mutex::new(VecDeque::from(pending)));

        let mut workers = JoinSet::new();
        for worker_id in 1..=worker_count {
            let dispatcher = self.clone();
            let queue = queue.clone();
            workers.spawn(async move { dispatcher.work(worker_id, queue, deadline).await });
        }

        let mut tally = BatchTally::default();
        let mut panicked = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_tally) => tally.merge(worker_tally),
                Err(err) => {
                    panicked += 1;
                    error!(error = %err, "dispatch worker terminated abnormally");
                }
            }
        }

        let unprocessed = queue.lock().await.len();
        info!(
            fetched,
            workers = worker_count,
            processed_count = tally.processed(),
            sent = tally.sent,
            failed = tally.failed,
            skipped = tally.skipped,
            unprocessed,
            "finished processing message batch"
        );

        if panicked > 0 {
            return Err(DispatchError::WorkerPanicked { panicked });
        }
        if unprocessed > 0 {
            return Err(DispatchError::DeadlineExceeded { unprocessed });
        }
        Ok(())
    }

    async fn work(self, worker_id: usize, queue: WorkQueue, deadline: Instant) -> BatchTally {
        debug!(worker_id, "worker started");
        let mut tally = BatchTally::default();

        loop {
            // Checked between messages only; a send already in flight runs to
            // its own job timeout.
            if Instant::now() >= deadline {
                warn!(worker_id, "batch deadline reached, worker stopping early");
                break;
            }
            let Some(message) = queue.lock().await.pop_front() else {
                break;
            };
            tally.record(self.process(worker_id, message).await);
        }

        debug!(worker_id, processed = tally.processed(), "worker finished");
        tally
    }

    async fn process(&self, worker_id: usize, mut message: Message) -> MessageOutcome {
        let message_id = message.id;
        info!(
            worker_id,
            %message_id,
            recipient = %message.recipient,
            "attempting to send message"
        );

        message.mark_as_sending();
        if let Err(err) = self.persist(&message).await {
            error!(
                worker_id,
                %message_id,
                error = %err,
                "failed to mark message as sending, leaving it for a later batch"
            );
            return MessageOutcome::Skipped;
        }

        let job_timeout = self.config.job_timeout;
        let delivery = match timeout(
            job_timeout,
            self.sender.send(&message.recipient, &message.content),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "delivery timed out after {}ms",
                job_timeout.as_millis()
            )),
        };

        match delivery {
            Ok(external_id) => {
                message.mark_as_sent(external_id.as_str());
                if let Err(err) = self.persist(&message).await {
                    error!(
                        worker_id,
                        %message_id,
                        external_id = %external_id,
                        error = %err,
                        "message was delivered but could not be marked as sent"
                    );
                    return MessageOutcome::Sent;
                }
                info!(
                    worker_id,
                    %message_id,
                    external_id = %external_id,
                    "message sent and marked as sent"
                );
                self.record_in_cache(message_id, &external_id).await;
                MessageOutcome::Sent
            }
            Err(err) => {
                error!(worker_id, %message_id, error = %err, "failed to send message via webhook");
                message.mark_as_failed(format!("webhook send failed: {err}"));
                if let Err(update_err) = self.persist(&message).await {
                    error!(
                        worker_id,
                        %message_id,
                        error = %update_err,
                        "failed to update message status to failed"
                    );
                }
                MessageOutcome::Failed
            }
        }
    }

    async fn persist(&self, message: &Message) -> anyhow::Result<()> {
        match timeout(self.config.job_timeout, self.repo.update_status(message)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "status update timed out after {}ms",
                self.config.job_timeout.as_millis()
            ),
        }
    }

    async fn record_in_cache(&self, message_id: uuid::Uuid, external_id: &str) {
        let recorded = timeout(
            CACHE_WRITE_TIMEOUT,
            self.cache.record_sent(message_id, external_id, Utc::now()),
        )
        .await;

        match recorded {
            Ok(Ok(())) => debug!(%message_id, external_id, "cached sent message"),
            Ok(Err(err)) => warn!(
                %message_id,
                external_id,
                error = %err,
                "failed to cache sent message"
            ),
            Err(_) => warn!(%message_id, external_id, "timed out caching sent message"),
        }
    }
}

#[async_trait]
impl BatchDispatcher for MessageDispatcher {
    async fn dispatch_pending(&self, deadline: Instant, limit: usize) -> Result<(), DispatchError> {
        self.run(deadline, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_every_outcome() {
        let mut tally = BatchTally::default();
        tally.record(MessageOutcome::Sent);
        tally.record(MessageOutcome::Sent);
        tally.record(MessageOutcome::Failed);

        let mut other = BatchTally::default();
        other.record(MessageOutcome::Skipped);
        tally.merge(other);

        assert_eq!(tally.sent, 2);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.processed(), 4);
    }

    #[test]
    fn only_deadline_errors_are_expected() {
        assert!(DispatchError::DeadlineExceeded { unprocessed: 3 }.is_deadline_exceeded());
        assert!(!DispatchError::Fetch(anyhow::anyhow!("connection refused")).is_deadline_exceeded());
        assert!(!DispatchError::WorkerPanicked { panicked: 1 }.is_deadline_exceeded());
    }
}
