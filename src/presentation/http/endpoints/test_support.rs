use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    application::{
        handlers::{DispatchScheduler, DispatcherConfig, MessageDispatcher},
        services::delivery::{DeliverySender, NoopDeliveryCache},
        usecases::{CreateMessagesUseCase, ListSentMessagesUseCase},
    },
    config::SchedulerConfig,
    infrastructure::repositories::InMemoryMessageRepository,
    presentation::http::endpoints::root::ApiState,
};

struct AcceptingSender;

#[async_trait]
impl DeliverySender for AcceptingSender {
    async fn send(&self, _recipient: &str, _content: &str) -> anyhow::Result<String> {
        Ok("ext-test".to_string())
    }
}

pub(super) fn state_with_repo(repo: InMemoryMessageRepository) -> Arc<ApiState> {
    let repo = Arc::new(repo);
    let dispatcher = MessageDispatcher::new(
        repo.clone(),
        Arc::new(AcceptingSender),
        Arc::new(NoopDeliveryCache),
        DispatcherConfig {
            worker_count: 1,
            job_timeout: Duration::from_secs(1),
        },
    );
    let scheduler = DispatchScheduler::new(
        Arc::new(dispatcher),
        SchedulerConfig {
            message_rate: 2,
            runs_every: Duration::from_secs(60),
            grace_period: Duration::from_secs(10),
            job_timeout: Duration::from_secs(1),
        },
    );

    Arc::new(ApiState {
        scheduler,
        create_messages_usecase: Arc::new(CreateMessagesUseCase::new(repo.clone(), 160)),
        list_sent_messages_usecase: Arc::new(ListSentMessagesUseCase::new(repo)),
    })
}
