use std::sync::Arc;

use crate::domain::{models::Message, repositories::MessageRepository};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct ListSentMessagesUseCase {
    repo: Arc<dyn MessageRepository>,
}

impl ListSentMessagesUseCase {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    /// Out-of-range limits fall back to the default page size; a negative
    /// offset starts from the first page.
    pub async fn execute(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Message>> {
        let limit = match u32::try_from(limit) {
            Ok(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => limit,
            _ => DEFAULT_PAGE_SIZE,
        };
        let offset = u32::try_from(offset.max(0)).unwrap_or(u32::MAX);
        self.repo.fetch_sent(limit, offset).await
    }
}
