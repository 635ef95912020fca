use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{errors::DomainError, models::Message, repositories::MessageRepository};

pub struct CreateMessagesUseCase {
    repo: Arc<dyn MessageRepository>,
    character_limit: usize,
}

pub struct CreateMessagesRequest {
    pub content: String,
    pub recipients: Vec<String>,
}

pub struct CreateMessagesResponse {
    pub message_ids: Vec<Uuid>,
}

impl CreateMessagesUseCase {
    pub fn new(repo: Arc<dyn MessageRepository>, character_limit: usize) -> Self {
        Self {
            repo,
            character_limit,
        }
    }

    /// Queues one `pending` message per recipient. A single invalid recipient
    /// rejects the whole request.
    pub async fn execute(
        &self,
        request: CreateMessagesRequest,
    ) -> Result<CreateMessagesResponse, DomainError> {
        if request.recipients.is_empty() {
            return Ok(CreateMessagesResponse {
                message_ids: Vec::new(),
            });
        }

        let messages = request
            .recipients
            .into_iter()
            .map(|recipient| Message::new(request.content.as_str(), recipient, self.character_limit))
            .collect::<Result<Vec<_>, _>>()?;

        self.repo.create_many(&messages).await?;
        info!(count = messages.len(), "queued messages for delivery");

        Ok(CreateMessagesResponse {
            message_ids: messages.iter().map(|m| m.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::models::MessageStatus, infrastructure::repositories::InMemoryMessageRepository};

    fn use_case(repo: &InMemoryMessageRepository) -> CreateMessagesUseCase {
        CreateMessagesUseCase::new(Arc::new(repo.clone()), 10)
    }

    #[tokio::test]
    async fn creates_a_pending_message_per_recipient() {
        let repo = InMemoryMessageRepository::new();
        let response = use_case(&repo)
            .execute(CreateMessagesRequest {
                content: "hi there".to_string(),
                recipients: vec!["+1".to_string(), "+2".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(response.message_ids.len(), 2);
        let stored = repo.all().await;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|m| m.status == MessageStatus::Pending));
    }

    #[tokio::test]
    async fn one_invalid_recipient_rejects_the_request() {
        let repo = InMemoryMessageRepository::new();
        let err = use_case(&repo)
            .execute(CreateMessagesRequest {
                content: "hi there".to_string(),
                recipients: vec!["+1".to_string(), " ".to_string()],
            })
            .await
            .err()
            .unwrap();

        assert!(matches!(err, DomainError::RecipientEmpty));
        assert!(repo.all().await.is_empty());
    }

    #[tokio::test]
    async fn content_over_the_limit_is_a_validation_error() {
        let repo = InMemoryMessageRepository::new();
        let err = use_case(&repo)
            .execute(CreateMessagesRequest {
                content: "way past ten characters".to_string(),
                recipients: vec!["+1".to_string()],
            })
            .await
            .err()
            .unwrap();

        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn empty_recipient_list_is_a_no_op() {
        let repo = InMemoryMessageRepository::new();
        let response = use_case(&repo)
            .execute(CreateMessagesRequest {
                content: "hi".to_string(),
                recipients: Vec::new(),
            })
            .await
            .unwrap();

        assert!(response.message_ids.is_empty());
        assert!(repo.all().await.is_empty());
    }
}
