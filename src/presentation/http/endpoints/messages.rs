use std::sync::Arc;

use poem::{Result as PoemResult, http::StatusCode};
use poem_openapi::{OpenApi, param::Query, payload::Json};
use tracing::error;

use crate::{
    application::usecases::CreateMessagesRequest,
    domain::errors::DomainError,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::map_message,
        requests::CreateMessagesRequestDto,
        responses::{CreateMessagesResponse, CreateMessagesResponseDto, MessageDto},
    },
};

#[derive(Clone)]
pub struct MessagesEndpoints {
    state: Arc<ApiState>,
}

impl MessagesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl MessagesEndpoints {
    /// Lists sent messages, most recently sent first.
    #[oai(path = "/messages/sent", method = "get", tag = EndpointsTags::Messages)]
    pub async fn list_sent_messages(
        &self,
        limit: Query<Option<i64>>,
        offset: Query<Option<i64>>,
    ) -> PoemResult<Json<Vec<MessageDto>>> {
        let messages = self
            .state
            .list_sent_messages_usecase
            .execute(limit.0.unwrap_or_default(), offset.0.unwrap_or_default())
            .await
            .map_err(|err| {
                error!(error = %err, "failed to list sent messages");
                poem::Error::from_string(
                    "failed to retrieve sent messages",
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            })?;

        Ok(Json(messages.iter().map(map_message).collect()))
    }

    /// Queues one message per recipient for the scheduler to deliver.
    #[oai(path = "/messages", method = "post", tag = EndpointsTags::Messages)]
    pub async fn create_messages(
        &self,
        request: Json<CreateMessagesRequestDto>,
    ) -> PoemResult<CreateMessagesResponse> {
        let Json(request) = request;
        let response = self
            .state
            .create_messages_usecase
            .execute(CreateMessagesRequest {
                content: request.content,
                recipients: request.recipients,
            })
            .await
            .map_err(domain_error)?;

        Ok(CreateMessagesResponse::Accepted(Json(CreateMessagesResponseDto {
            message: "messages queued for delivery".to_string(),
            message_ids: response.message_ids,
        })))
    }
}

fn domain_error(err: DomainError) -> poem::Error {
    if err.is_validation() {
        return poem::Error::from_string(err.to_string(), StatusCode::BAD_REQUEST);
    }
    error!(error = %err, "failed to create messages");
    poem::Error::from_string(
        "failed to create messages",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::http::endpoints::test_support::state_with_repo;
    use crate::{domain::repositories::MessageRepository, infrastructure::repositories::InMemoryMessageRepository};

    #[tokio::test]
    async fn create_messages_is_accepted() {
        let repo = InMemoryMessageRepository::new();
        let endpoints = MessagesEndpoints::new(state_with_repo(repo.clone()));

        let response = endpoints
            .create_messages(Json(CreateMessagesRequestDto {
                content: "Your code is 1234".to_string(),
                recipients: vec!["+905551111111".to_string(), "+905552222222".to_string()],
            }))
            .await
            .unwrap();

        let CreateMessagesResponse::Accepted(Json(body)) = response;
        assert_eq!(body.message_ids.len(), 2);
        assert_eq!(repo.all().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_recipient_is_a_bad_request() {
        let endpoints = MessagesEndpoints::new(state_with_repo(InMemoryMessageRepository::new()));

        let err = endpoints
            .create_messages(Json(CreateMessagesRequestDto {
                content: "hello".to_string(),
                recipients: vec![String::new()],
            }))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_only_sent_messages() {
        let repo = InMemoryMessageRepository::new();
        let mut sent = crate::domain::models::Message::new("done", "+1", 160).unwrap();
        let pending = crate::domain::models::Message::new("later", "+2", 160).unwrap();
        repo.create_many(&[sent.clone(), pending]).await.unwrap();
        sent.mark_as_sent("ext-1");
        repo.update_status(&sent).await.unwrap();

        let endpoints = MessagesEndpoints::new(state_with_repo(repo));
        let Json(messages) = endpoints
            .list_sent_messages(Query(None), Query(None))
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, sent.id);
        assert_eq!(messages[0].external_message_id.as_deref(), Some("ext-1"));
    }
}
