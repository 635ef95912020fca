use poem_openapi::{ApiResponse, Object, payload::Json};
use uuid::Uuid;

use crate::presentation::models::{MessageStatusDto, SchedulerStatusKind};

#[derive(Object, Debug)]
pub struct MessageDto {
    pub id: Uuid,
    pub content: String,
    pub recipient: String,
    pub status: MessageStatusDto,
    pub external_message_id: Option<String>,
    pub last_failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Object, Debug)]
pub struct CreateMessagesResponseDto {
    pub message: String,
    pub message_ids: Vec<Uuid>,
}

#[derive(Object, Debug)]
pub struct SchedulerActionResponseDto {
    pub message: String,
}

#[derive(Object, Debug)]
pub struct SchedulerStatusDto {
    pub status: SchedulerStatusKind,
}

#[derive(ApiResponse, Debug)]
pub enum CreateMessagesResponse {
    /// Messages were queued for delivery.
    #[oai(status = 202)]
    Accepted(Json<CreateMessagesResponseDto>),
}

#[derive(ApiResponse, Debug)]
pub enum SchedulerActionResponse {
    #[oai(status = 202)]
    Accepted(Json<SchedulerActionResponseDto>),
}
