use crate::{domain::models::Message, presentation::http::responses::MessageDto};

pub fn map_message(message: &Message) -> MessageDto {
    MessageDto {
        id: message.id,
        content: message.content.clone(),
        recipient: message.recipient.clone(),
        status: message.status.into(),
        external_message_id: message.external_id.clone(),
        last_failure_reason: message.last_failure_reason.clone(),
        created_at: message.created_at.to_rfc3339(),
        updated_at: message.updated_at.to_rfc3339(),
    }
}
