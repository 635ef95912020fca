pub mod create_messages;
pub mod list_sent_messages;

pub use create_messages::{CreateMessagesRequest, CreateMessagesResponse, CreateMessagesUseCase};
pub use list_sent_messages::ListSentMessagesUseCase;
