use poem_openapi::Enum;

use crate::domain::models::MessageStatus;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[oai(rename_all = "snake_case")]
pub enum MessageStatusDto {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl From<MessageStatus> for MessageStatusDto {
    fn from(value: MessageStatus) -> Self {
        match value {
            MessageStatus::Pending => MessageStatusDto::Pending,
            MessageStatus::Sending => MessageStatusDto::Sending,
            MessageStatus::Sent => MessageStatusDto::Sent,
            MessageStatus::Failed => MessageStatusDto::Failed,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[oai(rename_all = "snake_case")]
pub enum SchedulerStatusKind {
    Running,
    Stopped,
}

impl SchedulerStatusKind {
    pub fn from_running(running: bool) -> Self {
        if running {
            SchedulerStatusKind::Running
        } else {
            SchedulerStatusKind::Stopped
        }
    }
}

/// `action` query value accepted by the scheduler control endpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchedulerAction {
    Start,
    Stop,
}

impl SchedulerAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start" => Some(SchedulerAction::Start),
            "stop" => Some(SchedulerAction::Stop),
            _ => None,
        }
    }
}
