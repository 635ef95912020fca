use std::sync::Arc;

use poem::{Result as PoemResult, http::StatusCode};
use poem_openapi::{OpenApi, param::Query, payload::Json};

use crate::presentation::{
    http::{
        endpoints::root::{ApiState, EndpointsTags},
        responses::{SchedulerActionResponse, SchedulerActionResponseDto, SchedulerStatusDto},
    },
    models::{SchedulerAction, SchedulerStatusKind},
};

#[derive(Clone)]
pub struct SchedulerEndpoints {
    state: Arc<ApiState>,
}

impl SchedulerEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl SchedulerEndpoints {
    /// Starts or stops the dispatch scheduler (`action=start|stop`).
    #[oai(path = "/scheduler", method = "post", tag = EndpointsTags::Scheduler)]
    pub async fn control_scheduler(
        &self,
        action: Query<Option<String>>,
    ) -> PoemResult<SchedulerActionResponse> {
        let action = action.0.as_deref().and_then(SchedulerAction::parse).ok_or_else(|| {
            poem::Error::from_string(
                "invalid action, use 'start' or 'stop'",
                StatusCode::BAD_REQUEST,
            )
        })?;

        let scheduler = &self.state.scheduler;
        let (result, message) = match action {
            SchedulerAction::Start => (scheduler.start().await, "scheduler started"),
            SchedulerAction::Stop => (scheduler.stop().await, "scheduler stopped"),
        };
        result.map_err(|err| poem::Error::from_string(err.to_string(), StatusCode::CONFLICT))?;

        Ok(SchedulerActionResponse::Accepted(Json(SchedulerActionResponseDto {
            message: message.to_string(),
        })))
    }

    #[oai(path = "/scheduler", method = "get", tag = EndpointsTags::Scheduler)]
    pub async fn scheduler_status(&self) -> Json<SchedulerStatusDto> {
        Json(SchedulerStatusDto {
            status: SchedulerStatusKind::from_running(self.state.scheduler.is_running()),
        })
    }
}
