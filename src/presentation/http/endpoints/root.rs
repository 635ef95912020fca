use std::sync::Arc;

use poem_openapi::{OpenApiService, Tags};

use crate::{
    application::{
        handlers::DispatchScheduler,
        usecases::{CreateMessagesUseCase, ListSentMessagesUseCase},
    },
    presentation::http::endpoints::{
        health::HealthEndpoints, messages::MessagesEndpoints, scheduler::SchedulerEndpoints,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: DispatchScheduler,
    pub create_messages_usecase: Arc<CreateMessagesUseCase>,
    pub list_sent_messages_usecase: Arc<ListSentMessagesUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Messages,
    Scheduler,
}

pub type Endpoints = (HealthEndpoints, MessagesEndpoints, SchedulerEndpoints);

pub fn api_service(state: Arc<ApiState>, server_url: &str) -> OpenApiService<Endpoints, ()> {
    let endpoints = (
        HealthEndpoints,
        MessagesEndpoints::new(state.clone()),
        SchedulerEndpoints::new(state),
    );
    OpenApiService::new(endpoints, "Notifier API", env!("CARGO_PKG_VERSION"))
        .server(format!("{server_url}/api/v1"))
}
