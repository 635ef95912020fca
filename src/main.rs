use std::{sync::Arc, time::Duration};

use anyhow::Context;
use notifier::{
    application::{
        handlers::{DispatchScheduler, DispatcherConfig, MessageDispatcher, SchedulerError},
        services::delivery::{DeliveryCache, NoopDeliveryCache},
        usecases::{CreateMessagesUseCase, ListSentMessagesUseCase},
    },
    config::Config,
    infrastructure::{
        cache::RedisDeliveryCache, messaging::WebhookSender,
        repositories::PostgresMessageRepository,
    },
    presentation::http::endpoints::{ApiState, api_service},
    telemetry,
};
use poem::{Route, Server, listener::TcpListener};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::try_parse()?;
    telemetry::init_tracing(&config.app)?;
    for warning in &config.warnings {
        warn!("{warning}");
    }
    info!(
        environment = %config.app.environment,
        message_rate = config.scheduler.message_rate,
        runs_every_ms = config.scheduler.runs_every.as_millis() as u64,
        grace_period_ms = config.scheduler.grace_period.as_millis() as u64,
        "configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("failed to connect to postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    info!("database ready");

    let cache: Arc<dyn DeliveryCache> = match &config.redis.url {
        Some(url) => {
            let cache = RedisDeliveryCache::connect(url).await;
            if !cache.is_available() {
                warn!("running without the sent message cache until restart");
            }
            cache as Arc<dyn DeliveryCache>
        }
        None => {
            info!("REDIS_URL not set, sent messages will not be cached");
            Arc::new(NoopDeliveryCache)
        }
    };

    let repo = PostgresMessageRepository::new(pool.clone());
    let sender = WebhookSender::new(
        config.webhook.url.clone(),
        config.webhook.character_limit,
        config.webhook.timeout,
    )?;

    let dispatcher = MessageDispatcher::new(
        repo.clone(),
        sender,
        cache,
        DispatcherConfig {
            worker_count: config.scheduler.worker_count(),
            job_timeout: config.scheduler.job_timeout,
        },
    );
    let scheduler = DispatchScheduler::new(Arc::new(dispatcher), config.scheduler.clone());
    if config.app.scheduler_autostart {
        scheduler.start().await?;
    }

    let state = Arc::new(ApiState {
        scheduler: scheduler.clone(),
        create_messages_usecase: Arc::new(CreateMessagesUseCase::new(
            repo.clone(),
            config.webhook.character_limit,
        )),
        list_sent_messages_usecase: Arc::new(ListSentMessagesUseCase::new(repo)),
    });

    let server_url = format!("http://{}:{}", config.server.host, config.server.port);
    let api = api_service(state, &server_url);
    let ui = api.swagger_ui();
    let app = Route::new().nest("/api/v1", api).nest("/", ui);

    info!(%server_url, "starting http server");
    Server::new(TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    )))
    .run_with_graceful_shutdown(
        app,
        async move {
            shutdown_signal().await;
            // In-flight batches drain before the HTTP server stops accepting.
            match scheduler.stop().await {
                Ok(()) | Err(SchedulerError::NotRunning) => {}
                Err(err) => error!(error = %err, "failed to stop scheduler"),
            }
        },
        Some(config.server.shutdown_timeout),
    )
    .await
    .context("http server failed")?;

    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
