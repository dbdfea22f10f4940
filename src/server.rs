//! # Server Configuration
//!
//! Router, shared state and graceful shutdown for the dashboard API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::dashboard::DashboardService;
use crate::handlers;
use crate::telemetry::{self, TraceContext};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub dashboard: DashboardService,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/queues", get(handlers::queues::list_queues))
        .route(
            "/queues/{name}/messages",
            get(handlers::queues::list_queue_messages),
        )
        .route("/messages/{id}", get(handlers::messages::get_message))
        .route("/topics", get(handlers::topics::list_topics))
        .route(
            "/topics/{arn}/messages",
            get(handlers::topics::list_topic_messages),
        )
        .route("/topics/{arn}/refresh", post(handlers::refresh::refresh_topic))
        .route("/refresh", post(handlers::refresh::refresh_all))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context))
        .layer(TraceLayer::new_for_http())
}

/// Scope each request in a trace context so error bodies carry its id.
async fn trace_context(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let context = TraceContext::from_request_id(request_id.as_deref());
    telemetry::with_trace_context(context, next.run(request)).await
}

/// Serve until `shutdown` fires, then drain in-flight requests.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state
        .config
        .bind_addr()
        .context("Invalid server address")?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::queues::list_queues,
        crate::handlers::queues::list_queue_messages,
        crate::handlers::messages::get_message,
        crate::handlers::topics::list_topics,
        crate::handlers::topics::list_topic_messages,
        crate::handlers::refresh::refresh_all,
        crate::handlers::refresh::refresh_topic,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::MessageInfo,
            crate::handlers::MessagesResponse,
            crate::handlers::queues::QueuesResponse,
            crate::handlers::topics::TopicsResponse,
            crate::handlers::refresh::TopicRefreshResponse,
            crate::dashboard::QueueSummary,
            crate::dashboard::TopicSummary,
            crate::ingest::RefreshSummary,
            crate::error::ApiError,
            crate::error::UpstreamError,
        )
    ),
    info(
        title = "SQS Monitor API",
        description = "Browse messages ingested from monitored queues by queue or topic",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
