use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, StatusCode};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod catalogue;
mod config;
mod error;
mod gamma;
mod llm;
mod pipeline;
mod routes;
mod telemetry;

use config::Config;
use gamma::{GenerationApi, Pause, TokioPause};
use llm::LlmClient;
use telemetry::{REQUEST_ID_HEADER, RequestOutcome, RequestSpan, init_telemetry};

/// Builds the summarization client for a request's API key.
pub type SummarizerFactory = Arc<dyn Fn(&Config, &str) -> LlmClient + Send + Sync>;

/// Builds the document-generation API client for a request's API key.
pub type GenerationApiFactory = Arc<dyn Fn(&Config, &str) -> Arc<dyn GenerationApi> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub summarizer: SummarizerFactory,
    pub generation_api: GenerationApiFactory,
    pub pause: Arc<dyn Pause>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            summarizer: Arc::new(llm::summarizer),
            generation_api: Arc::new(gamma::generation_api),
            pause: Arc::new(TokioPause),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let request_timeout = state.config.request_timeout;
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/reports", post(routes::reports::create_report))
        .route("/api/reports/preview", post(routes::reports::preview_report))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(RequestSpan)
                        .on_response(RequestOutcome),
                )
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        summarizer_provider = config.summarizer_provider.as_str(),
        summarizer_model = %config.summarizer_model,
        catalogue = config.catalogue.as_str(),
        "Starting tcfd-report-generator"
    );

    if config.summarizer_api_key.is_none() {
        tracing::warn!("No summarization API key configured, requests must supply one");
    }
    if config.gamma_api_key.is_none() {
        tracing::warn!("No document generation API key configured, requests must supply one");
    }

    let state = AppState::new(config.clone());

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}
