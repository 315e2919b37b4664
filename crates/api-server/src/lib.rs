//! HTTP surface for the ticker analysis service.

pub mod analyze_routes;
pub mod config;
pub mod error;
pub mod request_id;

use analysis_core::Summarizer;
use analysis_orchestrator::{AnalysisCache, AnalysisOrchestrator};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    middleware,
    routing::get,
    Json, Router,
};
use llm_client::{HttpSummarizer, TemplateSummarizer};
use polygon_client::PolygonClient;
use sec_client::SecClient;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::AppConfig;
pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Wire the upstream clients, cache and orchestrator from configuration.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let filings = Arc::new(SecClient::new(config.sec_user_agent.clone(), config.upstream_timeout));
    let market_data = Arc::new(PolygonClient::new(
        config.market_data_api_key.clone(),
        config.upstream_timeout,
    ));

    let summarizer: Arc<dyn Summarizer> = match &config.llm_endpoint {
        Some(endpoint) => {
            tracing::info!("Summaries from {}", endpoint);
            Arc::new(
                HttpSummarizer::new(endpoint.clone(), config.upstream_timeout)
                    .context("Failed to build summarization client")?,
            )
        }
        None => {
            tracing::info!("LLM_ENDPOINT not set, using template summaries");
            Arc::new(TemplateSummarizer::new())
        }
    };

    let orchestrator = AnalysisOrchestrator::new(
        filings,
        market_data,
        summarizer,
        Arc::new(AnalysisCache::new()),
        config.orchestrator_config(),
    );
    Ok(AppState::new(orchestrator))
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(healthz))
        .merge(analyze_routes::analyze_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id::request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Liveness only: touches no upstream and no cache.
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Logs to stdout; `RUST_LOG` filters (default `info`), `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let state = build_state(&config)?;

    if let Some(interval) = config.cache_sweep_interval {
        tracing::info!("Sweeping expired cache entries every {}s", interval.as_secs());
        Arc::clone(state.orchestrator.cache()).spawn_sweeper(interval);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        "Ticker analyzer listening on {} (cache TTL {}s, upstream timeout {}s)",
        config.bind_addr,
        config.cache_ttl.as_secs(),
        config.upstream_timeout.as_secs()
    );

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
