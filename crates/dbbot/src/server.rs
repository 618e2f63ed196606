//! Router assembly and server startup.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api;
use crate::config::Config;
use crate::llm_client::build_llm_client;
use crate::metrics;
use crate::session::SessionStore;
use crate::state::AppState;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Loads nothing itself: `cfg` is already resolved. Starts logging, metrics and the HTTP server.
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    metrics::init_metrics();
    cfg.print_config();

    let llm = build_llm_client(&cfg);
    if let Err(e) = &llm {
        warn!("{}. /chat will answer 503 until COHERE_API_KEY is set.", e);
    }

    let addr = cfg.api_addr()?;
    let state = AppState::new(cfg, llm);
    if let Some(max_idle) = state.config.session_idle_timeout() {
        spawn_session_sweeper(state.sessions.clone(), max_idle);
    }

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

/// Periodically drops sessions idle for longer than `max_idle`.
pub fn spawn_session_sweeper(
    sessions: Arc<dyn SessionStore>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    let period = max_idle.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(max_idle);
            if evicted > 0 {
                metrics::dec_sessions_by(evicted);
                info!("Evicted {} idle connected session(s)", evicted);
            } else {
                debug!("Session sweep found nothing to evict");
            }
        }
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let chat_routes = Router::new()
        .route("/", get(api::index))
        .route("/connect_db", post(api::connect_db))
        .route("/chat", post(api::chat))
        .route_layer(middleware::from_fn(api::session_layer));

    Router::new()
        .merge(chat_routes)
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(metrics::get_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .with_state(state)
}
