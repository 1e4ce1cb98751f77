use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::proxy::{relay_handler, Relay};

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub relay: Arc<Relay>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(metrics: &Metrics, relay: Arc<Relay>, body_limit: usize) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            relay,
            body_limit,
        }
    }
}

/// Metrics route (when enabled) plus the relay as fallback for everything else.
pub fn router(state: AppState, metrics_config: &MetricsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(metrics_config))
        .fallback(relay_handler)
        .with_state(state)
}

/// Start one Axum server and serve until Ctrl-C.
pub async fn start(settings_config: &SettingsConfig, relay: Arc<Relay>) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, relay, settings_config.body_limit_bytes);
    let app = router(state, &settings_config.metrics);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("listening on {}", listener.local_addr()?);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    metrics.up.set(0);

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
