use anyhow::{Context, Result};
use axum::Router;
use prometheus::Registry;
use tokio::net::TcpListener;
use tracing::info;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
}

impl AppState {
    pub fn new(registry: &Registry) -> Self {
        Self {
            metrics_state: MetricsState::new(registry.clone()),
        }
    }
}

pub fn router(settings_config: &SettingsConfig, registry: &Registry) -> Router {
    let state = AppState::new(registry);
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve the metrics endpoint until the process ends.
pub async fn start(settings_config: &SettingsConfig, registry: &Registry) -> Result<()> {
    let app = router(settings_config, registry);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind metrics endpoint on {}", bind_addr))?;
    info!("serving metrics on http://{}{}", bind_addr, settings_config.metrics.path);

    get_metrics().await.up.set(1);
    axum::serve(listener, app).await?;
    Ok(())
}
