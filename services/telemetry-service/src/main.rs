mod app;
mod body;
mod classify;
mod config;
mod handlers;
mod models;
mod payload;
mod snapshot;
mod state;

use std::net::SocketAddr;

use anyhow::Context;
use telematics_common::{bind_listener, init_tracing, shutdown_signal, TracingConfig};

use crate::config::ServiceConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guards = init_tracing(&TracingConfig::from_env("telemetry-service"));

    let config = ServiceConfig::from_env();
    let app = app::build_router(AppState::new(), &config);
    let listener = bind_listener(config.port)
        .await
        .with_context(|| format!("bind port {}", config.port))?;

    tracing::info!(
        port = config.port,
        local_url = %format!("http://localhost:{}", config.port),
        public_url = config.public_url.as_deref().unwrap_or("<unset>"),
        body_limit_bytes = ?config.body_limit_bytes,
        "ESP32 data receiver listening, waiting for device data"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve")?;

    tracing::info!("server stopped");
    Ok(())
}
