use std::sync::Arc;

use anyhow::Context;

use campuscart_api::app::{build_app, services};
use campuscart_api::config::AppConfig;
use campuscart_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            campuscart_observability::init(LogFormat::default());
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    campuscart_observability::init(config.log_format);

    let services = Arc::new(services::build_services(&config).await?);
    let _sweeper = services::spawn_session_sweeper(services.clone(), config.session_idle);
    let app = build_app(services);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
