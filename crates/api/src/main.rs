use std::sync::Arc;

use anyhow::Context;
use diagpro_infra::{AppConfig, StaleProcessingSweeper, SweeperConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    diagpro_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        diagpro_api::app::services::build_services(&config)
            .await
            .context("failed to wire services")?,
    );

    let sweeper = config.stale_processing_after.map(|threshold| {
        StaleProcessingSweeper::new(services.repository.clone(), SweeperConfig::new(threshold)).spawn()
    });
    if sweeper.is_none() {
        tracing::info!("STALE_PROCESSING_MINUTES not set; stale-processing sweep disabled");
    }

    let app = diagpro_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
