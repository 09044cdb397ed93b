use anyhow::{Context, Result};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::db::Database;
use crate::sync::Coordinator;

pub(crate) fn serve(config: &Config) -> Result<()> {
    let db_path = config.resolve_db_path()?;
    // bootstrap schema and seed before any request connection opens
    Database::open(&db_path)?;
    let tokens = config.token_issuer()?;
    let coordinator = Coordinator::new(config.max_batch);
    let state = AppState::new(db_path.clone(), tokens, coordinator);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
        tracing::info!(
            addr = %config.bind_addr,
            db = %db_path.display(),
            max_batch = coordinator.max_batch(),
            "listening"
        );
        axum::serve(listener, api::router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
