//! Backend entry-point: wires the local store, the remote adapter, the sync
//! scheduler, and the HTTP server.

use std::sync::Arc;

use actix_web::web;
use ortho_config::OrthoConfig;
use reqwest::Url;
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use tillpoint_backend::config::AppConfig;
use tillpoint_backend::domain::sync::{SyncConfig, SyncOrchestrator};
use tillpoint_backend::inbound::http::health::HealthState;
use tillpoint_backend::outbound::persistence::{
    DbPool, DieselLocalStore, EmbeddedDatabase, PoolConfig, run_migrations,
};
use tillpoint_backend::outbound::remote::RestRemoteStore;
use tillpoint_backend::server::{self, scheduler};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::load().map_err(std::io::Error::other)?;

    // Prefer an operator-supplied database; fall back to an embedded cluster
    // so the till keeps working with no external PostgreSQL at all.
    let (database_url, embedded) = match config.local_database_url.clone() {
        Some(url) => (url, None),
        None => {
            let db = EmbeddedDatabase::start(config.data_dir.clone())
                .await
                .map_err(std::io::Error::other)?;
            (db.database_url().to_owned(), Some(db))
        }
    };

    run_migrations(&database_url)
        .await
        .map_err(std::io::Error::other)?;
    let pool = DbPool::new(PoolConfig::new(database_url.as_str()))
        .await
        .map_err(std::io::Error::other)?;
    let local = Arc::new(DieselLocalStore::new(pool));

    let base_url = config
        .remote_base_url
        .as_deref()
        .ok_or_else(|| std::io::Error::other("TILLPOINT_REMOTE_BASE_URL must be set"))?;
    let base_url: Url = base_url.parse().map_err(std::io::Error::other)?;
    let remote = Arc::new(
        RestRemoteStore::new(
            base_url,
            config.remote_api_key.clone(),
            config.remote_timeout(),
        )
        .map_err(std::io::Error::other)?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            local,
            remote,
            SyncConfig {
                worker_limit: config.worker_limit(),
            },
        )
        .with_shutdown(shutdown_rx.clone()),
    );

    let scheduler_task = tokio::spawn(scheduler::run(
        Arc::clone(&orchestrator),
        config.sync_interval(),
        shutdown_rx,
    ));

    let health_state = web::Data::new(HealthState::new());
    let http_server = server::create_server(health_state.clone(), orchestrator, config.bind_addr())?;
    health_state.mark_ready();

    let served = http_server.await;

    // Actix has drained; stop the scheduler and let an in-flight pass finish
    // its current entity type before tearing the stores down.
    health_state.mark_unhealthy();
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "scheduler task did not join cleanly");
    }
    if let Some(db) = embedded {
        if let Err(e) = db.stop().await {
            warn!(error = %e, "embedded cluster shutdown failed");
        }
    }

    served
}
