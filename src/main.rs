mod action;
mod config;
mod coordinator;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::coordinator::Coordinator;
use crate::services::action_log::ActionLog;
use crate::services::memory_log::MemoryActionLog;
use crate::services::persistence::ActionWriter;
use crate::services::pg_log::PgActionLog;

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    // A missing .env file is normal; the process environment still applies.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env().expect("invalid configuration");

    let log: Arc<dyn ActionLog> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgActionLog::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory action log (history is lost on restart)");
            Arc::new(MemoryActionLog::new())
        }
    };

    // Spawn the persistence writer, then the coordinator that feeds it.
    let (writer, writer_task) = ActionWriter::spawn(log.clone(), config.persist);
    let (coordinator, coordinator_task) = Coordinator::new(log.clone(), writer)
        .with_history_timeout(Duration::from_millis(config.history_timeout_ms))
        .spawn(config.coordinator_queue_capacity);

    let bind_addr = config.bind_addr;
    let state = state::AppState::new(coordinator, log, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("failed to bind");

    tracing::info!(%bind_addr, "sketchroom listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // The coordinator stops once the last handle is gone and then drops the
    // writer, which drains queued appends. Open sockets can keep a handle
    // alive, so the wait is bounded.
    let drained = async {
        let _ = coordinator_task.await;
        let _ = writer_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drained).await.is_err() {
        tracing::warn!("shutdown drain timed out; pending appends may be lost");
    }
    tracing::info!("sketchroom stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
