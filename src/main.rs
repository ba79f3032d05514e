//! ChangeFlow API
//!
//! Staged change workflow for fleet configuration: propose, approve, revert
//! and cancel entity mutations.
//!
//! Runs on PostgreSQL when DATABASE_URL is set, otherwise on an in-memory
//! store that is lost on restart.

use changeflow_api::config::Settings;
use changeflow_api::db::create_pool;
use changeflow_api::routes::create_router;
use changeflow_api::state::AppState;
use changeflow_api::store::{EntityStore, MemoryEntityStore, PgEntityStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting ChangeFlow API...");

    let settings = Settings::load()?;
    info!("Configuration loaded successfully");

    let store: Arc<dyn EntityStore> = match &settings.database {
        Some(database) => {
            let pool = create_pool(database).await?;
            let store = PgEntityStore::new(pool);
            store.init_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory entity store");
            Arc::new(MemoryEntityStore::new())
        }
    };

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(store, &settings, shutdown.clone()));
    info!(
        "Default application type: {}",
        state.default_application_type
    );

    let app = create_router(state.clone(), &settings);
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("Server listening on http://{}", addr);
    info!("   POST /api/change/changes               - Propose a change");
    info!("   POST /api/change/approve/{{changeId}}    - Approve one change");
    info!("   POST /api/change/approveEntities       - Approve many changes");
    info!("   POST /api/change/revert/{{approveId}}    - Revert an approved change");
    info!("   POST /api/change/revertEntities        - Revert many changes");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,changeflow_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Wait for Ctrl+C or SIGTERM, then stop running batches
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }

    shutdown.cancel();
}
