//! Roster Server - Main entry point

use anyhow::Result;
use roster_common::logging::{init_logging, LogConfig};
use roster_common::types::STUDENT_CSV_HEADER;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use roster_server::{
    api::{self, AppState},
    config::{Config, StoreBackend},
    db,
    features::FeatureState,
    ingest::{IntakeCoordinator, SessionRegistry, StudentIntake, StudentMapper},
    store::{MemoryStore, PgStudentStore, StudentStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::from_env()?
        .with_file_prefix("roster-server")
        .with_default_directives("roster_server=debug,tower_http=debug,sqlx=warn");
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Roster Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let (db_pool, store) = match config.store {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            let store: Arc<dyn StudentStore> = Arc::new(PgStudentStore::new(pool.clone()));
            (Some(pool), store)
        },
        StoreBackend::Memory => {
            info!("Using in-memory student store, records are lost on exit");
            let store: Arc<dyn StudentStore> = Arc::new(MemoryStore::new());
            (None, store)
        },
    };

    // Cancelling this stops every in-flight upload as well as the janitor.
    let shutdown = CancellationToken::new();

    let registry = SessionRegistry::new();
    let janitor = registry.spawn_janitor(config.ingest.session_retention(), shutdown.clone());

    let intake: StudentIntake = IntakeCoordinator::new(
        registry,
        Arc::clone(&store),
        StudentMapper,
        &STUDENT_CSV_HEADER,
        config.ingest.clone(),
        shutdown.clone(),
    );

    let intake = Arc::new(intake);

    let state = AppState {
        db: db_pool,
        features: FeatureState {
            store,
            intake: Arc::clone(&intake),
        },
    };
    let app = api::create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    if !intake.drain(grace).await {
        tracing::warn!("Upload runs did not finish within {:?}", grace);
    }
    if tokio::time::timeout(grace, janitor).await.is_err() {
        tracing::warn!("Session janitor did not stop within {:?}", grace);
    }

    info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    shutdown.cancel();
}
