//! Assertion sync server
//!
//! Main entry point that wires the crates together and runs the scheduled
//! registry sweeps until shutdown.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use assertion_core::config::{AppConfig, DatabaseProvider};
use assertion_core::error::AppError;
use assertion_database::Repositories;
use assertion_registry::{HttpRegistryClient, RegistryClient};
use assertion_service::{
    AssertionService, KeyedLocks, LinkSigner, LinkageService, NotificationDispatcher,
    SyncOrchestrator,
};
use assertion_worker::jobs::{
    CreateSweepHandler, NotificationSendHandler, StatusCleanupHandler, UpdateSweepHandler,
};
use assertion_worker::{CronScheduler, JobExecutor};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let dir = std::env::var("ASSERTION_SYNC_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("ASSERTION_SYNC_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting assertion sync v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Repositories ─────────────────────────────────────
    let repos = match config.database.provider {
        DatabaseProvider::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = assertion_database::connection::create_pool(&config.database).await?;

            if config.database.run_migrations {
                tracing::info!("Running database migrations...");
                assertion_database::migration::run_migrations(&pool).await?;
                tracing::info!("Database migrations complete");
            }
            Repositories::postgres(pool)
        }
        DatabaseProvider::Memory => {
            tracing::warn!("Using in-memory repositories; state is lost on restart");
            Repositories::memory()
        }
    };

    // ── Step 2: Registry client ──────────────────────────────────
    let registry: Arc<dyn RegistryClient> =
        Arc::new(HttpRegistryClient::new(config.registry.clone())?);
    tracing::info!(
        "Registry client initialized ({}/{})",
        config.registry.api_base_url,
        config.registry.api_version
    );

    // ── Step 3: Services ─────────────────────────────────────────
    let locks = Arc::new(KeyedLocks::new());
    let signer = Arc::new(LinkSigner::new(&config.registry)?);
    let linkage = Arc::new(LinkageService::new(
        Arc::clone(&repos.identities),
        signer,
    ));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&repos.assertions),
        Arc::clone(&linkage),
        Arc::clone(&registry),
        Arc::clone(&locks),
        config.worker.concurrency,
    ));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&repos.assertions),
        Arc::clone(&repos.requests),
        Arc::clone(&linkage),
        Arc::clone(&registry),
        Arc::clone(&locks),
    ));

    let assertion_service = Arc::new(AssertionService::new(
        Arc::clone(&repos.assertions),
        Arc::clone(&linkage),
        Arc::clone(&dispatcher),
        Arc::clone(&locks),
    ));
    tracing::info!("Services initialized");

    // ── Step 4: Scheduler ────────────────────────────────────────
    let scheduler = if config.worker.enabled {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(CreateSweepHandler::new(Arc::clone(&orchestrator))));
        executor.register(Arc::new(UpdateSweepHandler::new(Arc::clone(&orchestrator))));
        executor.register(Arc::new(NotificationSendHandler::new(Arc::clone(
            &dispatcher,
        ))));
        executor.register(Arc::new(StatusCleanupHandler::new(Arc::clone(
            &assertion_service,
        ))));

        let scheduler = CronScheduler::new(Arc::new(executor)).await?;
        scheduler.register_default_tasks(&config.worker).await?;
        scheduler.start().await?;
        tracing::info!(
            concurrency = config.worker.concurrency,
            "Background worker started"
        );
        Some(scheduler)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping scheduler...");

    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }

    tracing::info!("Assertion sync shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
