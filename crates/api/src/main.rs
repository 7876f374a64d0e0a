use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use labflow_core::engine::WorkflowEngine;
use labflow_db::PgWorkflowStore;
use labflow_events::{EventBus, StatusHistoryRecorder};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labflow_api::config::ServerConfig;
use labflow_api::functions::FunctionsClient;
use labflow_api::router::build_app_router;
use labflow_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = labflow_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    labflow_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    labflow_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Workflow engine ---
    let engine = WorkflowEngine::new(Arc::new(PgWorkflowStore::new(pool.clone())));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let history_handle = tokio::spawn(StatusHistoryRecorder::run(
        pool.clone(),
        event_bus.subscribe(),
    ));
    tracing::info!("Status history recorder started");

    // --- Serverless functions ---
    let functions =
        FunctionsClient::new(&config.functions).expect("Failed to build functions HTTP client");
    if !functions.is_configured() {
        tracing::warn!("FUNCTIONS_BASE_URL is not set; staff accounts and images are disabled");
    }

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus: Arc::clone(&event_bus),
        functions: Arc::new(functions),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Dropping the last sender closes the channel and stops the recorder.
    // Open change feeds hold only receivers.
    drop(event_bus);
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, history_handle).await.is_err() {
        tracing::warn!("Status history recorder did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
