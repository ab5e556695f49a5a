use clap::Parser;
use incident_ledger::{
    api::{build_router, AppState},
    cache::create_cache,
    config::Config,
    service::{IncidentService, ServiceConfig},
    state::create_store,
    telemetry,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

#[derive(Parser)]
#[command(name = "incident-ledger", version, about = "Incident ledger HTTP server")]
struct Args {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    telemetry::init(&config.observability)?;

    tracing::info!("Starting incident-ledger v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage backend
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state).await?;
    tracing::info!("Storage backend initialized");

    // Initialize listing cache
    tracing::info!("Cache backend: {:?}", config.cache.backend);
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Listing cache initialized");

    let service = Arc::new(IncidentService::with_config(
        store,
        cache,
        ServiceConfig {
            listing_ttl: config.cache.listing_ttl(),
        },
    ));

    let app = build_router(AppState::new(service.clone())).layer(TimeoutLayer::new(
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    // Start HTTP server
    let http_addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Incidents: http://{}/incident/get", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully...");
    service.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
