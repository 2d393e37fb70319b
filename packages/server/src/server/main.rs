// Main entry point for the dispatch server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dispatch_core::domains::dispatch::SessionManager;
use dispatch_core::domains::gateway::EventGateway;
use dispatch_core::domains::geo_index::PresenceGeoIndex;
use dispatch_core::domains::presence::PresenceTracker;
use dispatch_core::kernel::{
    BaseDispatchStore, BaseRouteProvider, DispatchDeps, InMemoryDispatchStore,
    InMemoryHospitalDirectory, OpenRouteServiceClient, PostgresDispatchStore,
};
use dispatch_core::server::{build_app, AppState};
use dispatch_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dispatch_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dispatch server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Store: Postgres when configured, in-memory otherwise
    let (store, db_pool): (Arc<dyn BaseDispatchStore>, _) = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");

            (Arc::new(PostgresDispatchStore::new(pool.clone())), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            (Arc::new(InMemoryDispatchStore::new()), None)
        }
    };

    // Route provider (optional; straight-line estimates without it)
    let route_provider: Option<Arc<dyn BaseRouteProvider>> = match &config.ors_api_key {
        Some(key) => Some(Arc::new(OpenRouteServiceClient::new(
            key.clone(),
            config.ors_base_url.clone(),
            config.dispatch.dependency_timeout,
        )?)),
        None => {
            tracing::warn!("ORS_API_KEY not set, ETAs use straight-line estimates");
            None
        }
    };

    // Hospital directory
    let hospitals = match &config.hospitals_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read hospitals file {}", path))?;
            InMemoryHospitalDirectory::from_json(&raw)
                .with_context(|| format!("Failed to parse hospitals file {}", path))?
        }
        None => InMemoryHospitalDirectory::new(Vec::new()),
    };
    tracing::info!(count = hospitals.len(), "Hospital directory loaded");

    let presence = Arc::new(PresenceTracker::new());
    let gateway = EventGateway::default();
    let deps = DispatchDeps::new(
        store,
        Arc::new(PresenceGeoIndex::new(presence.clone())),
        route_provider,
        Arc::new(hospitals),
        presence,
        gateway.clone(),
        config.dispatch.clone(),
    );

    let sessions = SessionManager::new(deps);
    let restored = sessions
        .restore()
        .await
        .context("Failed to restore dispatch state")?;
    tracing::info!(
        responders = restored.responders,
        searching = restored.searching,
        "restored dispatch state"
    );

    // Drop stream channels nobody listens to any more
    let hub = gateway.hub().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = hub.cleanup().await;
            if removed > 0 {
                tracing::debug!(removed, "stream topics cleaned up");
            }
        }
    });

    // Build application
    let app = build_app(
        AppState::new(sessions.clone(), db_pool),
        &config.allowed_origins,
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    sessions.shutdown().await;
    Ok(())
}
