use anyhow::Context;
use std::sync::Arc;
use voting_api::{config::Config, create_router, services::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let provider = telemetry::init_tracing(&config.telemetry)?;

    tracing::info!(environment = %config.environment, "Starting voting API");
    if config.uses_dev_jwt_secret() {
        tracing::warn!("Using the development JWT secret, set APP__AUTH__JWT_SECRET outside local runs");
    }

    let mongo_client = mongodb::Client::with_uri_str(&config.database.mongo_uri)
        .await
        .context("Failed to create MongoDB client")?;
    tracing::info!("MongoDB client created");

    let bind_address = config.bind_address();
    let app_state = Arc::new(
        AppState::new(config, mongo_client)
            .await
            .context("Failed to initialize application state")?,
    );

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    telemetry::shutdown_tracing(provider);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
