use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use lectern::auth::{LogMailer, OAuthClient};
use lectern::{Config, Stores};
use lectern_server::{build_app, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real deployments set the environment directly
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lectern=debug")),
        )
        .init();

    info!("lectern starting...");

    let config = Config::load_default().context("Failed to load config")?;
    info!(
        port = config.server.port,
        prefix = %config.api_prefix(),
        environment = %config.server.environment,
        "configuration loaded"
    );

    let stores = Stores::connect(&config.database).await?;
    if config.database.bootstrap_schema {
        stores.bootstrap().await?;
        info!("schema bootstrapped");
    }

    let identity = OAuthClient::new(config.oauth.clone()).context("Failed to build OAuth client")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, stores.clone(), Arc::new(LogMailer), Arc::new(identity));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    stores.close().await;
    info!("lectern stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
