//! # Honey Realtime
//!
//! Realtime chat server for the Honey platform.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool
//! - Optional Redis relay
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use honey_realtime::config::Settings;
use honey_realtime::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    honey_realtime::telemetry::init_tracing();

    info!("Starting Honey realtime server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        relay = settings.fabric.relay_enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
