pub mod builder;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod phrase;
pub mod serialize;
pub mod server;
pub mod state;
pub mod telemetry;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the relay service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}
