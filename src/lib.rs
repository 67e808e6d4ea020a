pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod query;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod template;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the GCMQ service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config)?.run().await
}
