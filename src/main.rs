use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use nova_act_api::config::{API_KEY_VAR, Cli, Config};
use nova_act_api::engine::BrowserAgent;
use nova_act_api::pool::{POOL_SIZE, WorkerPool};
use nova_act_api::server::{AppState, serve};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = Config::from_env(Cli::parse());
    if config.api_key.is_none() {
        warn!("{API_KEY_VAR} is not set; /agent/run will report a configuration error");
    }

    let state = AppState::new(
        Arc::new(config),
        Arc::new(WorkerPool::new(POOL_SIZE)),
        Arc::new(BrowserAgent::new()),
    );

    serve(state).await
}
