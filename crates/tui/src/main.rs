mod app;
mod console;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use teams_core::{
    config::{self, AppConfig},
    host::MemoryHost,
    TeamService,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let mut service = TeamService::from_config(&config)?;
    let loaded = service
        .load()
        .with_context(|| format!("failed to load {}", config.teams_path().display()))?;
    tracing::info!("Loaded {loaded} teams");

    let host = MemoryHost::new(config.server_version()?);
    let mut app = app::TeamsApp::new(service, host, loaded);
    app.run().await
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("teams.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let fallback = if config.debug_mode { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // stdout belongs to the terminal UI, so only the file gets events.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
