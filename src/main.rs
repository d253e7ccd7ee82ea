mod ai;
mod app;
mod config;
mod db;
mod domain;
mod infrastructure;
mod tasks;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, &config.feed)?;
    logging::init_tracing(&config.logging, &paths.logs_dir)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::FilterApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
