use std::{io, path::Path};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "filter.log";
// HTTP and SQL internals drown the pipeline events at debug level.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "reqwest=warn", "sqlx=warn", "teloxide=warn"];

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

pub fn init_tracing(config: &LoggingConfig, logs_dir: &Path) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(build_filter(&config.level))
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(target: "app", logs = %logs_dir.display(), "tracing initialized");
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level with noisy crates capped.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn directives(level: &str) -> String {
    let mut parts = vec![level.trim().to_string()];
    parts.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    parts.join(",")
}
