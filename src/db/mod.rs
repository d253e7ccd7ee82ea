use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

pub mod filtered;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS filtered_items (
        item_id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        filtered_at DATETIME NOT NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_filtered_items_at ON filtered_items (filtered_at)"#,
];

/// Opens (creating if needed) the SQLite file that records dismissed items.
pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {}", db_path.display()))?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .context("failed to apply schema")?;
    }
    tracing::debug!(target: "db", path = %db_path.display(), "database ready");

    Ok(pool)
}
