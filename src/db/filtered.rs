use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{sqlite::SqlitePool, FromRow};

use crate::{domain::Item, tasks::action::ActionHandler};

/// Records dismissed items. This is the pipeline's action handler: marking
/// an item as filtered means persisting it here.
#[derive(Clone)]
pub struct FilteredRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow)]
pub struct FilteredEntry {
    pub item_id: String,
    pub text: String,
    pub filtered_at: DateTime<Utc>,
}

impl FilteredRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn record(&self, item: &Item) -> Result<bool> {
        let affected = sqlx::query(
            r#"INSERT OR REPLACE INTO filtered_items (item_id, text, filtered_at)
                VALUES (?1, ?2, ?3)"#,
        )
        .bind(&item.id)
        .bind(&item.text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to record filtered item {}", item.id))?
        .rows_affected();
        Ok(affected > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM filtered_items"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<FilteredEntry>> {
        let rows = sqlx::query_as::<_, FilteredEntry>(
            r#"SELECT item_id, text, filtered_at FROM filtered_items
                ORDER BY filtered_at DESC, item_id ASC LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl ActionHandler for FilteredRepository {
    fn apply<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.record(item))
    }
}
