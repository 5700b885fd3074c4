use crate::config::Config;
use crate::error::StoreError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS hearth_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "schema_version";
const SCHEMA_VERSION: u32 = 1;

/// Open (creating if needed) the workspace database.
pub async fn open_pool(config: &Config) -> Result<SqlitePool> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(config.storage.max_connections.max(1))
        .connect(&url)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    ensure_schema_version(&pool).await?;
    Ok(pool)
}

/// Record the schema version on a fresh database and refuse a mismatched one.
pub async fn ensure_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create hearth_schema_meta table")?;

    let stored: Option<(String,)> =
        sqlx::query_as("SELECT value FROM hearth_schema_meta WHERE key = $1")
            .bind(SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load schema version")?;

    if let Some((value,)) = stored {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == SCHEMA_VERSION,
            "incompatible database schema version: stored={parsed}, expected={SCHEMA_VERSION}"
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO hearth_schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist schema version")?;
    Ok(())
}

pub(crate) fn version_to_db(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

pub(crate) fn version_from_db(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt {
            what: "timestamp",
            message: format!("{raw}: {err}"),
        })
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ensure_schema_version(&pool).await.unwrap();
    pool
}
