use super::address::normalize_address;
use super::types::ListingRecord;
use crate::core::db::version_to_db;
use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;

/// Listing record persistence keyed by listing id.
///
/// Every write replaces one whole record atomically. Currency columns are
/// derived from the record on write so "exists and current" checks never
/// deserialize a record.
pub trait ListingStore: Send + Sync {
    fn get<'a>(
        &'a self,
        listing_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ListingRecord>>> + Send + 'a>>;

    fn put<'a>(
        &'a self,
        record: &'a ListingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Insert unless a listing with the same normalized address exists.
    /// Returns `false` for a duplicate.
    fn insert_new<'a>(
        &'a self,
        record: &'a ListingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    fn find_by_address<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ListingRecord>>> + Send + 'a>>;

    /// Remove a listing and everything recorded for it. Returns `false`
    /// when no such listing exists.
    fn delete<'a>(
        &'a self,
        listing_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ListingRecord>>> + Send + '_>>;

    /// Ids of listings with images and at least one missing or stale stage.
    fn pending_ids(
        &self,
        current_version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;

    /// Listings carrying a verdict, most recent verdict first.
    fn recent_verdicts(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ListingRecord>>> + Send + '_>>;
}

pub struct SqliteListingStore {
    pool: SqlitePool,
}

impl SqliteListingStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS listings (
                 listing_id          TEXT PRIMARY KEY,
                 address_key         TEXT NOT NULL,
                 record              TEXT NOT NULL,
                 has_images          INTEGER NOT NULL,
                 has_vision          INTEGER NOT NULL,
                 present_fit_version INTEGER,
                 has_potential       INTEGER NOT NULL,
                 brief_version       INTEGER,
                 verdict_at          TEXT,
                 updated_at          TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_listings_address_key
                 ON listings(address_key)",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_listings_verdict_at ON listings(verdict_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_record_row(row: &SqliteRow) -> Result<ListingRecord> {
    let json: String = row.try_get("record")?;
    Ok(serde_json::from_str(&json)?)
}

async fn write_record(pool: &SqlitePool, record: &ListingRecord, upsert: bool) -> Result<bool> {
    let sql = if upsert {
        "INSERT INTO listings (
             listing_id, address_key, record, has_images, has_vision,
             present_fit_version, has_potential, brief_version, verdict_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT(listing_id) DO UPDATE SET
             address_key = excluded.address_key,
             record = excluded.record,
             has_images = excluded.has_images,
             has_vision = excluded.has_vision,
             present_fit_version = excluded.present_fit_version,
             has_potential = excluded.has_potential,
             brief_version = excluded.brief_version,
             verdict_at = excluded.verdict_at,
             updated_at = excluded.updated_at"
    } else {
        "INSERT OR IGNORE INTO listings (
             listing_id, address_key, record, has_images, has_vision,
             present_fit_version, has_potential, brief_version, verdict_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    };

    let result = sqlx::query(sql)
        .bind(&record.listing_id)
        .bind(normalize_address(&record.metadata.address))
        .bind(serde_json::to_string(record)?)
        .bind(record.has_images())
        .bind(record.vision_descriptor.is_some())
        .bind(record.taste_model_version_used().map(version_to_db))
        .bind(record.potential.is_some())
        .bind(record.brief.as_ref().map(|b| version_to_db(b.taste_version)))
        .bind(
            record
                .user_verdict
                .as_ref()
                .map(|v| v.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        )
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

impl ListingStore for SqliteListingStore {
    fn get<'a>(
        &'a self,
        listing_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ListingRecord>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT record FROM listings WHERE listing_id = $1")
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|r| map_record_row(&r)).transpose()
        })
    }

    fn put<'a>(
        &'a self,
        record: &'a ListingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            write_record(&self.pool, record, true).await?;
            Ok(())
        })
    }

    fn insert_new<'a>(
        &'a self,
        record: &'a ListingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move { write_record(&self.pool, record, false).await })
    }

    fn find_by_address<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ListingRecord>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT record FROM listings WHERE address_key = $1")
                .bind(normalize_address(address))
                .fetch_optional(&self.pool)
                .await?;
            row.map(|r| map_record_row(&r)).transpose()
        })
    }

    fn delete<'a>(
        &'a self,
        listing_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM listings WHERE listing_id = $1")
                .bind(listing_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ListingRecord>>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query("SELECT record FROM listings ORDER BY listing_id ASC")
                .fetch_all(&self.pool)
                .await?;
            rows.iter().map(map_record_row).collect()
        })
    }

    fn pending_ids(
        &self,
        current_version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT listing_id FROM listings
                 WHERE has_images = 1
                   AND (has_vision = 0
                        OR has_potential = 0
                        OR present_fit_version IS NULL
                        OR present_fit_version < $1
                        OR brief_version IS NULL
                        OR brief_version < $1)
                 ORDER BY listing_id ASC",
            )
            .bind(version_to_db(current_version))
            .fetch_all(&self.pool)
            .await?;
            rows.iter()
                .map(|r| r.try_get::<String, _>("listing_id").map_err(Into::into))
                .collect()
        })
    }

    fn recent_verdicts(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ListingRecord>>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT record FROM listings
                 WHERE verdict_at IS NOT NULL
                 ORDER BY verdict_at DESC, listing_id ASC
                 LIMIT $1",
            )
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_record_row).collect()
        })
    }
}
