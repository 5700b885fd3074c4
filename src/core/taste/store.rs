use super::diff::TasteDiff;
use super::types::{TasteModel, TasteVersion, VersionOrigin};
use crate::core::db::{parse_timestamp, version_from_db, version_to_db};
use crate::error::{ConstraintConflictError, HearthError, Result, StoreError};
use arc_swap::ArcSwap;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

/// A taste model snapshot held for the duration of a scoring stage.
///
/// While any lease is alive, `apply` and `rollback` wait; the snapshot can
/// therefore be persisted as "scored under version N" without racing a bump.
pub struct TasteLease {
    model: Arc<TasteModel>,
    _guard: OwnedRwLockReadGuard<()>,
}

impl TasteLease {
    pub fn model(&self) -> &TasteModel {
        &self.model
    }

    pub fn version(&self) -> u64 {
        self.model.version
    }

    /// Snapshot that outlives the lease.
    pub fn snapshot(&self) -> Arc<TasteModel> {
        Arc::clone(&self.model)
    }
}

/// Versioned taste model persistence. Single writer, many readers.
pub trait PreferenceStore: Send + Sync {
    /// Latest fully-formed model. Never blocks.
    fn current(&self) -> Arc<TasteModel>;

    /// Shared lease on the current version, excluding concurrent mutation.
    fn lease(&self) -> Pin<Box<dyn Future<Output = TasteLease> + Send + '_>>;

    /// Apply `diff` against `base_version`, producing and storing the next
    /// version. On any failure the current version is unchanged.
    fn apply<'a>(
        &'a self,
        diff: &'a TasteDiff,
        base_version: u64,
        origin: VersionOrigin,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<TasteModel>>> + Send + 'a>>;

    /// Store a new version whose content equals version `target`.
    fn rollback(
        &self,
        target: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<TasteModel>>> + Send + '_>>;

    /// Every retained version, oldest first.
    fn history(&self) -> Pin<Box<dyn Future<Output = Result<Vec<TasteVersion>>> + Send + '_>>;

    fn version(
        &self,
        version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TasteVersion>>> + Send + '_>>;
}

pub struct SqlitePreferenceStore {
    pool: SqlitePool,
    current: ArcSwap<TasteModel>,
    gate: Arc<RwLock<()>>,
}

impl SqlitePreferenceStore {
    /// Open the store, bootstrapping version 1 with the default model if empty.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        Self::with_seed(pool, TasteModel::bootstrap()).await
    }

    /// Open the store, writing `seed` as version 1 only if no version exists yet.
    pub async fn with_seed(pool: SqlitePool, seed: TasteModel) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS taste_versions (
                 version    INTEGER PRIMARY KEY,
                 model      TEXT NOT NULL,
                 origin     TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        let latest = load_latest(&pool).await?;
        let model = match latest {
            Some(version) => version.model,
            None => {
                let mut seed = seed;
                seed.version = 1;
                seed.validate()?;
                insert_version(&pool, &seed, &VersionOrigin::Bootstrap).await?;
                tracing::info!(taste_version = 1, "bootstrapped taste model");
                seed
            }
        };

        Ok(Self {
            pool,
            current: ArcSwap::from_pointee(model),
            gate: Arc::new(RwLock::new(())),
        })
    }

    async fn store_next(&self, next: TasteModel, origin: VersionOrigin) -> Result<Arc<TasteModel>> {
        next.validate()?;
        insert_version(&self.pool, &next, &origin).await?;
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Ok(next)
    }
}

async fn insert_version(pool: &SqlitePool, model: &TasteModel, origin: &VersionOrigin) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO taste_versions (version, model, origin, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(version_to_db(model.version))
    .bind(serde_json::to_string(model)?)
    .bind(serde_json::to_string(origin)?)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn load_latest(pool: &SqlitePool) -> Result<Option<TasteVersion>> {
    let row = sqlx::query(
        "SELECT version, model, origin, created_at
         FROM taste_versions ORDER BY version DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    row.map(|r| map_version_row(&r)).transpose()
}

fn map_version_row(row: &SqliteRow) -> Result<TasteVersion> {
    let version: i64 = row.try_get("version")?;
    let model_json: String = row.try_get("model")?;
    let origin_json: String = row.try_get("origin")?;
    let created_at: String = row.try_get("created_at")?;

    let model: TasteModel = serde_json::from_str(&model_json)?;
    let version = version_from_db(version);
    if model.version != version {
        return Err(StoreError::Corrupt {
            what: "taste version",
            message: format!("row {version} holds model v{}", model.version),
        }
        .into());
    }
    Ok(TasteVersion {
        version,
        model,
        origin: serde_json::from_str(&origin_json)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

impl PreferenceStore for SqlitePreferenceStore {
    fn current(&self) -> Arc<TasteModel> {
        self.current.load_full()
    }

    fn lease(&self) -> Pin<Box<dyn Future<Output = TasteLease> + Send + '_>> {
        Box::pin(async move {
            let guard = Arc::clone(&self.gate).read_owned().await;
            TasteLease {
                model: self.current.load_full(),
                _guard: guard,
            }
        })
    }

    fn apply<'a>(
        &'a self,
        diff: &'a TasteDiff,
        base_version: u64,
        origin: VersionOrigin,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<TasteModel>>> + Send + 'a>> {
        Box::pin(async move {
            let _write = self.gate.write().await;
            let base = self.current.load_full();
            if base.version != base_version {
                return Err(ConstraintConflictError::VersionMismatch {
                    expected: base_version,
                    actual: base.version,
                }
                .into());
            }

            let next = match diff.apply_to(&base) {
                Ok(next) => next,
                Err(err) => {
                    tracing::warn!(taste_version = base.version, error = %err, "taste diff rejected");
                    return Err(err.into());
                }
            };
            let next = self.store_next(next, origin).await?;
            tracing::info!(
                from = base.version,
                taste_version = next.version,
                ops = diff.ops.len(),
                "taste model updated"
            );
            Ok(next)
        })
    }

    fn rollback(
        &self,
        target: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<TasteModel>>> + Send + '_>> {
        Box::pin(async move {
            let _write = self.gate.write().await;
            let restored = self
                .version(target)
                .await?
                .ok_or_else(|| HearthError::not_found("taste version", target.to_string()))?;

            let base = self.current.load_full();
            let mut next = restored.model;
            next.version = base.version + 1;
            let next = self
                .store_next(
                    next,
                    VersionOrigin::Rollback {
                        restored_version: target,
                    },
                )
                .await?;
            tracing::info!(
                from = base.version,
                restored = target,
                taste_version = next.version,
                "taste model rolled back"
            );
            Ok(next)
        })
    }

    fn history(&self) -> Pin<Box<dyn Future<Output = Result<Vec<TasteVersion>>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT version, model, origin, created_at
                 FROM taste_versions ORDER BY version ASC",
            )
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_version_row).collect()
        })
    }

    fn version(
        &self,
        version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TasteVersion>>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT version, model, origin, created_at
                 FROM taste_versions WHERE version = $1",
            )
            .bind(version_to_db(version))
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_version_row(&r)).transpose()
        })
    }
}
