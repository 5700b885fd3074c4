use super::diff::TasteDiff;
use crate::core::db::{parse_timestamp, version_from_db, version_to_db};
use crate::core::listing::Verdict;
use crate::error::{HearthError, ProposalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use strum::{Display, EnumString};
use uuid::Uuid;

// ProposalStatus: none → proposed → {approved, rejected}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Proposed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Contradiction {
    /// Liked, but scored below the like threshold.
    UnderPredicted,
    /// Disliked, but scored at or above the dislike threshold.
    OverPredicted,
}

/// Which way a cited dimension's weight moves to shrink the miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeightShift {
    Raise,
    Lower,
}

impl WeightShift {
    /// Raising a weight pulls the weighted mean toward that dimension's
    /// sub-score, so the shift depends on which side of the mean it sits.
    pub fn toward_verdict(contradiction: Contradiction, subscore: f64, weighted_mean: f64) -> Option<Self> {
        let above = match subscore.partial_cmp(&weighted_mean)? {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => return None,
        };
        Some(match (contradiction, above) {
            (Contradiction::UnderPredicted, true) | (Contradiction::OverPredicted, false) => Self::Raise,
            _ => Self::Lower,
        })
    }
}

/// One (listing, predicted score, verdict) observation behind a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBasis {
    pub listing_id: String,
    pub predicted_score: f64,
    pub verdict: Verdict,
    pub contradiction: Contradiction,
    #[serde(default)]
    pub cited_dimension: Option<String>,
    #[serde(default)]
    pub weight_shift: Option<WeightShift>,
    #[serde(default)]
    pub cited_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProposal {
    pub id: String,
    /// Taste version the diff was computed against.
    pub base_version: u64,
    pub basis: Vec<FeedbackBasis>,
    pub diff: TasteDiff,
    pub rationale: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    /// Version produced by applying this proposal.
    #[serde(default)]
    pub applied_version: Option<u64>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl TasteProposal {
    pub fn new(base_version: u64, basis: Vec<FeedbackBasis>, diff: TasteDiff, rationale: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            base_version,
            basis,
            diff,
            rationale,
            status: ProposalStatus::Proposed,
            created_at: Utc::now(),
            decided_at: None,
            applied_version: None,
            rejection_reason: None,
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(ProposalError::AlreadyDecided {
                id: self.id.clone(),
                status: self.status.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn approve(&mut self, applied_version: u64) -> Result<()> {
        self.ensure_pending()?;
        self.status = ProposalStatus::Approved;
        self.applied_version = Some(applied_version);
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<()> {
        self.ensure_pending()?;
        self.status = ProposalStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.decided_at = Some(Utc::now());
        Ok(())
    }
}

/// Audit log of every proposal, including rejected ones.
pub trait ProposalStore: Send + Sync {
    fn save<'a>(
        &'a self,
        proposal: &'a TasteProposal,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TasteProposal>>> + Send + 'a>>;

    /// The open proposal, if any. At most one is open at a time.
    fn pending(&self) -> Pin<Box<dyn Future<Output = Result<Option<TasteProposal>>> + Send + '_>>;

    /// Every proposal, newest first.
    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<TasteProposal>>> + Send + '_>>;
}

pub struct SqliteProposalStore {
    pool: SqlitePool,
}

impl SqliteProposalStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS taste_proposals (
                 id              TEXT PRIMARY KEY,
                 status          TEXT NOT NULL,
                 base_version    INTEGER NOT NULL,
                 applied_version INTEGER,
                 proposal        TEXT NOT NULL,
                 created_at      TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_taste_proposals_status
                 ON taste_proposals(status, created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn map_proposal_row(row: &SqliteRow) -> Result<TasteProposal> {
    let json: String = row.try_get("proposal")?;
    let mut proposal: TasteProposal = serde_json::from_str(&json)?;
    // Indexed columns are authoritative for the fields they mirror.
    let status: String = row.try_get("status")?;
    proposal.status = status
        .parse()
        .map_err(|_| HearthError::Store(crate::error::StoreError::Corrupt {
            what: "proposal status",
            message: status.clone(),
        }))?;
    let applied: Option<i64> = row.try_get("applied_version")?;
    proposal.applied_version = applied.map(version_from_db);
    let created_at: String = row.try_get("created_at")?;
    proposal.created_at = parse_timestamp(&created_at)?;
    Ok(proposal)
}

impl ProposalStore for SqliteProposalStore {
    fn save<'a>(
        &'a self,
        proposal: &'a TasteProposal,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO taste_proposals (id, status, base_version, applied_version, proposal, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     applied_version = excluded.applied_version,
                     proposal = excluded.proposal",
            )
            .bind(&proposal.id)
            .bind(proposal.status.to_string())
            .bind(version_to_db(proposal.base_version))
            .bind(proposal.applied_version.map(version_to_db))
            .bind(serde_json::to_string(proposal)?)
            .bind(proposal.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TasteProposal>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT status, applied_version, proposal, created_at
                 FROM taste_proposals WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_proposal_row(&r)).transpose()
        })
    }

    fn pending(&self) -> Pin<Box<dyn Future<Output = Result<Option<TasteProposal>>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT status, applied_version, proposal, created_at
                 FROM taste_proposals WHERE status = 'proposed'
                 ORDER BY created_at DESC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_proposal_row(&r)).transpose()
        })
    }

    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<TasteProposal>>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT status, applied_version, proposal, created_at
                 FROM taste_proposals ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_proposal_row).collect()
        })
    }
}
