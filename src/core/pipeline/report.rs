use super::stage::Stage;
use crate::core::listing::Verdict;
use crate::error::StaleScoreWarning;
use serde::Serialize;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    /// Every stage is current for the taste version in effect.
    Scored,
    /// No images; nothing to evaluate.
    Skipped,
    /// A stage failed terminally during this invocation.
    Failed,
}

/// Result of driving one listing through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ListingOutcome {
    pub listing_id: String,
    pub status: OutcomeStatus,
    /// Stages executed by this invocation, in order. Empty for a no-op run.
    pub stages_run: Vec<Stage>,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub present_fit: Option<f64>,
    pub potential: Option<f64>,
    pub taste_version: Option<u64>,
}

impl ListingOutcome {
    pub(crate) fn new(listing_id: &str, status: OutcomeStatus) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            status,
            stages_run: Vec::new(),
            failed_stage: None,
            error: None,
            present_fit: None,
            potential: None,
            taste_version: None,
        }
    }

    pub(crate) fn failed(listing_id: &str, stage: Option<Stage>, error: String) -> Self {
        Self {
            failed_stage: stage,
            error: Some(error),
            ..Self::new(listing_id, OutcomeStatus::Failed)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// One outcome per requested listing, in request order.
    pub outcomes: Vec<ListingOutcome>,
}

impl BatchReport {
    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn scored(&self) -> usize {
        self.count(OutcomeStatus::Scored)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn outcome(&self, listing_id: &str) -> Option<&ListingOutcome> {
        self.outcomes.iter().find(|o| o.listing_id == listing_id)
    }
}

// Quadrant: present-fit against potential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Quadrant {
    /// Fits now and has room to grow.
    Keeper,
    /// Fits now, little upside left.
    TurnKey,
    /// Poor fit today, strong renovation upside.
    DiamondInTheRough,
    Pass,
}

impl Quadrant {
    pub fn classify(present_fit: f64, potential: f64, threshold: f64) -> Self {
        match (present_fit >= threshold, potential >= threshold) {
            (true, true) => Self::Keeper,
            (true, false) => Self::TurnKey,
            (false, true) => Self::DiamondInTheRough,
            (false, false) => Self::Pass,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedListing {
    pub listing_id: String,
    pub address: String,
    pub present_fit: f64,
    pub passed: bool,
    pub potential: Option<f64>,
    pub quadrant: Option<Quadrant>,
    #[serde(skip)]
    pub stale: Option<StaleScoreWarning>,
    pub verdict: Option<Verdict>,
}

impl RankedListing {
    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub taste_version: u64,
    pub total: usize,
    pub without_images: usize,
    pub current: usize,
    pub pending: usize,
    pub stale: usize,
    pub with_failures: usize,
    pub with_verdicts: usize,
    /// (taste version, listings whose present-fit was scored under it)
    pub scored_by_version: Vec<(u64, usize)>,
}
