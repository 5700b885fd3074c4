use crate::core::pipeline::stage::Stage;
use crate::core::providers::narrator::Brief;
use crate::core::scoring::{PotentialResult, PresentFitResult};
use crate::error::{StaleScoreWarning, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

// ── Vision descriptor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LightQuality {
    Abundant,
    Moderate,
    Poor,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEntry {
    pub room_type: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub light_quality: LightQuality,
    #[serde(default)]
    pub condition: Option<String>,
    /// 1-10
    #[serde(default)]
    pub aesthetic_quality: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Structured description of a listing's imagery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionDescriptor {
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub positive_signals: Vec<String>,
    /// 1-10
    #[serde(default)]
    pub overall_aesthetic: Option<f64>,
    #[serde(default)]
    pub architectural_style: Option<String>,
    #[serde(default)]
    pub renovation_state: Option<String>,
    /// Direct per-dimension observations on a 0-100 scale.
    #[serde(default)]
    pub dimension_signals: BTreeMap<String, f64>,
}

fn check_range(what: &str, value: f64, low: f64, high: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::Descriptor(format!(
            "{what} = {value} outside {low}..={high}"
        )))
    }
}

impl VisionDescriptor {
    /// Structural checks applied before any evaluator sees the descriptor.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rooms.is_empty() && self.dimension_signals.is_empty() {
            return Err(ValidationError::Descriptor(
                "no rooms and no dimension signals".into(),
            ));
        }
        for (idx, room) in self.rooms.iter().enumerate() {
            if room.room_type.trim().is_empty() {
                return Err(ValidationError::Descriptor(format!(
                    "room {idx} has an empty room_type"
                )));
            }
            if let Some(quality) = room.aesthetic_quality {
                check_range(&format!("rooms[{idx}].aesthetic_quality"), quality, 1.0, 10.0)?;
            }
        }
        if let Some(overall) = self.overall_aesthetic {
            check_range("overall_aesthetic", overall, 1.0, 10.0)?;
        }
        for (name, value) in &self.dimension_signals {
            if name.trim().is_empty() {
                return Err(ValidationError::Descriptor(
                    "dimension signal with empty name".into(),
                ));
            }
            check_range(&format!("dimension_signals.{name}"), *value, 0.0, 100.0)?;
        }
        Ok(())
    }
}

// ── Listing metadata ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingMetadata {
    pub address: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    pub sqft: Option<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

// ── Feedback ───────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Verdict {
    Liked,
    Disliked,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserVerdict {
    pub verdict: Verdict,
    #[serde(default)]
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

// ── Stage bookkeeping ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Provider,
    Validation,
    Internal,
}

/// Terminal error recorded for one stage of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Brief together with the taste version of the present-fit it summarized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBrief {
    pub brief: Brief,
    pub taste_version: u64,
}

// ── Listing evaluation record ──────────────────────────────────────────────

/// Accumulated per-listing state. Only the orchestrator writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub listing_id: String,
    pub metadata: ListingMetadata,
    #[serde(default)]
    pub vision_descriptor: Option<VisionDescriptor>,
    #[serde(default)]
    pub present_fit: Option<PresentFitResult>,
    /// Superseded present-fit results, oldest first.
    #[serde(default)]
    pub present_fit_history: Vec<PresentFitResult>,
    #[serde(default)]
    pub potential: Option<PotentialResult>,
    #[serde(default)]
    pub brief: Option<StoredBrief>,
    #[serde(default)]
    pub user_verdict: Option<UserVerdict>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub stage_completed_at: BTreeMap<Stage, DateTime<Utc>>,
    #[serde(default)]
    pub stage_failures: BTreeMap<Stage, StageFailure>,
    pub ingested_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn new(listing_id: impl Into<String>, metadata: ListingMetadata) -> Self {
        Self {
            listing_id: listing_id.into(),
            metadata,
            vision_descriptor: None,
            present_fit: None,
            present_fit_history: Vec::new(),
            potential: None,
            brief: None,
            user_verdict: None,
            annotations: Vec::new(),
            stage_completed_at: BTreeMap::new(),
            stage_failures: BTreeMap::new(),
            ingested_at: Utc::now(),
        }
    }

    pub fn has_images(&self) -> bool {
        !self.metadata.image_urls.is_empty()
    }

    pub fn taste_model_version_used(&self) -> Option<u64> {
        self.present_fit.as_ref().map(|r| r.taste_version)
    }

    /// A present-fit result exists but predates `current_version`.
    pub fn is_stale(&self, current_version: u64) -> bool {
        self.taste_model_version_used()
            .is_some_and(|used| used < current_version)
    }

    pub fn stale_warning(&self, current_version: u64) -> Option<StaleScoreWarning> {
        let scored_version = self.taste_model_version_used()?;
        (scored_version < current_version).then(|| StaleScoreWarning {
            listing_id: self.listing_id.clone(),
            scored_version,
            current_version,
        })
    }

    /// Whether `stage` has no current output for `current_version`.
    pub fn needs(&self, stage: Stage, current_version: u64) -> bool {
        match stage {
            Stage::Vision => self.vision_descriptor.is_none(),
            Stage::PresentFit => self
                .taste_model_version_used()
                .is_none_or(|used| used < current_version),
            Stage::Potential => self.potential.is_none(),
            Stage::Brief => match (&self.brief, self.taste_model_version_used()) {
                (Some(brief), Some(used)) => brief.taste_version < used || used < current_version,
                _ => true,
            },
        }
    }

    pub fn is_current(&self, current_version: u64) -> bool {
        Stage::ALL.iter().all(|s| !self.needs(*s, current_version))
    }

    /// Replace the present-fit result, keeping the previous one as history.
    pub(crate) fn replace_present_fit(&mut self, result: PresentFitResult) {
        if let Some(previous) = self.present_fit.take() {
            self.present_fit_history.push(previous);
        }
        self.present_fit = Some(result);
    }

    pub(crate) fn mark_completed(&mut self, stage: Stage, at: DateTime<Utc>) {
        self.stage_completed_at.insert(stage, at);
        self.stage_failures.remove(&stage);
    }

    pub(crate) fn mark_failed(&mut self, stage: Stage, failure: StageFailure) {
        self.stage_failures.insert(stage, failure);
    }
}
