use crate::error::ConstraintConflictError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};

/// Tolerance on the weight-sum invariant.
pub const WEIGHT_EPSILON: f64 = 1e-6;

// Sentiment: which exemplar sequence a listing reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sentiment {
    Liked,
    Disliked,
}

// RenovationTolerance: how much work the user is willing to take on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RenovationTolerance {
    None,
    Light,
    #[default]
    Medium,
    Heavy,
}

// StatementField: free-text fields a diff can add to or supersede in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatementField {
    Principles,
    AntiPrinciples,
    HardConstraints,
    SoftConstraints,
    ViolationPatterns,
}

/// Calibration anchor pointing at a previously evaluated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemplarRef {
    pub listing_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exemplars {
    #[serde(default)]
    pub liked: Vec<ExemplarRef>,
    #[serde(default)]
    pub disliked: Vec<ExemplarRef>,
}

impl Exemplars {
    pub fn for_sentiment(&self, sentiment: Sentiment) -> &[ExemplarRef] {
        match sentiment {
            Sentiment::Liked => &self.liked,
            Sentiment::Disliked => &self.disliked,
        }
    }

    pub(crate) fn for_sentiment_mut(&mut self, sentiment: Sentiment) -> &mut Vec<ExemplarRef> {
        match sentiment {
            Sentiment::Liked => &mut self.liked,
            Sentiment::Disliked => &mut self.disliked,
        }
    }
}

/// Marker left behind when a statement is retired from an active field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supersession {
    pub field: StatementField,
    pub text: String,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub reason: String,
    /// Version in which the statement stopped being active.
    pub version: u64,
}

/// The single mutable preference object. Every accepted mutation produces a
/// new value with `version + 1`; older values are kept by the preference store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteModel {
    pub version: u64,
    #[serde(default)]
    pub principles: Vec<String>,
    #[serde(default)]
    pub anti_principles: Vec<String>,
    pub weighted_dimensions: BTreeMap<String, f64>,
    #[serde(default)]
    pub dimension_descriptions: BTreeMap<String, String>,
    #[serde(default)]
    pub hard_constraints: BTreeSet<String>,
    #[serde(default)]
    pub soft_constraints: BTreeSet<String>,
    #[serde(default)]
    pub exemplars: Exemplars,
    #[serde(default)]
    pub violation_patterns: Vec<String>,
    #[serde(default)]
    pub superseded: Vec<Supersession>,
    #[serde(default)]
    pub renovation_tolerance: RenovationTolerance,
    #[serde(default)]
    pub renovation_budget_max: Option<u64>,
    #[serde(default)]
    pub notes: String,
}

const DEFAULT_DIMENSIONS: [(&str, f64, &str); 10] = [
    (
        "natural_light",
        0.15,
        "Quality and abundance of natural light",
    ),
    (
        "materials_quality",
        0.15,
        "Quality of visible materials and finishes",
    ),
    ("layout_flow", 0.12, "How well spaces flow and connect"),
    (
        "architectural_character",
        0.12,
        "Architectural interest and character",
    ),
    ("kitchen_quality", 0.12, "Kitchen design and functionality"),
    ("outdoor_space", 0.10, "Quality of outdoor spaces and views"),
    ("proportions", 0.08, "Room proportions and ceiling heights"),
    ("condition", 0.08, "Overall maintenance and condition"),
    ("storage", 0.04, "Storage space availability"),
    ("privacy", 0.04, "Privacy from neighbors and street"),
];

/// Answers collected by the bootstrap interview.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterviewAnswers {
    #[serde(default)]
    pub principles: Vec<String>,
    #[serde(default)]
    pub anti_principles: Vec<String>,
    #[serde(default)]
    pub hard_constraints: Vec<String>,
    #[serde(default)]
    pub soft_constraints: Vec<String>,
    #[serde(default)]
    pub renovation_tolerance: Option<RenovationTolerance>,
    #[serde(default)]
    pub renovation_budget_max: Option<u64>,
}

impl TasteModel {
    /// Version-1 model with the default ten weighted dimensions and no statements.
    pub fn bootstrap() -> Self {
        let mut weighted_dimensions = BTreeMap::new();
        let mut dimension_descriptions = BTreeMap::new();
        for (name, weight, description) in DEFAULT_DIMENSIONS {
            weighted_dimensions.insert(name.to_string(), weight);
            dimension_descriptions.insert(name.to_string(), description.to_string());
        }

        Self {
            version: 1,
            principles: Vec::new(),
            anti_principles: Vec::new(),
            weighted_dimensions,
            dimension_descriptions,
            hard_constraints: BTreeSet::new(),
            soft_constraints: BTreeSet::new(),
            exemplars: Exemplars::default(),
            violation_patterns: Vec::new(),
            superseded: Vec::new(),
            renovation_tolerance: RenovationTolerance::default(),
            renovation_budget_max: None,
            notes: String::new(),
        }
    }

    /// Bootstrap model seeded from interview answers. Blank answers are skipped.
    pub fn from_interview(answers: &InterviewAnswers) -> Self {
        fn cleaned(items: &[String]) -> impl Iterator<Item = String> + '_ {
            items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        let mut model = Self::bootstrap();
        model.principles.extend(cleaned(&answers.principles));
        model.anti_principles.extend(cleaned(&answers.anti_principles));
        model
            .hard_constraints
            .extend(cleaned(&answers.hard_constraints));
        model
            .soft_constraints
            .extend(cleaned(&answers.soft_constraints));
        if let Some(tolerance) = answers.renovation_tolerance {
            model.renovation_tolerance = tolerance;
        }
        model.renovation_budget_max = answers.renovation_budget_max;
        model
    }

    pub fn weight_sum(&self) -> f64 {
        self.weighted_dimensions.values().sum()
    }

    pub fn statements(&self, field: StatementField) -> Vec<&str> {
        match field {
            StatementField::Principles => self.principles.iter().map(String::as_str).collect(),
            StatementField::AntiPrinciples => {
                self.anti_principles.iter().map(String::as_str).collect()
            }
            StatementField::HardConstraints => {
                self.hard_constraints.iter().map(String::as_str).collect()
            }
            StatementField::SoftConstraints => {
                self.soft_constraints.iter().map(String::as_str).collect()
            }
            StatementField::ViolationPatterns => {
                self.violation_patterns.iter().map(String::as_str).collect()
            }
        }
    }

    /// Check every invariant a stored model must satisfy.
    pub fn validate(&self) -> Result<(), ConstraintConflictError> {
        if self.weighted_dimensions.is_empty() {
            return Err(ConstraintConflictError::NoDimensions);
        }
        for (dimension, weight) in &self.weighted_dimensions {
            if dimension.trim().is_empty() {
                return Err(ConstraintConflictError::EmptyStatement {
                    field: "weighted_dimensions".into(),
                });
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConstraintConflictError::InvalidWeight {
                    dimension: dimension.clone(),
                    weight: *weight,
                });
            }
        }
        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConstraintConflictError::WeightSum { sum });
        }

        for field in [
            StatementField::Principles,
            StatementField::AntiPrinciples,
            StatementField::HardConstraints,
            StatementField::SoftConstraints,
            StatementField::ViolationPatterns,
        ] {
            if self.statements(field).iter().any(|s| s.trim().is_empty()) {
                return Err(ConstraintConflictError::EmptyStatement {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Readable markdown summary of the model.
    pub fn distill(&self) -> String {
        fn section(out: &mut String, title: &str, items: &[&str]) {
            out.push_str(&format!("\n## {title}\n"));
            if items.is_empty() {
                out.push_str("(none)\n");
            }
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        }

        let mut out = format!("# Aesthetic profile (taste v{})\n", self.version);
        section(
            &mut out,
            "Principles",
            &self.statements(StatementField::Principles),
        );
        section(
            &mut out,
            "Things to avoid",
            &self.statements(StatementField::AntiPrinciples),
        );
        section(
            &mut out,
            "Deal-breakers",
            &self.statements(StatementField::HardConstraints),
        );
        section(
            &mut out,
            "Preferences",
            &self.statements(StatementField::SoftConstraints),
        );
        section(
            &mut out,
            "Learned red flags",
            &self.statements(StatementField::ViolationPatterns),
        );

        out.push_str("\n## Weighted dimensions\n");
        let mut ranked: Vec<(&String, &f64)> = self.weighted_dimensions.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, weight) in ranked {
            let description = self
                .dimension_descriptions
                .get(name)
                .map_or(String::new(), |d| format!(": {d}"));
            out.push_str(&format!("- {name} ({:.0}%){description}\n", weight * 100.0));
        }

        out.push_str(&format!(
            "\n## Renovation stance\n- Tolerance: {}\n",
            self.renovation_tolerance
        ));
        if let Some(budget) = self.renovation_budget_max {
            out.push_str(&format!("- Max budget: ${budget}\n"));
        }

        for sentiment in [Sentiment::Liked, Sentiment::Disliked] {
            let exemplars = self.exemplars.for_sentiment(sentiment);
            if exemplars.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {sentiment} exemplars\n"));
            for exemplar in exemplars {
                out.push_str(&format!("- {} {}\n", exemplar.listing_id, exemplar.reason));
            }
        }
        out
    }
}

// VersionOrigin: why a taste version exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionOrigin {
    Bootstrap,
    Proposal { proposal_id: String },
    Rollback { restored_version: u64 },
    Manual,
}

/// One retained, addressable version of the taste model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteVersion {
    pub version: u64,
    pub model: TasteModel,
    pub origin: VersionOrigin,
    pub created_at: DateTime<Utc>,
}
