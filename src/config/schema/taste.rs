use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Present-fit scoring policy.
///
/// A hard-constraint violation multiplies the weighted base score by
/// `hard_violation_factor` and subtracts `hard_violation_penalty` for every
/// additional violation, so one deal-breaker caps the score at
/// `100 × hard_violation_factor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_hard_violation_factor")]
    pub hard_violation_factor: f64,
    #[serde(default = "default_hard_violation_penalty")]
    pub hard_violation_penalty: f64,
    #[serde(default = "default_soft_penalty")]
    pub soft_penalty: f64,
    #[serde(default = "default_pattern_penalty")]
    pub pattern_penalty: f64,
    #[serde(default = "default_neutral_subscore")]
    pub neutral_subscore: f64,
    /// Score at or above which a listing counts as "high" in the ranking quadrants.
    #[serde(default = "default_quadrant_threshold")]
    pub quadrant_threshold: f64,
}

/// Largest factor that still keeps a single deal-breaker at or below 30.
pub const MAX_HARD_VIOLATION_FACTOR: f64 = 0.3;

fn default_hard_violation_factor() -> f64 {
    MAX_HARD_VIOLATION_FACTOR
}
fn default_hard_violation_penalty() -> f64 {
    10.0
}
fn default_soft_penalty() -> f64 {
    5.0
}
fn default_pattern_penalty() -> f64 {
    8.0
}
fn default_neutral_subscore() -> f64 {
    50.0
}
fn default_quadrant_threshold() -> f64 {
    60.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hard_violation_factor: default_hard_violation_factor(),
            hard_violation_penalty: default_hard_violation_penalty(),
            soft_penalty: default_soft_penalty(),
            pattern_penalty: default_pattern_penalty(),
            neutral_subscore: default_neutral_subscore(),
            quadrant_threshold: default_quadrant_threshold(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_HARD_VIOLATION_FACTOR).contains(&self.hard_violation_factor) {
            return Err(ConfigError::Validation(format!(
                "scoring.hard_violation_factor {} outside 0.0..={MAX_HARD_VIOLATION_FACTOR}",
                self.hard_violation_factor
            )));
        }
        for (name, value) in [
            ("hard_violation_penalty", self.hard_violation_penalty),
            ("soft_penalty", self.soft_penalty),
            ("pattern_penalty", self.pattern_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "scoring.{name} must be a non-negative number"
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.neutral_subscore) {
            return Err(ConfigError::Validation(
                "scoring.neutral_subscore outside 0..=100".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.quadrant_threshold) {
            return Err(ConfigError::Validation(
                "scoring.quadrant_threshold outside 0..=100".into(),
            ));
        }
        Ok(())
    }
}

/// Taste evolution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Contradictions that must cite the same dimension or issue before a proposal.
    #[serde(default = "default_min_pattern_support")]
    pub min_pattern_support: usize,
    /// Most recent verdicts considered in one review.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// A liked listing scored below this was under-predicted.
    #[serde(default = "default_like_threshold")]
    pub like_threshold: f64,
    /// A disliked listing scored at or above this was over-predicted.
    #[serde(default = "default_dislike_threshold")]
    pub dislike_threshold: f64,
    #[serde(default = "default_weight_step")]
    pub weight_step: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
}

fn default_min_pattern_support() -> usize {
    3
}
fn default_window_size() -> usize {
    20
}
fn default_like_threshold() -> f64 {
    60.0
}
fn default_dislike_threshold() -> f64 {
    50.0
}
fn default_weight_step() -> f64 {
    0.05
}
fn default_max_weight() -> f64 {
    0.6
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_pattern_support: default_min_pattern_support(),
            window_size: default_window_size(),
            like_threshold: default_like_threshold(),
            dislike_threshold: default_dislike_threshold(),
            weight_step: default_weight_step(),
            max_weight: default_max_weight(),
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_pattern_support < 2 {
            return Err(ConfigError::Validation(
                "evolution.min_pattern_support must be at least 2".into(),
            ));
        }
        if self.window_size < self.min_pattern_support {
            return Err(ConfigError::Validation(
                "evolution.window_size must be >= min_pattern_support".into(),
            ));
        }
        if !(self.weight_step > 0.0 && self.weight_step <= 0.5) {
            return Err(ConfigError::Validation(
                "evolution.weight_step must be in (0, 0.5]".into(),
            ));
        }
        if !(self.max_weight > 0.0 && self.max_weight <= 1.0) {
            return Err(ConfigError::Validation(
                "evolution.max_weight must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}
