use super::signals::{ConstraintCheck, Statement, SubscoreOrigin, check_constraint, dimension_subscore};
use crate::config::ScoringConfig;
use crate::core::listing::VisionDescriptor;
use crate::core::taste::TasteModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationKind {
    Hard,
    Soft,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub statement: String,
    #[serde(default)]
    pub evidence: Option<String>,
    /// Points removed from the score by this violation.
    pub penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscoreSource {
    Signal,
    Derived,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub subscore: f64,
    pub weight: f64,
    pub contribution: f64,
    pub source: SubscoreSource,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentFitResult {
    /// 0-100
    pub score: f64,
    /// No hard constraint was violated.
    pub passed: bool,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub dimension_breakdown: BTreeMap<String, DimensionScore>,
    #[serde(default)]
    pub justification: String,
    /// Taste model version the score was computed against.
    pub taste_version: u64,
}

impl PresentFitResult {
    pub fn deal_breakers(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Hard)
    }

    /// Weighted dimension mean before any constraint penalty.
    pub fn weighted_mean(&self) -> f64 {
        self.dimension_breakdown.values().map(|d| d.contribution).sum()
    }

    pub fn strongest_dimension(&self) -> Option<&str> {
        self.dimension_breakdown
            .iter()
            .filter(|(_, d)| d.source != SubscoreSource::Neutral)
            .max_by(|a, b| a.1.subscore.total_cmp(&b.1.subscore))
            .map(|(name, _)| name.as_str())
    }

    pub fn weakest_dimension(&self) -> Option<&str> {
        self.dimension_breakdown
            .iter()
            .filter(|(_, d)| d.source != SubscoreSource::Neutral)
            .min_by(|a, b| a.1.subscore.total_cmp(&b.1.subscore))
            .map(|(name, _)| name.as_str())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Strict fit-as-is scoring of a descriptor against one taste model.
///
/// Pure: the same `(descriptor, model)` pair always yields the same result.
#[derive(Debug, Clone, Default)]
pub struct PresentFitEvaluator {
    policy: ScoringConfig,
}

impl PresentFitEvaluator {
    pub fn new(policy: ScoringConfig) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, descriptor: &VisionDescriptor, model: &TasteModel) -> PresentFitResult {
        let breakdown = self.breakdown(descriptor, model);
        let base: f64 = breakdown.values().map(|d| d.contribution).sum();

        let mut violations = Vec::new();
        let mut hard_count = 0usize;
        for constraint in &model.hard_constraints {
            if let ConstraintCheck::Violated(evidence) =
                check_constraint(&Statement::parse(constraint), descriptor)
            {
                hard_count += 1;
                violations.push(Violation {
                    kind: ViolationKind::Hard,
                    statement: constraint.clone(),
                    evidence,
                    penalty: 0.0,
                });
            }
        }

        let mut score = base;
        if hard_count > 0 {
            score = base * self.policy.hard_violation_factor
                - self.policy.hard_violation_penalty * (hard_count - 1) as f64;
            let total = base - score;
            let per = total / hard_count as f64;
            for violation in &mut violations {
                violation.penalty = round2(per);
            }
        }

        for constraint in &model.soft_constraints {
            if let ConstraintCheck::Violated(evidence) =
                check_constraint(&Statement::parse(constraint), descriptor)
            {
                score -= self.policy.soft_penalty;
                violations.push(Violation {
                    kind: ViolationKind::Soft,
                    statement: constraint.clone(),
                    evidence,
                    penalty: self.policy.soft_penalty,
                });
            }
        }

        let patterns: Vec<Statement> = model
            .violation_patterns
            .iter()
            .map(|p| Statement::parse(p))
            .collect();
        for flag in &descriptor.red_flags {
            if let Some(pattern) = patterns.iter().find(|p| p.matches(flag)) {
                score -= self.policy.pattern_penalty;
                violations.push(Violation {
                    kind: ViolationKind::Pattern,
                    statement: pattern.text.clone(),
                    evidence: Some(flag.clone()),
                    penalty: self.policy.pattern_penalty,
                });
            }
        }

        let score = round2(score.clamp(0.0, 100.0));
        let justification = justify(base, score, &breakdown, &violations);
        PresentFitResult {
            score,
            passed: hard_count == 0,
            violations,
            dimension_breakdown: breakdown,
            justification,
            taste_version: model.version,
        }
    }

    fn breakdown(
        &self,
        descriptor: &VisionDescriptor,
        model: &TasteModel,
    ) -> BTreeMap<String, DimensionScore> {
        model
            .weighted_dimensions
            .iter()
            .map(|(name, weight)| {
                let (subscore, source, note) = match dimension_subscore(name, descriptor) {
                    Some((value, SubscoreOrigin::Signal)) => (value, SubscoreSource::Signal, None),
                    Some((value, SubscoreOrigin::Derived)) => {
                        (value, SubscoreSource::Derived, None)
                    }
                    None => (
                        self.policy.neutral_subscore,
                        SubscoreSource::Neutral,
                        Some(format!("no evidence for {name}; neutral midpoint used")),
                    ),
                };
                (
                    name.clone(),
                    DimensionScore {
                        subscore,
                        weight: *weight,
                        contribution: weight * subscore,
                        source,
                        note,
                    },
                )
            })
            .collect()
    }
}

fn justify(
    base: f64,
    score: f64,
    breakdown: &BTreeMap<String, DimensionScore>,
    violations: &[Violation],
) -> String {
    let mut parts = vec![format!(
        "Weighted base {base:.1} across {} dimensions.",
        breakdown.len()
    )];

    let mut evidenced: Vec<(&String, &DimensionScore)> = breakdown
        .iter()
        .filter(|(_, d)| d.source != SubscoreSource::Neutral)
        .collect();
    evidenced.sort_by(|a, b| b.1.subscore.total_cmp(&a.1.subscore).then_with(|| a.0.cmp(b.0)));
    if let (Some(best), Some(worst)) = (evidenced.first(), evidenced.last()) {
        parts.push(format!(
            "Strongest {} ({:.0}), weakest {} ({:.0}).",
            best.0, best.1.subscore, worst.0, worst.1.subscore
        ));
    }

    let neutral = breakdown.len() - evidenced.len();
    if neutral > 0 {
        parts.push(format!("{neutral} dimension(s) lacked evidence and scored neutral."));
    }

    let hard: Vec<&str> = violations
        .iter()
        .filter(|v| v.kind == ViolationKind::Hard)
        .map(|v| v.statement.as_str())
        .collect();
    if !hard.is_empty() {
        parts.push(format!("Deal-breaker(s): {}.", hard.join("; ")));
    }
    let soft = violations.iter().filter(|v| v.kind == ViolationKind::Soft).count();
    if soft > 0 {
        parts.push(format!("{soft} soft constraint(s) unmet."));
    }
    let pattern = violations.iter().filter(|v| v.kind == ViolationKind::Pattern).count();
    if pattern > 0 {
        parts.push(format!("{pattern} red flag(s) match learned violation patterns."));
    }

    parts.push(format!("Final {score:.1}."));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::listing::{LightQuality, RoomEntry};

    fn two_dimension_model() -> TasteModel {
        let mut model = TasteModel::bootstrap();
        model.weighted_dimensions.clear();
        model.weighted_dimensions.insert("natural_light".into(), 0.6);
        model.weighted_dimensions.insert("kitchen_quality".into(), 0.4);
        model
    }

    fn signals(light: f64, kitchen: f64) -> VisionDescriptor {
        let mut descriptor = VisionDescriptor::default();
        descriptor.dimension_signals.insert("natural_light".into(), light);
        descriptor.dimension_signals.insert("kitchen_quality".into(), kitchen);
        descriptor
    }

    #[test]
    fn weighted_sum_without_violations() {
        let result = PresentFitEvaluator::default().evaluate(&signals(90.0, 40.0), &two_dimension_model());
        assert!((result.score - 70.0).abs() < 1e-6);
        assert!(result.passed);
        assert!(result.violations.is_empty());
        assert_eq!(result.taste_version, 1);
        assert_eq!(result.strongest_dimension(), Some("natural_light"));
    }

    #[test]
    fn hard_violation_caps_score() {
        let mut model = two_dimension_model();
        model.hard_constraints.insert("no_flip_flip".into());
        let mut descriptor = signals(100.0, 100.0);
        descriptor.red_flags.push("flip pattern detected".into());

        let result = PresentFitEvaluator::default().evaluate(&descriptor, &model);
        assert!(result.score <= 30.0);
        assert!(!result.passed);
        let breaker = result.deal_breakers().next().unwrap();
        assert_eq!(breaker.evidence.as_deref(), Some("flip pattern detected"));
    }

    #[test]
    fn additional_hard_violations_stack() {
        let mut model = two_dimension_model();
        model.hard_constraints.insert("no flip".into());
        model.hard_constraints.insert("no carpet".into());
        let mut descriptor = signals(100.0, 100.0);
        descriptor.red_flags.push("obvious flip".into());
        descriptor.red_flags.push("stained carpet".into());

        let result = PresentFitEvaluator::default().evaluate(&descriptor, &model);
        assert!((result.score - 20.0).abs() < 1e-6);
    }

    #[test]
    fn soft_and_pattern_penalties_subtract() {
        let mut model = two_dimension_model();
        model.soft_constraints.insert("walk-in pantry".into());
        model.violation_patterns.push("grey vinyl plank".into());
        let mut descriptor = signals(90.0, 40.0);
        descriptor.red_flags.push("grey vinyl plank flooring throughout".into());

        let result = PresentFitEvaluator::default().evaluate(&descriptor, &model);
        assert!((result.score - (70.0 - 5.0 - 8.0)).abs() < 1e-6);
        assert!(result.passed);
        assert_eq!(result.violations.len(), 2);
    }

    #[test]
    fn missing_dimension_is_neutral_not_zero() {
        let mut model = two_dimension_model();
        model.weighted_dimensions.insert("natural_light".into(), 0.5);
        model.weighted_dimensions.insert("kitchen_quality".into(), 0.25);
        model.weighted_dimensions.insert("privacy".into(), 0.25);
        let result = PresentFitEvaluator::default().evaluate(&signals(90.0, 40.0), &model);

        let privacy = &result.dimension_breakdown["privacy"];
        assert_eq!(privacy.source, SubscoreSource::Neutral);
        assert!((privacy.subscore - 50.0).abs() < f64::EPSILON);
        assert!(privacy.note.is_some());
        assert!((result.score - (45.0 + 10.0 + 12.5)).abs() < 1e-6);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut model = TasteModel::bootstrap();
        model.hard_constraints.insert("hardwood floors".into());
        let descriptor = VisionDescriptor {
            rooms: vec![RoomEntry {
                room_type: "kitchen".into(),
                materials: vec!["laminate".into()],
                light_quality: LightQuality::Abundant,
                condition: Some("dated".into()),
                aesthetic_quality: Some(5.0),
                notes: None,
            }],
            ..VisionDescriptor::default()
        };
        let evaluator = PresentFitEvaluator::default();
        let first = evaluator.evaluate(&descriptor, &model);
        let second = evaluator.evaluate(&descriptor, &model);
        assert_eq!(first, second);
        assert!(first.score <= 30.0);
    }
}
