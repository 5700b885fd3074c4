use super::types::{ExemplarRef, Sentiment, StatementField, Supersession, TasteModel};
use crate::error::ConstraintConflictError;
use serde::{Deserialize, Serialize};

/// One additive or adjustive change against a taste model field.
///
/// Statements are never deleted outright; `Supersede` moves them into the
/// model's supersession log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TasteOp {
    AddPrinciple {
        text: String,
    },
    AddAntiPrinciple {
        text: String,
    },
    AddHardConstraint {
        text: String,
    },
    AddSoftConstraint {
        text: String,
    },
    AddViolationPattern {
        text: String,
    },
    AddExemplar {
        sentiment: Sentiment,
        exemplar: ExemplarRef,
    },
    SetWeight {
        dimension: String,
        weight: f64,
    },
    Supersede {
        field: StatementField,
        text: String,
        #[serde(default)]
        replacement: Option<String>,
        #[serde(default)]
        reason: String,
    },
}

impl TasteOp {
    pub fn describe(&self) -> String {
        match self {
            Self::AddPrinciple { text } => format!("+ principle: {text}"),
            Self::AddAntiPrinciple { text } => format!("+ anti-principle: {text}"),
            Self::AddHardConstraint { text } => format!("+ hard constraint: {text}"),
            Self::AddSoftConstraint { text } => format!("+ soft constraint: {text}"),
            Self::AddViolationPattern { text } => format!("+ violation pattern: {text}"),
            Self::AddExemplar {
                sentiment,
                exemplar,
            } => format!("+ {sentiment} exemplar: {}", exemplar.listing_id),
            Self::SetWeight { dimension, weight } => format!("~ weight {dimension} = {weight:.3}"),
            Self::Supersede {
                field,
                text,
                replacement,
                ..
            } => match replacement {
                Some(new) => format!("~ {field}: \"{text}\" -> \"{new}\""),
                None => format!("- {field}: \"{text}\" (superseded)"),
            },
        }
    }
}

/// A structured change set against one taste model version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteDiff {
    pub ops: Vec<TasteOp>,
}

impl TasteDiff {
    pub fn new(ops: Vec<TasteOp>) -> Self {
        Self { ops }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Produce the next model version with every op applied, or fail without
    /// touching `base`. The result has `version = base.version + 1` and has
    /// passed [`TasteModel::validate`].
    pub fn apply_to(&self, base: &TasteModel) -> Result<TasteModel, ConstraintConflictError> {
        let mut next = base.clone();
        next.version = base.version + 1;
        for op in &self.ops {
            apply_op(&mut next, op)?;
        }
        next.validate()?;
        Ok(next)
    }
}

fn non_empty<'a>(field: StatementField, text: &'a str) -> Result<&'a str, ConstraintConflictError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConstraintConflictError::EmptyStatement {
            field: field.to_string(),
        });
    }
    Ok(trimmed)
}

fn push_unique(items: &mut Vec<String>, text: &str) {
    if !items.iter().any(|existing| existing.eq_ignore_ascii_case(text)) {
        items.push(text.to_string());
    }
}

fn apply_op(model: &mut TasteModel, op: &TasteOp) -> Result<(), ConstraintConflictError> {
    match op {
        TasteOp::AddPrinciple { text } => {
            let text = non_empty(StatementField::Principles, text)?;
            push_unique(&mut model.principles, text);
        }
        TasteOp::AddAntiPrinciple { text } => {
            let text = non_empty(StatementField::AntiPrinciples, text)?;
            push_unique(&mut model.anti_principles, text);
        }
        TasteOp::AddHardConstraint { text } => {
            let text = non_empty(StatementField::HardConstraints, text)?;
            model.hard_constraints.insert(text.to_string());
        }
        TasteOp::AddSoftConstraint { text } => {
            let text = non_empty(StatementField::SoftConstraints, text)?;
            model.soft_constraints.insert(text.to_string());
        }
        TasteOp::AddViolationPattern { text } => {
            let text = non_empty(StatementField::ViolationPatterns, text)?;
            push_unique(&mut model.violation_patterns, text);
        }
        TasteOp::AddExemplar {
            sentiment,
            exemplar,
        } => {
            let list = model.exemplars.for_sentiment_mut(*sentiment);
            if !list.iter().any(|e| e.listing_id == exemplar.listing_id) {
                list.push(exemplar.clone());
            }
        }
        TasteOp::SetWeight { dimension, weight } => {
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
            model.weighted_dimensions.insert(dimension.clone(), *weight);
        }
        TasteOp::Supersede {
            field,
            text,
            replacement,
            reason,
        } => supersede(model, *field, text, replacement.as_deref(), reason)?,
    }
    Ok(())
}

fn supersede(
    model: &mut TasteModel,
    field: StatementField,
    text: &str,
    replacement: Option<&str>,
    reason: &str,
) -> Result<(), ConstraintConflictError> {
    let unknown = || ConstraintConflictError::UnknownStatement {
        field: field.to_string(),
        text: text.to_string(),
    };
    let replacement = match replacement {
        Some(r) => Some(non_empty(field, r)?.to_string()),
        None => None,
    };

    match field {
        StatementField::HardConstraints | StatementField::SoftConstraints => {
            let set = if field == StatementField::HardConstraints {
                &mut model.hard_constraints
            } else {
                &mut model.soft_constraints
            };
            if !set.remove(text) {
                return Err(unknown());
            }
            if let Some(new) = &replacement {
                set.insert(new.clone());
            }
        }
        StatementField::Principles
        | StatementField::AntiPrinciples
        | StatementField::ViolationPatterns => {
            let list = match field {
                StatementField::Principles => &mut model.principles,
                StatementField::AntiPrinciples => &mut model.anti_principles,
                _ => &mut model.violation_patterns,
            };
            let idx = list.iter().position(|s| s == text).ok_or_else(unknown)?;
            match &replacement {
                Some(new) => list[idx].clone_from(new),
                None => {
                    list.remove(idx);
                }
            }
        }
    }

    model.superseded.push(Supersession {
        field,
        text: text.to_string(),
        replacement,
        reason: reason.to_string(),
        version: model.version,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_bumps_version_and_leaves_base_untouched() {
        let base = TasteModel::bootstrap();
        let diff = TasteDiff::new(vec![TasteOp::AddHardConstraint {
            text: "no flip".into(),
        }]);
        let next = diff.apply_to(&base).unwrap();
        assert_eq!(next.version, 2);
        assert!(next.hard_constraints.contains("no flip"));
        assert!(base.hard_constraints.is_empty());
    }

    #[test]
    fn unbalanced_weight_is_rejected() {
        let base = TasteModel::bootstrap();
        let diff = TasteDiff::new(vec![TasteOp::SetWeight {
            dimension: "natural_light".into(),
            weight: 0.9,
        }]);
        assert!(matches!(
            diff.apply_to(&base),
            Err(ConstraintConflictError::WeightSum { .. })
        ));
    }

    #[test]
    fn supersede_leaves_marker() {
        let mut base = TasteModel::bootstrap();
        base.principles.push("white walls".into());
        let diff = TasteDiff::new(vec![TasteOp::Supersede {
            field: StatementField::Principles,
            text: "white walls".into(),
            replacement: Some("warm neutral walls".into()),
            reason: "repeated dislikes of stark interiors".into(),
        }]);
        let next = diff.apply_to(&base).unwrap();
        assert_eq!(next.principles, vec!["warm neutral walls".to_string()]);
        assert_eq!(next.superseded.len(), 1);
        assert_eq!(next.superseded[0].text, "white walls");
        assert_eq!(next.superseded[0].version, 2);
    }

    #[test]
    fn supersede_unknown_statement_fails() {
        let base = TasteModel::bootstrap();
        let diff = TasteDiff::new(vec![TasteOp::Supersede {
            field: StatementField::HardConstraints,
            text: "missing".into(),
            replacement: None,
            reason: String::new(),
        }]);
        assert!(matches!(
            diff.apply_to(&base),
            Err(ConstraintConflictError::UnknownStatement { .. })
        ));
    }

    #[test]
    fn duplicate_principle_is_not_repeated() {
        let mut base = TasteModel::bootstrap();
        base.principles.push("Honest materials".into());
        let diff = TasteDiff::new(vec![TasteOp::AddPrinciple {
            text: "honest materials".into(),
        }]);
        let next = diff.apply_to(&base).unwrap();
        assert_eq!(next.principles.len(), 1);
    }

    #[test]
    fn ops_serialize_with_tag() {
        let op = TasteOp::SetWeight {
            dimension: "storage".into(),
            weight: 0.1,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "set_weight");
        assert!(op.describe().contains("storage"));
    }
}
