//! Keyword matching between free-text taste statements and descriptor text.

use crate::core::listing::{LightQuality, VisionDescriptor};
use std::collections::BTreeSet;

const STOP_WORDS: [&str; 26] = [
    "a", "an", "the", "and", "or", "of", "in", "on", "with", "to", "for", "is", "are", "be",
    "any", "all", "must", "have", "has", "should", "at", "by", "from", "that", "this", "it",
];

const NEGATORS: [&str; 5] = ["no", "not", "never", "without", "avoid"];

/// Fraction of a statement's keywords one text must contain to match it.
const MATCH_COVERAGE: f64 = 0.5;

fn stem(word: &str) -> String {
    if word.len() > 4 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Lowercase, split on anything non-alphanumeric (including `_`), stem plurals.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(stem)
        .collect()
}

/// A taste statement reduced to matchable keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub keywords: Vec<String>,
    /// Leading negator: the statement forbids its keywords.
    pub negative: bool,
}

impl Statement {
    pub fn parse(text: &str) -> Self {
        let tokens = tokenize(text);
        let negative = tokens
            .first()
            .is_some_and(|t| NEGATORS.contains(&t.as_str()));
        let mut seen = BTreeSet::new();
        let keywords = tokens
            .into_iter()
            .filter(|t| !STOP_WORDS.contains(&t.as_str()) && !NEGATORS.contains(&t.as_str()))
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self {
            text: text.to_string(),
            keywords,
            negative,
        }
    }

    pub fn coverage(&self, text: &str) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let tokens: BTreeSet<String> = tokenize(text).into_iter().collect();
        let hits = self.keywords.iter().filter(|k| tokens.contains(*k)).count();
        hits as f64 / self.keywords.len() as f64
    }

    pub fn matches(&self, text: &str) -> bool {
        self.coverage(text) >= MATCH_COVERAGE
    }

    /// First text in `texts` this statement matches.
    pub fn first_match<'a>(&self, texts: &'a [String]) -> Option<&'a str> {
        texts.iter().find(|t| self.matches(t)).map(String::as_str)
    }
}

/// Outcome of checking one constraint against a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintCheck {
    Satisfied,
    /// Violated, with the descriptor text that triggered it when there is one.
    Violated(Option<String>),
}

/// Text that can reveal a problem: red flags, room materials and conditions.
pub fn issue_texts(descriptor: &VisionDescriptor) -> Vec<String> {
    let mut texts = descriptor.red_flags.clone();
    for room in &descriptor.rooms {
        texts.extend(room.materials.iter().cloned());
        if let Some(condition) = &room.condition {
            texts.push(condition.clone());
        }
    }
    if let Some(state) = &descriptor.renovation_state {
        texts.push(state.clone());
    }
    texts
}

/// Every descriptive text the descriptor carries, positive or negative.
pub fn all_texts(descriptor: &VisionDescriptor) -> Vec<String> {
    let mut texts = issue_texts(descriptor);
    texts.extend(descriptor.positive_signals.iter().cloned());
    for room in &descriptor.rooms {
        texts.push(room.room_type.clone());
        if let Some(notes) = &room.notes {
            texts.push(notes.clone());
        }
        if room.light_quality != LightQuality::Unknown {
            texts.push(format!("{} light {}", room.light_quality, room.room_type));
        }
    }
    if let Some(style) = &descriptor.architectural_style {
        texts.push(style.clone());
    }
    texts
}

/// Negative statements are violated by a matching issue; positive statements
/// are violated when nothing in the descriptor supports them.
pub fn check_constraint(statement: &Statement, descriptor: &VisionDescriptor) -> ConstraintCheck {
    if statement.keywords.is_empty() {
        return ConstraintCheck::Satisfied;
    }
    if statement.negative {
        match statement.first_match(&issue_texts(descriptor)) {
            Some(evidence) => ConstraintCheck::Violated(Some(evidence.to_string())),
            None => ConstraintCheck::Satisfied,
        }
    } else if statement.first_match(&all_texts(descriptor)).is_some() {
        ConstraintCheck::Satisfied
    } else {
        ConstraintCheck::Violated(None)
    }
}

// ── Dimension sub-scores ───────────────────────────────────────────────────

const PREMIUM_MATERIALS: [&str; 12] = [
    "hardwood", "oak", "walnut", "marble", "stone", "brick", "plaster", "terrazzo", "slate",
    "limestone", "copper", "wood",
];
const CHEAP_MATERIALS: [&str; 8] = [
    "laminate", "vinyl", "lvp", "carpet", "formica", "linoleum", "popcorn", "melamine",
];
const OUTDOOR_ROOMS: [&str; 8] = [
    "exterior", "yard", "garden", "patio", "deck", "balcony", "outdoor", "porch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscoreOrigin {
    Signal,
    Derived,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    tokenize(text).iter().any(|t| words.contains(&t.as_str()))
}

fn light_score(descriptor: &VisionDescriptor) -> Option<f64> {
    let values: Vec<f64> = descriptor
        .rooms
        .iter()
        .filter_map(|room| match room.light_quality {
            LightQuality::Abundant => Some(90.0),
            LightQuality::Moderate => Some(60.0),
            LightQuality::Poor => Some(25.0),
            LightQuality::Unknown => None,
        })
        .collect();
    mean(&values)
}

fn material_score(descriptor: &VisionDescriptor) -> Option<f64> {
    let (mut premium, mut cheap) = (0usize, 0usize);
    for material in descriptor.rooms.iter().flat_map(|r| r.materials.iter()) {
        if contains_any(material, &CHEAP_MATERIALS) {
            cheap += 1;
        } else if contains_any(material, &PREMIUM_MATERIALS) {
            premium += 1;
        }
    }
    let total = premium + cheap;
    if total == 0 {
        return None;
    }
    Some(50.0 + 40.0 * (premium as f64 - cheap as f64) / total as f64)
}

fn condition_value(condition: &str) -> Option<f64> {
    let tokens = tokenize(condition);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
    if has(&["excellent", "pristine", "immaculate"]) {
        Some(90.0)
    } else if has(&["poor", "damaged", "needs", "neglected", "failing"]) {
        Some(25.0)
    } else if has(&["dated", "worn", "tired"]) {
        Some(40.0)
    } else if has(&["flip", "flipped"]) {
        Some(45.0)
    } else if has(&["renovated", "updated", "good", "restored"]) {
        Some(75.0)
    } else if has(&["original", "fair"]) {
        Some(60.0)
    } else {
        None
    }
}

fn condition_score(descriptor: &VisionDescriptor) -> Option<f64> {
    let values: Vec<f64> = descriptor
        .rooms
        .iter()
        .filter_map(|r| r.condition.as_deref().and_then(condition_value))
        .collect();
    mean(&values)
}

fn room_quality<F>(descriptor: &VisionDescriptor, select: F) -> Option<f64>
where
    F: Fn(&str) -> bool,
{
    let values: Vec<f64> = descriptor
        .rooms
        .iter()
        .filter(|r| select(&r.room_type))
        .filter_map(|r| r.aesthetic_quality.map(|q| q * 10.0))
        .collect();
    mean(&values)
}

/// Sub-score for `dimension` on 0-100, or `None` when the descriptor carries
/// no usable evidence for it.
pub fn dimension_subscore(
    dimension: &str,
    descriptor: &VisionDescriptor,
) -> Option<(f64, SubscoreOrigin)> {
    if let Some(value) = descriptor.dimension_signals.get(dimension) {
        return Some((*value, SubscoreOrigin::Signal));
    }

    let derived = match dimension {
        "natural_light" => light_score(descriptor),
        "materials_quality" => material_score(descriptor),
        "condition" => condition_score(descriptor),
        "kitchen_quality" => room_quality(descriptor, |t| contains_any(t, &["kitchen"])),
        "outdoor_space" => room_quality(descriptor, |t| contains_any(t, &OUTDOOR_ROOMS)),
        "architectural_character" => descriptor
            .architectural_style
            .as_ref()
            .and(descriptor.overall_aesthetic)
            .map(|overall| overall * 10.0),
        other => {
            let wanted: Vec<String> = tokenize(other)
                .into_iter()
                .filter(|t| t != "quality")
                .collect();
            room_quality(descriptor, |room_type| {
                tokenize(room_type).iter().any(|t| wanted.contains(t))
            })
        }
    };
    derived.map(|value| (value.clamp(0.0, 100.0), SubscoreOrigin::Derived))
}
