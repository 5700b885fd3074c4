use super::signals::tokenize;
use crate::core::listing::VisionDescriptor;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feasibility {
    Light,
    Medium,
    Heavy,
}

/// Rough renovation cost bracket, ordered from cheapest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum CostClass {
    #[serde(rename = "under_50k")]
    #[strum(serialize = "<$50k")]
    Under50k,
    #[serde(rename = "50k_100k")]
    #[strum(serialize = "$50-100k")]
    From50kTo100k,
    #[serde(rename = "100k_200k")]
    #[strum(serialize = "$100-200k")]
    From100kTo200k,
    #[serde(rename = "over_200k")]
    #[strum(serialize = "$200k+")]
    Over200k,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueClass {
    Structural,
    Systems,
    Cosmetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenovationIdea {
    pub area: String,
    pub current_state: String,
    pub proposed_change: String,
    pub difficulty: Feasibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialResult {
    /// 0-100
    pub score: f64,
    pub feasibility: Feasibility,
    pub cost_class: CostClass,
    #[serde(default)]
    pub renovation_ideas: Vec<RenovationIdea>,
    #[serde(default)]
    pub risk_notes: Vec<String>,
    /// Limitations renovation cannot change (lot, layout bones, location).
    #[serde(default)]
    pub immutable_constraints: Vec<String>,
    #[serde(default)]
    pub narrative: String,
}

const STRUCTURAL: [&str; 14] = [
    "foundation", "structural", "lot", "layout", "location", "highway", "busy", "water",
    "flood", "moisture", "mold", "settling", "crack", "slope",
];
const SYSTEMS: [&str; 9] = [
    "electrical", "wiring", "plumbing", "hvac", "furnace", "roof", "septic", "knob", "asbestos",
];
const COSMETIC: [&str; 17] = [
    "paint", "grey", "gray", "flooring", "floor", "fixture", "cabinet", "counter", "countertop",
    "finish", "flip", "staging", "carpet", "laminate", "vinyl", "wallpaper", "lighting",
];
const BONES: [&str; 12] = [
    "hardwood", "ceiling", "original", "molding", "moulding", "window", "view", "mature",
    "fireplace", "plaster", "beam", "brick",
];

const BASE_SCORE: f64 = 40.0;
const COSMETIC_UPSIDE: f64 = 8.0;
const COSMETIC_CAP: f64 = 40.0;
const BONES_UPSIDE: f64 = 6.0;
const BONES_CAP: f64 = 30.0;
const STRUCTURAL_PENALTY: f64 = 15.0;
const SYSTEMS_PENALTY: f64 = 8.0;

/// Classify an issue text. Structural wins over systems over cosmetic.
pub fn classify_issue(text: &str) -> Option<IssueClass> {
    let tokens = tokenize(text);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
    if has(&STRUCTURAL) {
        Some(IssueClass::Structural)
    } else if has(&SYSTEMS) {
        Some(IssueClass::Systems)
    } else if has(&COSMETIC) {
        Some(IssueClass::Cosmetic)
    } else {
        None
    }
}

fn is_bones_signal(text: &str) -> bool {
    tokenize(text).iter().any(|t| BONES.contains(&t.as_str()))
}

fn needs_work(condition: &str) -> bool {
    tokenize(condition).iter().any(|t| {
        matches!(
            t.as_str(),
            "dated" | "worn" | "original" | "tired" | "needs" | "poor" | "flip" | "damaged"
        )
    })
}

/// Taste-independent renovation upside scoring.
#[derive(Debug, Clone, Default)]
pub struct PotentialEvaluator;

impl PotentialEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, descriptor: &VisionDescriptor) -> PotentialResult {
        let mut structural = Vec::new();
        let mut systems = Vec::new();
        let mut cosmetic = Vec::new();
        for flag in &descriptor.red_flags {
            match classify_issue(flag) {
                Some(IssueClass::Structural) => structural.push(flag.clone()),
                Some(IssueClass::Systems) => systems.push(flag.clone()),
                Some(IssueClass::Cosmetic) => cosmetic.push(flag.clone()),
                None => {}
            }
        }

        let bones: Vec<&String> = descriptor
            .positive_signals
            .iter()
            .chain(descriptor.rooms.iter().flat_map(|r| r.materials.iter()))
            .filter(|s| is_bones_signal(s))
            .collect();

        let wet_rooms: Vec<&str> = descriptor
            .rooms
            .iter()
            .filter(|r| r.condition.as_deref().is_some_and(needs_work))
            .map(|r| r.room_type.as_str())
            .filter(|t| {
                tokenize(t)
                    .iter()
                    .any(|w| matches!(w.as_str(), "kitchen" | "bathroom" | "bath"))
            })
            .collect();

        let mut score = BASE_SCORE;
        score += (cosmetic.len() as f64 * COSMETIC_UPSIDE).min(COSMETIC_CAP);
        score += (bones.len() as f64 * BONES_UPSIDE).min(BONES_CAP);
        if structural.is_empty()
            && let Some(overall) = descriptor.overall_aesthetic
        {
            score += 2.0 * (10.0 - overall);
        }
        score -= structural.len() as f64 * STRUCTURAL_PENALTY;
        score -= systems.len() as f64 * SYSTEMS_PENALTY;
        let score = (score.clamp(0.0, 100.0) * 100.0).round() / 100.0;

        let feasibility = if !structural.is_empty() || systems.len() >= 2 {
            Feasibility::Heavy
        } else if !systems.is_empty() || !wet_rooms.is_empty() {
            Feasibility::Medium
        } else {
            Feasibility::Light
        };

        let points =
            cosmetic.len() + 3 * wet_rooms.len() + 4 * systems.len() + 8 * structural.len();
        let cost_class = match points {
            0..=3 => CostClass::Under50k,
            4..=7 => CostClass::From50kTo100k,
            8..=15 => CostClass::From100kTo200k,
            _ => CostClass::Over200k,
        };

        let mut renovation_ideas: Vec<RenovationIdea> = cosmetic
            .iter()
            .map(|issue| RenovationIdea {
                area: "finishes".into(),
                current_state: issue.clone(),
                proposed_change: format!("replace or refinish: {issue}"),
                difficulty: Feasibility::Light,
            })
            .collect();
        for room in &wet_rooms {
            renovation_ideas.push(RenovationIdea {
                area: (*room).to_string(),
                current_state: "dated".into(),
                proposed_change: format!("renovate the {room}"),
                difficulty: Feasibility::Medium,
            });
        }
        for issue in &systems {
            renovation_ideas.push(RenovationIdea {
                area: "systems".into(),
                current_state: issue.clone(),
                proposed_change: format!("upgrade: {issue}"),
                difficulty: Feasibility::Medium,
            });
        }

        let mut risk_notes: Vec<String> = systems
            .iter()
            .map(|s| format!("systems work may expand in scope: {s}"))
            .collect();
        risk_notes.extend(
            structural
                .iter()
                .map(|s| format!("structural limitation: {s}")),
        );

        let narrative = narrate(score, feasibility, cost_class, bones.len(), structural.len());
        PotentialResult {
            score,
            feasibility,
            cost_class,
            renovation_ideas,
            risk_notes,
            immutable_constraints: structural,
            narrative,
        }
    }
}

fn narrate(
    score: f64,
    feasibility: Feasibility,
    cost_class: CostClass,
    bones: usize,
    structural: usize,
) -> String {
    let outlook = if structural > 0 {
        "Upside is limited by constraints renovation cannot fix."
    } else if bones > 0 {
        "Good bones under changeable surfaces."
    } else {
        "Mostly surface-level opportunity."
    };
    format!("{outlook} Potential {score:.0}/100, {feasibility} work, roughly {cost_class}.")
}
