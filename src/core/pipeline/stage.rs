use serde::{Deserialize, Serialize};
use strum::Display;

/// Pipeline stages. Graph: `Vision -> {PresentFit, Potential} -> Brief`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Vision,
    PresentFit,
    Potential,
    Brief,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Vision,
        Stage::PresentFit,
        Stage::Potential,
        Stage::Brief,
    ];

    /// Whether a taste model version bump invalidates this stage's output.
    pub fn depends_on_taste(self) -> bool {
        matches!(self, Stage::PresentFit | Stage::Brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn potential_ignores_taste() {
        assert!(!Stage::Potential.depends_on_taste());
        assert!(Stage::Brief.depends_on_taste());
    }

    #[test]
    fn stage_keys_serialize_as_snake_case() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Stage::PresentFit, 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"present_fit":1}"#);
    }
}
