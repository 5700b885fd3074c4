use super::super::{
    EvolutionConfig, ObservabilityConfig, PipelineConfig, ScoringConfig, StorageConfig,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    pub api_key: Option<String>,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default)]
    pub temperature: f64,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub evolution: EvolutionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_vision_model() -> String {
    "google/gemini-3-flash-preview".into()
}

fn default_text_model() -> String {
    "google/gemini-3-flash-preview".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_key: None,
            vision_model: default_vision_model(),
            text_model: default_text_model(),
            temperature: 0.0,
            pipeline: PipelineConfig::default(),
            scoring: ScoringConfig::default(),
            evolution: EvolutionConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Absolute path of the SQLite database inside the workspace.
    pub fn database_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.storage.database)
    }

    /// Reject settings that would break scoring or evolution invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.pipeline.batch_concurrency == 0 {
            return Err(ConfigError::Validation(
                "pipeline.batch_concurrency must be at least 1".into(),
            ));
        }
        self.scoring.validate()?;
        self.evolution.validate()?;
        Ok(())
    }
}
