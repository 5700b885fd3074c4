pub mod schema;

pub use schema::{
    Config, EvolutionConfig, ObservabilityConfig, PipelineConfig, ScoringConfig, StorageConfig,
};
