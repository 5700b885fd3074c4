mod core;
mod observability;
mod pipeline;
mod taste;

pub use core::Config;
pub use observability::ObservabilityConfig;
pub use pipeline::{PipelineConfig, StorageConfig};
pub use taste::{EvolutionConfig, ScoringConfig};
