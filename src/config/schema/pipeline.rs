use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Listings evaluated at once during a batch run.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Delay before the single retry of a transient provider failure.
    #[serde(default)]
    pub retry_backoff_ms: u64,
    /// Upper bound on images passed to the vision capability.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

fn default_batch_concurrency() -> usize {
    1
}

fn default_max_images() -> usize {
    36
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: default_batch_concurrency(),
            retry_backoff_ms: 0,
            max_images: default_max_images(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file name, relative to the workspace directory.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database() -> String {
    "hearth.db".into()
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            max_connections: default_max_connections(),
        }
    }
}
