use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Pipeline event sink: "log" | "none"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// "error" | "warn" | "info" | "debug" | "trace"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_backend() -> String {
    "log".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            log_level: default_log_level(),
            ansi: default_true(),
        }
    }
}
