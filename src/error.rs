use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `hearth`.
///
/// Pipeline code matches on these to decide whether a stage is retried, marked
/// failed, or whether a taste mutation is rejected. Store and CLI plumbing keep
/// using `anyhow::Result` for context chains and convert through `Other`.
#[derive(Debug, Error)]
pub enum HearthError {
    // ── External capabilities ───────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Malformed structured output ─────────────────────────────────────
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    // ── Taste model invariants ──────────────────────────────────────────
    #[error("taste model conflict: {0}")]
    ConstraintConflict(#[from] ConstraintConflictError),

    // ── Proposal lifecycle ──────────────────────────────────────────────
    #[error("proposal: {0}")]
    Proposal(#[from] ProposalError),

    // ── Persistence ─────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HearthError {
    /// Whether a single immediate retry is allowed for this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(err) if err.is_transient())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// ─── Provider errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{capability} call failed (transient): {message}")]
    Transient { capability: String, message: String },

    #[error("{capability} call failed: {message}")]
    Permanent { capability: String, message: String },
}

impl ProviderError {
    pub fn transient(capability: &str, message: impl Into<String>) -> Self {
        Self::Transient {
            capability: capability.to_string(),
            message: message.into(),
        }
    }

    pub fn permanent(capability: &str, message: impl Into<String>) -> Self {
        Self::Permanent {
            capability: capability.to_string(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

// ─── Validation errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("vision descriptor: {0}")]
    Descriptor(String),

    #[error("brief: {0}")]
    Brief(String),

    #[error("listing: {0}")]
    Listing(String),

    #[error("unparseable {what} response: {message}")]
    Unparseable { what: &'static str, message: String },
}

// ─── Taste model invariant errors ───────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ConstraintConflictError {
    #[error("dimension weights sum to {sum:.6}, expected 1.0")]
    WeightSum { sum: f64 },

    #[error("dimension {dimension} has invalid weight {weight}")]
    InvalidWeight { dimension: String, weight: f64 },

    #[error("taste model has no weighted dimensions")]
    NoDimensions,

    #[error("empty {field} statement")]
    EmptyStatement { field: String },

    #[error("cannot supersede {field} statement not present in model: {text}")]
    UnknownStatement { field: String, text: String },

    #[error("diff targets version {expected} but current is {actual}")]
    VersionMismatch { expected: u64, actual: u64 },
}

// ─── Proposal lifecycle errors ──────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ProposalError {
    #[error("proposal {id} is already {status}")]
    AlreadyDecided { id: String, status: String },

    #[error("proposal {id} was built against taste v{base}, current is v{current}")]
    Outdated { id: String, base: u64, current: u64 },
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("corrupt {what}: {message}")]
    Corrupt { what: &'static str, message: String },

    #[error("schema: {0}")]
    Schema(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt {
            what: "json payload",
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for HearthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}

impl From<serde_json::Error> for HearthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.into())
    }
}

// ─── Config errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Warnings ───────────────────────────────────────────────────────────────

/// A present-fit result that predates the current taste model version.
///
/// Never propagated as a failure; attached to status and ranking output so a
/// stale score is not trusted for ranking before it is recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "present-fit for {listing_id} was scored under taste v{scored_version}, current is v{current_version}"
)]
pub struct StaleScoreWarning {
    pub listing_id: String,
    pub scored_version: u64,
    pub current_version: u64,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, HearthError>;
