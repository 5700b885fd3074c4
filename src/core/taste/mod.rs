// Versioned taste model, its diffs, persistence and feedback-driven evolution.

pub mod diff;
pub mod evolution;
pub mod proposal;
pub mod store;
pub mod types;

pub use diff::{TasteDiff, TasteOp};
pub use evolution::{EvolutionService, TasteEvolutionEngine};
pub use proposal::{
    Contradiction, FeedbackBasis, ProposalStatus, ProposalStore, SqliteProposalStore,
    TasteProposal, WeightShift,
};
pub use store::{PreferenceStore, SqlitePreferenceStore, TasteLease};
pub use types::*;
