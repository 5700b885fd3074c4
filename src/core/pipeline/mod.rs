// Staged, dependency-aware evaluation of listings.

pub mod orchestrator;
pub mod report;
pub mod stage;

pub use orchestrator::{Ingested, Orchestrator};
pub use report::{
    BatchReport, ListingOutcome, OutcomeStatus, PipelineStatus, Quadrant, RankedListing,
};
pub use stage::Stage;
