// Deterministic evaluators over a validated vision descriptor.

pub mod potential;
pub mod present_fit;
pub mod signals;

pub use potential::{CostClass, Feasibility, PotentialEvaluator, PotentialResult, RenovationIdea};
pub use present_fit::{
    DimensionScore, PresentFitEvaluator, PresentFitResult, SubscoreSource, Violation,
    ViolationKind,
};
