pub mod describer;
pub mod narrator;
pub mod openrouter;
pub mod reliable;
pub mod scrub;
pub mod traits;

pub use describer::{LlmDescriber, VisionDescriber};
pub use narrator::{Brief, BriefInputs, BriefNarrator, LlmNarrator};
pub use openrouter::OpenRouterProvider;
pub use reliable::{Attempted, classify_provider_error, with_single_retry};
pub use traits::Provider;
