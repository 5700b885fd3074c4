use crate::core::pipeline::Stage;
use std::time::Duration;

/// Events the pipeline and taste workflow report
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    StageCompleted {
        listing_id: String,
        stage: Stage,
        duration: Duration,
    },
    StageFailed {
        listing_id: String,
        stage: Stage,
        attempts: u32,
        message: String,
    },
    ListingSkipped {
        listing_id: String,
        reason: String,
    },
    BatchFinished {
        scored: usize,
        skipped: usize,
        failed: usize,
        duration: Duration,
    },
    TasteVersionApplied {
        version: u64,
        origin: String,
    },
}

/// Event sink. Implement for any backend.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    fn name(&self) -> &str;
}
