use super::traits::{Observer, ObserverEvent};
use tracing::{info, warn};

/// Observer that forwards events to `tracing`
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::StageCompleted {
                listing_id,
                stage,
                duration,
            } => {
                info!(listing_id = %listing_id, stage = %stage, duration_ms = millis(*duration), "stage.completed");
            }
            ObserverEvent::StageFailed {
                listing_id,
                stage,
                attempts,
                message,
            } => {
                warn!(listing_id = %listing_id, stage = %stage, attempts, error = %message, "stage.failed");
            }
            ObserverEvent::ListingSkipped { listing_id, reason } => {
                info!(listing_id = %listing_id, reason = %reason, "listing.skipped");
            }
            ObserverEvent::BatchFinished {
                scored,
                skipped,
                failed,
                duration,
            } => {
                info!(scored, skipped, failed, duration_ms = millis(*duration), "batch.finished");
            }
            ObserverEvent::TasteVersionApplied { version, origin } => {
                info!(taste_version = version, origin = %origin, "taste.applied");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
