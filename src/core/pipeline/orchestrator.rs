use super::report::{
    BatchReport, ListingOutcome, OutcomeStatus, PipelineStatus, Quadrant, RankedListing,
};
use super::stage::Stage;
use crate::config::{PipelineConfig, ScoringConfig};
use crate::core::listing::{
    Annotation, FailureKind, ListingMetadata, ListingRecord, ListingStore, StageFailure,
    StoredBrief, UserVerdict, Verdict, listing_id_for,
};
use crate::core::providers::{BriefInputs, BriefNarrator, VisionDescriber, with_single_retry};
use crate::core::scoring::{PotentialEvaluator, PresentFitEvaluator};
use crate::core::taste::PreferenceStore;
use crate::error::{HearthError, Result, ValidationError};
use crate::observability::{NoopObserver, Observer, ObserverEvent};
use chrono::Utc;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of ingesting one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub listing_id: String,
    /// `false` when a listing with the same normalized address already existed.
    pub created: bool,
}

/// Drives listings through `Vision -> {PresentFit, Potential} -> Brief`.
///
/// Only stages without current output run; each stage's output is persisted
/// as soon as it exists, so an interrupted run resumes at the first missing
/// stage. The orchestrator is the only writer of listing records.
pub struct Orchestrator {
    listings: Arc<dyn ListingStore>,
    prefs: Arc<dyn PreferenceStore>,
    describer: Arc<dyn VisionDescriber>,
    narrator: Arc<dyn BriefNarrator>,
    present_fit: PresentFitEvaluator,
    potential: PotentialEvaluator,
    quadrant_threshold: f64,
    config: PipelineConfig,
    observer: Arc<dyn Observer>,
}

fn failure_kind(err: &HearthError) -> FailureKind {
    match err {
        HearthError::Provider(_) => FailureKind::Provider,
        HearthError::Validation(_) => FailureKind::Validation,
        _ => FailureKind::Internal,
    }
}

impl Orchestrator {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        prefs: Arc<dyn PreferenceStore>,
        describer: Arc<dyn VisionDescriber>,
        narrator: Arc<dyn BriefNarrator>,
        scoring: ScoringConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            listings,
            prefs,
            describer,
            narrator,
            quadrant_threshold: scoring.quadrant_threshold,
            present_fit: PresentFitEvaluator::new(scoring),
            potential: PotentialEvaluator::new(),
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Sink for pipeline and taste-version events.
    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.retry_backoff_ms)
    }

    pub async fn listing(&self, listing_id: &str) -> Result<ListingRecord> {
        self.listings
            .get(listing_id)
            .await?
            .ok_or_else(|| HearthError::not_found("listing", listing_id))
    }

    /// Register a listing, deduplicating by normalized address.
    pub async fn ingest(&self, metadata: ListingMetadata) -> Result<Ingested> {
        let listing_id = listing_id_for(&metadata.address).ok_or_else(|| {
            ValidationError::Listing(format!("unusable address {:?}", metadata.address))
        })?;
        if let Some(existing) = self.listings.find_by_address(&metadata.address).await? {
            tracing::info!(listing_id = %existing.listing_id, "listing already ingested");
            return Ok(Ingested {
                listing_id: existing.listing_id,
                created: false,
            });
        }
        let record = ListingRecord::new(listing_id.clone(), metadata);
        let created = self.listings.insert_new(&record).await?;
        tracing::info!(
            listing_id = %listing_id,
            created,
            images = record.metadata.image_urls.len(),
            "listing ingested"
        );
        Ok(Ingested {
            listing_id,
            created,
        })
    }

    /// Ids of listings with images and any missing or stale stage.
    pub async fn pending_listings(&self) -> Result<Vec<String>> {
        self.listings.pending_ids(self.prefs.current().version).await
    }

    /// Run one listing through every stage that is missing or stale.
    ///
    /// Stage failures are recorded on the listing and reported in the
    /// outcome; only persistence failures are returned as `Err`.
    pub async fn run_listing(&self, listing_id: &str) -> Result<ListingOutcome> {
        let mut record = self.listing(listing_id).await?;

        if !record.has_images() {
            self.observer.record_event(&ObserverEvent::ListingSkipped {
                listing_id: listing_id.to_string(),
                reason: "no images".into(),
            });
            return Ok(ListingOutcome::new(listing_id, OutcomeStatus::Skipped));
        }

        let mut outcome = ListingOutcome::new(listing_id, OutcomeStatus::Scored);

        // Vision
        if record.vision_descriptor.is_none() {
            let started = Instant::now();
            let attempted = with_single_retry("vision", self.backoff(), || {
                self.describer.describe(&record.listing_id, &record.metadata)
            })
            .await;
            // Malformed output is a terminal failure for this run, never retried.
            let checked = attempted.outcome.and_then(|descriptor| {
                descriptor.validate()?;
                Ok(descriptor)
            });
            match checked {
                Ok(descriptor) => {
                    record.vision_descriptor = Some(descriptor);
                    record.mark_completed(Stage::Vision, Utc::now());
                    self.listings.put(&record).await?;
                    self.completed(&mut outcome, Stage::Vision, started);
                }
                Err(err) => {
                    return self
                        .fail_stage(record, outcome, Stage::Vision, &err, attempted.attempts)
                        .await;
                }
            }
        }

        // PresentFit and Potential. The lease pins the taste version until the
        // results are persisted.
        let lease = self.prefs.lease().await;
        let version = lease.version();
        if let Some(warning) = record.stale_warning(version) {
            tracing::warn!(listing_id, %warning, "rescoring stale present-fit");
        }
        let need_present_fit = record.needs(Stage::PresentFit, version);
        let need_potential = record.needs(Stage::Potential, version);
        if need_present_fit || need_potential {
            let Some(descriptor) = record.vision_descriptor.clone() else {
                return Err(HearthError::Other(anyhow::anyhow!(
                    "vision descriptor missing after vision stage"
                )));
            };
            let started = Instant::now();
            let model = lease.model();
            let (present_fit, potential) = tokio::join!(
                async { need_present_fit.then(|| self.present_fit.evaluate(&descriptor, model)) },
                async { need_potential.then(|| self.potential.evaluate(&descriptor)) },
            );
            let now = Utc::now();
            if let Some(result) = present_fit {
                record.replace_present_fit(result);
                record.mark_completed(Stage::PresentFit, now);
            }
            if let Some(result) = potential {
                record.potential = Some(result);
                record.mark_completed(Stage::Potential, now);
            }
            self.listings.put(&record).await?;
            if need_present_fit {
                self.completed(&mut outcome, Stage::PresentFit, started);
            }
            if need_potential {
                self.completed(&mut outcome, Stage::Potential, started);
            }
        }
        let taste = lease.snapshot();
        drop(lease);

        // Brief
        if record.needs(Stage::Brief, version) {
            let started = Instant::now();
            let (Some(descriptor), Some(present_fit), Some(potential)) = (
                record.vision_descriptor.as_ref(),
                record.present_fit.as_ref(),
                record.potential.as_ref(),
            ) else {
                return Err(HearthError::Other(anyhow::anyhow!(
                    "brief inputs missing after scoring stages"
                )));
            };
            let scored_version = present_fit.taste_version;
            let attempted = with_single_retry("brief", self.backoff(), || {
                self.narrator.narrate(BriefInputs {
                    listing_id: &record.listing_id,
                    metadata: &record.metadata,
                    descriptor,
                    present_fit,
                    potential,
                    taste: &taste,
                })
            })
            .await;
            let checked = attempted.outcome.and_then(|brief| {
                brief.validate()?;
                Ok(brief)
            });
            match checked {
                Ok(brief) => {
                    record.brief = Some(StoredBrief {
                        brief,
                        taste_version: scored_version,
                    });
                    record.mark_completed(Stage::Brief, Utc::now());
                    self.listings.put(&record).await?;
                    self.completed(&mut outcome, Stage::Brief, started);
                }
                Err(err) => {
                    return self
                        .fail_stage(record, outcome, Stage::Brief, &err, attempted.attempts)
                        .await;
                }
            }
        }

        outcome.present_fit = record.present_fit.as_ref().map(|r| r.score);
        outcome.potential = record.potential.as_ref().map(|r| r.score);
        outcome.taste_version = record.taste_model_version_used();
        if outcome.stages_run.is_empty() {
            tracing::debug!(listing_id, taste_version = version, "listing already current");
        }
        Ok(outcome)
    }

    fn completed(&self, outcome: &mut ListingOutcome, stage: Stage, started: Instant) {
        outcome.stages_run.push(stage);
        self.observer.record_event(&ObserverEvent::StageCompleted {
            listing_id: outcome.listing_id.clone(),
            stage,
            duration: started.elapsed(),
        });
    }

    async fn fail_stage(
        &self,
        mut record: ListingRecord,
        outcome: ListingOutcome,
        stage: Stage,
        err: &HearthError,
        attempts: u32,
    ) -> Result<ListingOutcome> {
        let message = err.to_string();
        record.mark_failed(
            stage,
            StageFailure {
                kind: failure_kind(err),
                message: message.clone(),
                attempts,
                failed_at: Utc::now(),
            },
        );
        self.listings.put(&record).await?;
        self.observer.record_event(&ObserverEvent::StageFailed {
            listing_id: record.listing_id.clone(),
            stage,
            attempts,
            message: message.clone(),
        });
        Ok(ListingOutcome {
            stages_run: outcome.stages_run,
            ..ListingOutcome::failed(&record.listing_id, Some(stage), message)
        })
    }

    /// Run every listing in `ids`, continuing past individual failures.
    pub async fn run_batch(&self, ids: &[String]) -> BatchReport {
        let started = Instant::now();
        let concurrency = self.config.batch_concurrency.max(1);
        let mut indexed: Vec<(usize, ListingOutcome)> = stream::iter(ids.iter().enumerate())
            .map(|(idx, id)| async move {
                let outcome = match self.run_listing(id).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        tracing::error!(listing_id = %id, error = %err, "listing run aborted");
                        ListingOutcome::failed(id, None, err.to_string())
                    }
                };
                (idx, outcome)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        let report = BatchReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        self.observer.record_event(&ObserverEvent::BatchFinished {
            scored: report.scored(),
            skipped: report.skipped(),
            failed: report.failed(),
            duration: started.elapsed(),
        });
        report
    }

    /// Run every pending listing.
    pub async fn run_pending(&self) -> Result<BatchReport> {
        let ids = self.pending_listings().await?;
        Ok(self.run_batch(&ids).await)
    }

    /// Record the user's verdict; a non-empty note is also kept as an annotation.
    pub async fn record_verdict(
        &self,
        listing_id: &str,
        verdict: Verdict,
        note: &str,
    ) -> Result<ListingRecord> {
        let mut record = self.listing(listing_id).await?;
        let now = Utc::now();
        record.user_verdict = Some(UserVerdict {
            verdict,
            note: note.trim().to_string(),
            recorded_at: now,
        });
        if !note.trim().is_empty() {
            record.annotations.push(Annotation {
                text: note.trim().to_string(),
                recorded_at: now,
            });
        }
        self.listings.put(&record).await?;
        tracing::info!(listing_id, %verdict, "verdict recorded");
        Ok(record)
    }

    pub async fn annotate(&self, listing_id: &str, text: &str) -> Result<ListingRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Listing("empty annotation".into()).into());
        }
        let mut record = self.listing(listing_id).await?;
        record.annotations.push(Annotation {
            text: text.to_string(),
            recorded_at: Utc::now(),
        });
        self.listings.put(&record).await?;
        Ok(record)
    }

    /// Every known listing, ordered by id.
    pub async fn all_listings(&self) -> Result<Vec<ListingRecord>> {
        self.listings.list().await
    }

    pub async fn delete_listing(&self, listing_id: &str) -> Result<()> {
        if !self.listings.delete(listing_id).await? {
            return Err(HearthError::not_found("listing", listing_id));
        }
        tracing::info!(listing_id, "listing deleted");
        Ok(())
    }

    /// Scored listings, best present-fit first, with potential as tiebreak.
    pub async fn rankings(&self) -> Result<Vec<RankedListing>> {
        let version = self.prefs.current().version;
        let mut ranked: Vec<RankedListing> = self
            .listings
            .list()
            .await?
            .into_iter()
            .filter_map(|record| {
                let present_fit = record.present_fit.as_ref()?;
                let potential = record.potential.as_ref().map(|p| p.score);
                let stale = record.stale_warning(version);
                if let Some(warning) = &stale {
                    tracing::warn!(%warning, "stale score in rankings");
                }
                Some(RankedListing {
                    listing_id: record.listing_id.clone(),
                    address: record.metadata.address.clone(),
                    present_fit: present_fit.score,
                    passed: present_fit.passed,
                    potential,
                    quadrant: potential
                        .map(|p| Quadrant::classify(present_fit.score, p, self.quadrant_threshold)),
                    stale,
                    verdict: record.user_verdict.as_ref().map(|v| v.verdict),
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.present_fit
                .total_cmp(&a.present_fit)
                .then_with(|| b.potential.unwrap_or(0.0).total_cmp(&a.potential.unwrap_or(0.0)))
                .then_with(|| a.listing_id.cmp(&b.listing_id))
        });
        Ok(ranked)
    }

    pub async fn status(&self) -> Result<PipelineStatus> {
        let version = self.prefs.current().version;
        let records = self.listings.list().await?;
        let mut status = PipelineStatus {
            taste_version: version,
            total: records.len(),
            ..PipelineStatus::default()
        };
        for record in &records {
            if !record.has_images() {
                status.without_images += 1;
            } else if record.is_current(version) {
                status.current += 1;
            } else {
                status.pending += 1;
            }
            if record.is_stale(version) {
                status.stale += 1;
            }
            if !record.stage_failures.is_empty() {
                status.with_failures += 1;
            }
            if record.user_verdict.is_some() {
                status.with_verdicts += 1;
            }
        }
        status.scored_by_version = tally_versions(&records);
        Ok(status)
    }
}

fn tally_versions(records: &[ListingRecord]) -> Vec<(u64, usize)> {
    let mut tally = std::collections::BTreeMap::new();
    for version in records.iter().filter_map(ListingRecord::taste_model_version_used) {
        *tally.entry(version).or_insert(0usize) += 1;
    }
    tally.into_iter().collect()
}
