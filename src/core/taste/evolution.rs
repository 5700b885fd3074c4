use super::diff::{TasteDiff, TasteOp};
use super::proposal::{
    Contradiction, FeedbackBasis, ProposalStatus, ProposalStore, TasteProposal, WeightShift,
};
use super::store::PreferenceStore;
use super::types::{ExemplarRef, Sentiment, TasteModel, VersionOrigin};
use crate::config::EvolutionConfig;
use crate::core::listing::{ListingRecord, ListingStore, Verdict};
use crate::core::scoring::signals::{Statement, tokenize};
use crate::error::{HearthError, ProposalError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

/// Dimension-name tokens too generic to identify a dimension on their own.
const GENERIC_DIMENSION_TOKENS: &[&str] = &["quality", "space", "flow"];

/// Compares verdicts against predictions and proposes taste diffs.
///
/// Pure: never touches a store. A proposal needs a pattern of at least
/// `min_pattern_support` contradictions; a single one is never enough.
#[derive(Debug, Clone, Default)]
pub struct TasteEvolutionEngine {
    policy: EvolutionConfig,
}

impl TasteEvolutionEngine {
    pub fn new(policy: EvolutionConfig) -> Self {
        Self { policy }
    }

    /// Records usable as feedback against `model`: a verdict plus a present-fit
    /// scored under `model.version`, most recent verdict first, windowed.
    pub fn select_feedback<'a>(
        &self,
        records: &'a [ListingRecord],
        model: &TasteModel,
    ) -> Vec<&'a ListingRecord> {
        let mut feedback: Vec<&ListingRecord> = records
            .iter()
            .filter(|r| r.user_verdict.is_some())
            .filter(|r| r.taste_model_version_used() == Some(model.version))
            .collect();
        feedback.sort_by(|a, b| {
            let at = |r: &ListingRecord| r.user_verdict.as_ref().map(|v| v.recorded_at);
            at(b).cmp(&at(a)).then_with(|| a.listing_id.cmp(&b.listing_id))
        });
        feedback.truncate(self.policy.window_size);
        feedback
    }

    /// Classify one feedback record. `None` when the verdict confirms the score.
    pub fn contradiction(&self, record: &ListingRecord, model: &TasteModel) -> Option<FeedbackBasis> {
        let verdict = record.user_verdict.as_ref()?;
        let present_fit = record.present_fit.as_ref()?;
        let contradiction = match verdict.verdict {
            Verdict::Liked if present_fit.score < self.policy.like_threshold => {
                Contradiction::UnderPredicted
            }
            Verdict::Disliked if present_fit.score >= self.policy.dislike_threshold => {
                Contradiction::OverPredicted
            }
            _ => return None,
        };

        let fallback = match contradiction {
            Contradiction::UnderPredicted => present_fit.strongest_dimension(),
            Contradiction::OverPredicted => present_fit.weakest_dimension(),
        };
        let cited_dimension = dimension_in_note(&verdict.note, model)
            .or_else(|| fallback.map(str::to_string));
        let weight_shift = cited_dimension.as_deref().and_then(|dim| {
            let cited = present_fit.dimension_breakdown.get(dim)?;
            WeightShift::toward_verdict(contradiction, cited.subscore, present_fit.weighted_mean())
        });

        let cited_issues = match contradiction {
            Contradiction::OverPredicted => record
                .vision_descriptor
                .as_ref()
                .map(|d| uncovered_red_flags(&d.red_flags, model))
                .unwrap_or_default(),
            Contradiction::UnderPredicted => Vec::new(),
        };

        Some(FeedbackBasis {
            listing_id: record.listing_id.clone(),
            predicted_score: present_fit.score,
            verdict: verdict.verdict,
            contradiction,
            cited_dimension,
            weight_shift,
            cited_issues,
        })
    }

    /// Propose a diff from `records`, or `None` when no pattern reaches support.
    pub fn propose(&self, records: &[ListingRecord], model: &TasteModel) -> Option<TasteProposal> {
        let feedback = self.select_feedback(records, model);
        let contradictions: Vec<(&ListingRecord, FeedbackBasis)> = feedback
            .iter()
            .filter_map(|r| self.contradiction(r, model).map(|b| (*r, b)))
            .collect();
        tracing::debug!(
            taste_version = model.version,
            feedback = feedback.len(),
            contradictions = contradictions.len(),
            "reviewed feedback"
        );
        if contradictions.len() < self.policy.min_pattern_support {
            return None;
        }

        let support = self.policy.min_pattern_support;

        // Per dimension: indices asking for a raise, then those asking for a cut.
        let mut by_dimension: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
        for (idx, (_, basis)) in contradictions.iter().enumerate() {
            if let Some(dim) = basis.cited_dimension.as_deref()
                && let Some(shift) = basis.weight_shift
                && model.weighted_dimensions.contains_key(dim)
            {
                let (raise, lower) = by_dimension.entry(dim).or_default();
                match shift {
                    WeightShift::Raise => raise.push(idx),
                    WeightShift::Lower => lower.push(idx),
                }
            }
        }

        // Issues group by their token form so wording variants count together.
        let mut by_issue: BTreeMap<String, (String, BTreeSet<usize>)> = BTreeMap::new();
        for (idx, (_, basis)) in contradictions.iter().enumerate() {
            for issue in &basis.cited_issues {
                let key = tokenize(issue).join(" ");
                if key.is_empty() {
                    continue;
                }
                by_issue
                    .entry(key)
                    .or_insert_with(|| (issue.clone(), BTreeSet::new()))
                    .1
                    .insert(idx);
            }
        }

        // Opposing citations cancel; only the net majority counts toward support.
        let shifts: Vec<(&str, WeightShift, &[usize])> = by_dimension
            .iter()
            .filter_map(|(dim, (raise, lower))| {
                let (shift, idxs, other) = if raise.len() >= lower.len() {
                    (WeightShift::Raise, raise, lower)
                } else {
                    (WeightShift::Lower, lower, raise)
                };
                (idxs.len() - other.len() >= support).then_some((*dim, shift, idxs.as_slice()))
            })
            .collect();
        let patterns: Vec<(&String, &BTreeSet<usize>)> = by_issue
            .values()
            .filter(|(_, idxs)| idxs.len() >= support)
            .map(|(text, idxs)| (text, idxs))
            .collect();

        let mut ops = Vec::new();
        let mut in_pattern: BTreeSet<usize> = BTreeSet::new();
        let mut rationale = String::new();

        let targets = self.shift_targets(model, &shifts);
        let weight_ops = self.reweight(model, &targets);
        if !weight_ops.is_empty() {
            for (dim, shift, idxs) in shifts.iter().filter(|(dim, ..)| targets.contains_key(dim)) {
                in_pattern.extend(idxs.iter().copied());
                let verb = match shift {
                    WeightShift::Raise => "raising",
                    WeightShift::Lower => "lowering",
                };
                let _ = writeln!(
                    rationale,
                    "{} contradictions cite {dim}; {verb} its weight by {:.2}.",
                    idxs.len(),
                    self.policy.weight_step
                );
            }
            ops.extend(weight_ops);
        }

        for (text, idxs) in &patterns {
            in_pattern.extend(idxs.iter().copied());
            let _ = writeln!(
                rationale,
                "{} disliked listings share the unpenalized issue \"{text}\".",
                idxs.len()
            );
            ops.push(TasteOp::AddViolationPattern {
                text: (*text).clone(),
            });
        }

        if ops.is_empty() {
            return None;
        }

        let mut basis = Vec::with_capacity(in_pattern.len());
        for idx in in_pattern {
            let (record, b) = &contradictions[idx];
            let sentiment = match b.contradiction {
                Contradiction::UnderPredicted => Sentiment::Liked,
                Contradiction::OverPredicted => Sentiment::Disliked,
            };
            let known = model
                .exemplars
                .for_sentiment(sentiment)
                .iter()
                .any(|e| e.listing_id == record.listing_id);
            if !known {
                ops.push(TasteOp::AddExemplar {
                    sentiment,
                    exemplar: ExemplarRef {
                        listing_id: record.listing_id.clone(),
                        address: record.metadata.address.clone(),
                        reason: format!(
                            "{} at {:.1} under v{}",
                            b.contradiction, b.predicted_score, model.version
                        ),
                    },
                });
            }
            basis.push(b.clone());
        }

        Some(TasteProposal::new(
            model.version,
            basis,
            TasteDiff::new(ops),
            rationale.trim_end().to_string(),
        ))
    }

    /// New weight for each shifted dimension: one step up (capped at
    /// `max_weight`) or one step down (floored at 0). Dimensions that cannot
    /// move are left out.
    fn shift_targets<'d>(
        &self,
        model: &TasteModel,
        shifts: &[(&'d str, WeightShift, &[usize])],
    ) -> BTreeMap<&'d str, f64> {
        let step = self.policy.weight_step;
        let mut targets = BTreeMap::new();
        for (dim, shift, _) in shifts {
            let Some(&weight) = model.weighted_dimensions.get(*dim) else {
                continue;
            };
            let next = match shift {
                WeightShift::Raise => (weight + step).min(self.policy.max_weight).max(weight),
                WeightShift::Lower => (weight - step).max(0.0),
            };
            if (next - weight).abs() > f64::EPSILON {
                targets.insert(*dim, next);
            }
        }
        targets
    }

    /// `SetWeight` ops pinning each target weight and rescaling the rest so
    /// the full set still sums to 1.
    fn reweight(&self, model: &TasteModel, targets: &BTreeMap<&str, f64>) -> Vec<TasteOp> {
        if targets.is_empty() {
            return Vec::new();
        }

        let pinned_total: f64 = targets.values().sum();
        let others_total: f64 = model
            .weighted_dimensions
            .iter()
            .filter(|(name, _)| !targets.contains_key(name.as_str()))
            .map(|(_, w)| w)
            .sum();
        let remaining = 1.0 - pinned_total;
        if remaining < 0.0 || (others_total <= 0.0 && remaining > 0.0) {
            return Vec::new();
        }
        let scale = if others_total > 0.0 {
            remaining / others_total
        } else {
            0.0
        };

        model
            .weighted_dimensions
            .iter()
            .map(|(name, weight)| {
                let next = targets
                    .get(name.as_str())
                    .copied()
                    .unwrap_or(weight * scale);
                TasteOp::SetWeight {
                    dimension: name.clone(),
                    weight: next,
                }
            })
            .collect()
    }
}

/// First model dimension the note names, by full name then by a distinctive token.
fn dimension_in_note(note: &str, model: &TasteModel) -> Option<String> {
    let tokens: BTreeSet<String> = tokenize(note).into_iter().collect();
    if tokens.is_empty() {
        return None;
    }
    let names = model.weighted_dimensions.keys();
    names
        .clone()
        .find(|name| tokenize(name).iter().all(|t| tokens.contains(t)))
        .or_else(|| {
            names.clone().find(|name| {
                tokenize(name)
                    .iter()
                    .filter(|t| !GENERIC_DIMENSION_TOKENS.contains(&t.as_str()))
                    .any(|t| tokens.contains(t))
            })
        })
        .cloned()
}

/// Red flags no hard/soft constraint or violation pattern already penalizes.
fn uncovered_red_flags(red_flags: &[String], model: &TasteModel) -> Vec<String> {
    let covering: Vec<Statement> = model
        .hard_constraints
        .iter()
        .chain(model.soft_constraints.iter())
        .chain(model.violation_patterns.iter())
        .map(|s| Statement::parse(s))
        .collect();
    red_flags
        .iter()
        .filter(|flag| !covering.iter().any(|s| s.matches(flag)))
        .cloned()
        .collect()
}

/// Review/approve/reject workflow over the three stores.
pub struct EvolutionService {
    listings: Arc<dyn ListingStore>,
    prefs: Arc<dyn PreferenceStore>,
    proposals: Arc<dyn ProposalStore>,
    engine: TasteEvolutionEngine,
}

impl EvolutionService {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        prefs: Arc<dyn PreferenceStore>,
        proposals: Arc<dyn ProposalStore>,
        engine: TasteEvolutionEngine,
    ) -> Self {
        Self {
            listings,
            prefs,
            proposals,
            engine,
        }
    }

    /// Return the open proposal, or compute and record a new one.
    ///
    /// An open proposal computed against an older version is rejected as
    /// outdated first; it can no longer be applied.
    pub async fn review(&self) -> Result<Option<TasteProposal>> {
        let model = self.prefs.current();
        if let Some(mut pending) = self.proposals.pending().await? {
            if pending.base_version == model.version {
                return Ok(Some(pending));
            }
            tracing::info!(
                proposal_id = %pending.id,
                base_version = pending.base_version,
                taste_version = model.version,
                "closing outdated proposal"
            );
            pending.reject(&format!("outdated: taste model is now v{}", model.version))?;
            self.proposals.save(&pending).await?;
        }

        let records = self.listings.recent_verdicts(usize::MAX).await?;
        let Some(proposal) = self.engine.propose(&records, &model) else {
            tracing::info!(taste_version = model.version, "no taste proposal warranted");
            return Ok(None);
        };
        self.proposals.save(&proposal).await?;
        tracing::info!(
            proposal_id = %proposal.id,
            taste_version = model.version,
            ops = proposal.diff.ops.len(),
            "taste proposal recorded"
        );
        Ok(Some(proposal))
    }

    /// Apply an open proposal atomically and mark it approved.
    ///
    /// A failed apply leaves the proposal open and the model unchanged. If a
    /// previous approval applied the diff but was interrupted before marking
    /// the proposal, the applied version is found in history instead of
    /// applying twice.
    pub async fn approve(&self, id: &str) -> Result<Arc<TasteModel>> {
        let mut proposal = self
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| HearthError::not_found("proposal", id))?;
        if proposal.status != ProposalStatus::Proposed {
            return Err(ProposalError::AlreadyDecided {
                id: proposal.id,
                status: proposal.status.to_string(),
            }
            .into());
        }

        if let Some(applied) = self.applied_version_of(id).await? {
            tracing::warn!(proposal_id = id, taste_version = applied, "reconciling interrupted approval");
            proposal.approve(applied)?;
            self.proposals.save(&proposal).await?;
            return self
                .prefs
                .version(applied)
                .await?
                .map(|v| Arc::new(v.model))
                .ok_or_else(|| HearthError::not_found("taste version", applied.to_string()));
        }

        let current = self.prefs.current();
        if proposal.base_version != current.version {
            return Err(ProposalError::Outdated {
                id: proposal.id,
                base: proposal.base_version,
                current: current.version,
            }
            .into());
        }

        let next = self
            .prefs
            .apply(
                &proposal.diff,
                proposal.base_version,
                VersionOrigin::Proposal {
                    proposal_id: proposal.id.clone(),
                },
            )
            .await?;
        proposal.approve(next.version)?;
        self.proposals.save(&proposal).await?;
        tracing::info!(proposal_id = id, taste_version = next.version, "taste proposal approved");
        Ok(next)
    }

    pub async fn reject(&self, id: &str, reason: &str) -> Result<TasteProposal> {
        let mut proposal = self
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| HearthError::not_found("proposal", id))?;
        proposal.reject(reason)?;
        self.proposals.save(&proposal).await?;
        tracing::info!(proposal_id = id, reason, "taste proposal rejected");
        Ok(proposal)
    }

    pub async fn proposals(&self) -> Result<Vec<TasteProposal>> {
        self.proposals.list().await
    }

    async fn applied_version_of(&self, id: &str) -> Result<Option<u64>> {
        let history = self.prefs.history().await?;
        Ok(history.iter().find_map(|v| match &v.origin {
            VersionOrigin::Proposal { proposal_id } if proposal_id == id => Some(v.version),
            _ => None,
        }))
    }
}
