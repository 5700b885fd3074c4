use crate::config::Config;
use crate::core::listing::ListingRecord;
use crate::core::pipeline::{BatchReport, OutcomeStatus, PipelineStatus, RankedListing};
use crate::core::taste::{TasteProposal, TasteVersion, VersionOrigin};
use console::style;

pub fn render_status(config: &Config, status: &PipelineStatus) -> String {
    let mut lines = vec![
        format!("◆ {}", style("hearth status").bold()),
        String::new(),
        format!("  version      {}", env!("CARGO_PKG_VERSION")),
        format!("  workspace    {}", config.workspace_dir.display()),
        format!("  config       {}", config.config_path.display()),
        format!("  database     {}", config.database_path().display()),
        format!("  vision       {}", config.vision_model),
        format!("  text         {}", config.text_model),
        String::new(),
        format!("  taste model  v{}", status.taste_version),
        format!("  listings     {}", status.total),
        format!("    current    {}", status.current),
        format!("    pending    {}", status.pending),
        format!("    stale      {}", status.stale),
        format!("    no images  {}", status.without_images),
        format!("    failures   {}", status.with_failures),
        format!("    verdicts   {}", status.with_verdicts),
    ];
    if !status.scored_by_version.is_empty() {
        let tally: Vec<String> = status
            .scored_by_version
            .iter()
            .map(|(version, n)| format!("v{version}: {n}"))
            .collect();
        lines.push(format!("  scored by    {}", tally.join(", ")));
    }
    lines.join("\n")
}

pub fn render_batch(report: &BatchReport) -> String {
    let mut lines = Vec::with_capacity(report.outcomes.len() + 2);
    for outcome in &report.outcomes {
        let line = match outcome.status {
            OutcomeStatus::Scored if outcome.stages_run.is_empty() => {
                format!("  = {} up to date", outcome.listing_id)
            }
            OutcomeStatus::Scored => format!(
                "  {} {} fit {:.1} potential {:.1} ({})",
                style("✓").green(),
                outcome.listing_id,
                outcome.present_fit.unwrap_or_default(),
                outcome.potential.unwrap_or_default(),
                outcome
                    .stages_run
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            OutcomeStatus::Skipped => format!("  - {} skipped (no images)", outcome.listing_id),
            OutcomeStatus::Failed => format!(
                "  {} {} failed at {}: {}",
                style("✗").red(),
                outcome.listing_id,
                outcome
                    .failed_stage
                    .map_or_else(|| "load".to_string(), |s| s.to_string()),
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        };
        lines.push(line);
    }
    lines.push(String::new());
    lines.push(format!(
        "{} scored, {} skipped, {} failed",
        report.scored(),
        report.skipped(),
        report.failed()
    ));
    lines.join("\n")
}

pub fn render_rankings(ranked: &[RankedListing]) -> String {
    if ranked.is_empty() {
        return "No scored listings yet.".into();
    }
    let mut lines = vec![format!(
        "{:>4}  {:>6}  {:>9}  {:<20}  {}",
        "#", "fit", "potential", "quadrant", "listing"
    )];
    for (idx, item) in ranked.iter().enumerate() {
        let mut line = format!(
            "{:>4}  {:>6.1}  {:>9}  {:<20}  {}",
            idx + 1,
            item.present_fit,
            item.potential
                .map_or_else(|| "-".to_string(), |p| format!("{p:.1}")),
            item.quadrant
                .map_or_else(|| "-".to_string(), |q| q.to_string()),
            item.address
        );
        if !item.passed {
            line.push_str(" [deal-breaker]");
        }
        if let Some(warning) = &item.stale {
            line.push_str(&format!(" [stale: v{}]", warning.scored_version));
        }
        if let Some(verdict) = item.verdict {
            line.push_str(&format!(" [{verdict}]"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn render_list(records: &[ListingRecord]) -> String {
    if records.is_empty() {
        return "No listings yet. Use `hearth ingest` to add one.".into();
    }
    let score = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"));
    let mut lines = vec![format!(
        "{:<30}  {:>10}  {:>4}  {:>9}  {}",
        "id", "price", "fit", "potential", "address"
    )];
    for record in records {
        let id: String = record.listing_id.chars().take(30).collect();
        lines.push(format!(
            "{id:<30}  {:>10}  {:>4}  {:>9}  {}",
            record
                .metadata
                .price
                .map_or_else(|| "-".to_string(), |p| format!("${p}")),
            score(record.present_fit.as_ref().map(|pf| pf.score)),
            score(record.potential.as_ref().map(|p| p.score)),
            record.metadata.address
        ));
    }
    lines.join("\n")
}

pub fn render_listing(record: &ListingRecord, current_version: u64) -> String {
    let mut out = format!("# {} ({})\n", record.metadata.address, record.listing_id);
    if let Some(pf) = &record.present_fit {
        out.push_str(&format!(
            "\nPresent-fit {:.1}/100 under taste v{}{}\n{}\n",
            pf.score,
            pf.taste_version,
            if record.is_stale(current_version) {
                " (stale)"
            } else {
                ""
            },
            pf.justification
        ));
        for violation in &pf.violations {
            out.push_str(&format!(
                "  - {} violation: {} (-{:.1})\n",
                violation.kind, violation.statement, violation.penalty
            ));
        }
    }
    if let Some(pot) = &record.potential {
        out.push_str(&format!(
            "\nPotential {:.1}/100, {} work, {}\n{}\n",
            pot.score, pot.feasibility, pot.cost_class, pot.narrative
        ));
    }
    if let Some(stored) = &record.brief {
        out.push('\n');
        out.push_str(&stored.brief.to_markdown(&record.metadata.address));
    }
    for (stage, failure) in &record.stage_failures {
        out.push_str(&format!(
            "\n{} {stage} failed after {} attempt(s): {}\n",
            style("!").yellow(),
            failure.attempts,
            failure.message
        ));
    }
    out
}

pub fn render_proposal(proposal: &TasteProposal) -> String {
    let mut out = format!(
        "Proposal {} [{}] against taste v{}\n\n{}\n\nChanges:\n",
        proposal.id, proposal.status, proposal.base_version, proposal.rationale
    );
    for op in &proposal.diff.ops {
        out.push_str(&format!("  {}\n", op.describe()));
    }
    out.push_str("\nBasis:\n");
    for basis in &proposal.basis {
        out.push_str(&format!(
            "  {} {} at {:.1} ({}){}\n",
            basis.listing_id,
            basis.verdict,
            basis.predicted_score,
            basis.contradiction,
            basis
                .cited_dimension
                .as_deref()
                .map(|d| format!(", cites {d}"))
                .unwrap_or_default()
        ));
    }
    if let Some(reason) = &proposal.rejection_reason {
        out.push_str(&format!("\nRejected: {reason}\n"));
    }
    out
}

pub fn render_history(history: &[TasteVersion], scored_by_version: &[(u64, usize)]) -> String {
    let mut lines = Vec::with_capacity(history.len());
    for version in history {
        let origin = match &version.origin {
            VersionOrigin::Bootstrap => "bootstrap".to_string(),
            VersionOrigin::Proposal { proposal_id } => format!("proposal {proposal_id}"),
            VersionOrigin::Rollback { restored_version } => {
                format!("rollback to v{restored_version}")
            }
            VersionOrigin::Manual => "manual".to_string(),
        };
        let scored = scored_by_version
            .iter()
            .find(|(v, _)| *v == version.version)
            .map_or(0, |(_, n)| *n);
        lines.push(format!(
            "  v{:<4} {}  {:<48} {} listing(s) scored",
            version.version,
            version.created_at.format("%Y-%m-%d %H:%M"),
            origin,
            scored
        ));
    }
    lines.join("\n")
}
