use super::reliable::classify_provider_error;
use super::traits::{Provider, extract_json};
use crate::core::listing::{ListingMetadata, VisionDescriptor};
use crate::core::scoring::{PotentialResult, PresentFitResult};
use crate::core::taste::TasteModel;
use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Structured narrative verdict for one listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub executive_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub deal_breakers: Vec<String>,
    pub verdict: String,
}

impl Brief {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.executive_summary.trim().is_empty() {
            return Err(ValidationError::Brief("empty executive_summary".into()));
        }
        if self.verdict.trim().is_empty() {
            return Err(ValidationError::Brief("empty verdict".into()));
        }
        Ok(())
    }

    pub fn to_markdown(&self, title: &str) -> String {
        fn bullets(out: &mut String, heading: &str, items: &[String]) {
            if items.is_empty() {
                return;
            }
            out.push_str(&format!("\n## {heading}\n"));
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        }

        let mut out = format!("# {title}\n\n## Executive Summary\n{}\n", self.executive_summary);
        bullets(&mut out, "Strengths", &self.strengths);
        bullets(&mut out, "Weaknesses", &self.weaknesses);
        bullets(&mut out, "Deal-Breakers", &self.deal_breakers);
        out.push_str(&format!("\n## Verdict\n{}\n", self.verdict));
        out
    }
}

/// Everything the narrator may read. All inputs are final for one taste version.
pub struct BriefInputs<'a> {
    pub listing_id: &'a str,
    pub metadata: &'a ListingMetadata,
    pub descriptor: &'a VisionDescriptor,
    pub present_fit: &'a PresentFitResult,
    pub potential: &'a PotentialResult,
    pub taste: &'a TasteModel,
}

/// Capability: synthesize a brief from the descriptor and both scores.
pub trait BriefNarrator: Send + Sync {
    fn narrate<'a>(
        &'a self,
        inputs: BriefInputs<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Brief>> + Send + 'a>>;
}

const BRIEF_SYSTEM_PROMPT: &str = "You write house briefs that help one buyer decide whether \
to pursue a listing. Be honest about problems and direct in the verdict. Ground every point in \
the analysis provided; do not invent features. Reply with JSON only.";

const BRIEF_RESPONSE_SHAPE: &str = r#"Respond with a JSON object in exactly this shape:
{
  "executive_summary": "2-3 sentences",
  "strengths": ["..."],
  "weaknesses": ["..."],
  "deal_breakers": ["..."],
  "verdict": "pursue | consider | pass, with one sentence why"
}"#;

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join("; ")
    }
}

pub(crate) fn build_brief_prompt(inputs: &BriefInputs<'_>) -> String {
    let d = inputs.descriptor;
    let pf = inputs.present_fit;
    let pot = inputs.potential;
    let violations: Vec<String> = pf
        .violations
        .iter()
        .map(|v| format!("{} ({})", v.statement, v.kind))
        .collect();
    let deal_breakers: Vec<String> = pf
        .deal_breakers()
        .map(|v| match &v.evidence {
            Some(evidence) => format!("{} ({evidence})", v.statement),
            None => v.statement.clone(),
        })
        .collect();
    let principles: Vec<String> = inputs.taste.principles.iter().take(5).cloned().collect();
    let anti: Vec<String> = inputs.taste.anti_principles.iter().take(5).cloned().collect();

    format!(
        "## Listing\nAddress: {address}\nPrice: {price}\n\n\
         ## Vision\nOverall aesthetic: {overall}\nStyle: {style}\n\
         Red flags: {flags}\nPositive signals: {positives}\n\n\
         ## Present-fit {pf_score:.1}/100 (taste v{version})\nPassed: {passed}\n\
         Violations: {violations}\nDeal-breakers: {deal_breakers}\nJustification: {justification}\n\n\
         ## Potential {pot_score:.1}/100\nFeasibility: {feasibility}\nCost: {cost}\n\
         Upside: {narrative}\nRisks: {risks}\n\n\
         ## Buyer principles\n{principles}\n## Buyer anti-principles\n{anti}\n\n{shape}",
        address = inputs.metadata.address,
        price = inputs
            .metadata
            .price
            .map_or_else(|| "n/a".to_string(), |p| format!("${p}")),
        overall = d
            .overall_aesthetic
            .map_or_else(|| "n/a".to_string(), |v| format!("{v}/10")),
        style = d.architectural_style.as_deref().unwrap_or("unknown"),
        flags = list_or_none(&d.red_flags),
        positives = list_or_none(&d.positive_signals),
        pf_score = pf.score,
        version = pf.taste_version,
        passed = if pf.passed { "yes" } else { "no" },
        violations = list_or_none(&violations),
        deal_breakers = list_or_none(&deal_breakers),
        justification = pf.justification,
        pot_score = pot.score,
        feasibility = pot.feasibility,
        cost = pot.cost_class,
        narrative = pot.narrative,
        risks = list_or_none(&pot.risk_notes),
        principles = list_or_none(&principles),
        anti = list_or_none(&anti),
        shape = BRIEF_RESPONSE_SHAPE,
    )
}

/// Parse and validate a brief reply.
pub fn parse_brief(reply: &str) -> Result<Brief> {
    let brief: Brief =
        serde_json::from_str(extract_json(reply)).map_err(|err| ValidationError::Unparseable {
            what: "brief",
            message: err.to_string(),
        })?;
    brief.validate()?;
    Ok(brief)
}

/// `BriefNarrator` backed by a text chat provider.
pub struct LlmNarrator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl LlmNarrator {
    pub fn new(provider: Arc<dyn Provider>, model: &str, temperature: f64) -> Self {
        Self {
            provider,
            model: model.to_string(),
            temperature,
        }
    }
}

impl BriefNarrator for LlmNarrator {
    fn narrate<'a>(
        &'a self,
        inputs: BriefInputs<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Brief>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = build_brief_prompt(&inputs);
            tracing::debug!(listing_id = inputs.listing_id, "requesting brief");
            let reply = self
                .provider
                .chat_with_system(
                    Some(BRIEF_SYSTEM_PROMPT),
                    &prompt,
                    &self.model,
                    self.temperature,
                )
                .await
                .map_err(|err| classify_provider_error("brief", &err))?;
            parse_brief(&reply)
        })
    }
}
