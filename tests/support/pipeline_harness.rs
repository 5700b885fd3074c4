#![allow(dead_code, clippy::needless_lifetimes)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use hearth::Config;
use hearth::config::{EvolutionConfig, PipelineConfig, ScoringConfig};
use hearth::core::db::open_pool;
use hearth::core::listing::{ListingMetadata, SqliteListingStore, VisionDescriptor};
use hearth::core::pipeline::Orchestrator;
use hearth::core::providers::{Brief, BriefInputs, BriefNarrator, VisionDescriber};
use hearth::core::taste::{
    EvolutionService, PreferenceStore, SqlitePreferenceStore, SqliteProposalStore, TasteDiff,
    TasteEvolutionEngine, TasteModel, TasteOp, VersionOrigin,
};
use hearth::error::{ProviderError, Result};

/// How a scripted capability should fail for one listing.
#[derive(Debug, Clone, Copy)]
enum Failure {
    Transient(u32),
    Permanent,
}

#[derive(Default)]
struct Script {
    failures: Mutex<HashMap<String, Failure>>,
    calls: AtomicUsize,
}

impl Script {
    /// Consume one scripted failure for `listing_id`, if any.
    fn next_failure(&self, capability: &str, listing_id: &str) -> Option<ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.failures.lock().unwrap();
        match failures.get(listing_id).copied() {
            Some(Failure::Permanent) => Some(ProviderError::permanent(capability, "400 bad request")),
            Some(Failure::Transient(remaining)) => {
                if remaining <= 1 {
                    failures.remove(listing_id);
                } else {
                    failures.insert(listing_id.to_string(), Failure::Transient(remaining - 1));
                }
                Some(ProviderError::transient(capability, "503 upstream unavailable"))
            }
            None => None,
        }
    }

    fn set(&self, listing_id: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert(listing_id.to_string(), failure);
    }

    fn clear(&self, listing_id: &str) {
        self.failures.lock().unwrap().remove(listing_id);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Vision double returning per-address dimension signals.
#[derive(Default)]
pub struct ScriptedDescriber {
    script: Script,
    signals: Mutex<HashMap<String, BTreeMap<String, f64>>>,
    descriptors: Mutex<HashMap<String, VisionDescriptor>>,
}

impl ScriptedDescriber {
    pub fn with_signals(&self, address: &str, signals: &[(&str, f64)]) {
        self.signals.lock().unwrap().insert(
            address.to_string(),
            signals
                .iter()
                .map(|(name, value)| ((*name).to_string(), *value))
                .collect(),
        );
    }

    /// Return `descriptor` verbatim for `address`.
    pub fn with_descriptor(&self, address: &str, descriptor: VisionDescriptor) {
        self.descriptors
            .lock()
            .unwrap()
            .insert(address.to_string(), descriptor);
    }

    pub fn fail_transient(&self, listing_id: &str, times: u32) {
        self.script.set(listing_id, Failure::Transient(times));
    }

    pub fn fail_permanent(&self, listing_id: &str) {
        self.script.set(listing_id, Failure::Permanent);
    }

    pub fn heal(&self, listing_id: &str) {
        self.script.clear(listing_id);
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    fn descriptor_for(&self, address: &str) -> VisionDescriptor {
        if let Some(fixed) = self.descriptors.lock().unwrap().get(address) {
            return fixed.clone();
        }
        let signals = self
            .signals
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| {
                BTreeMap::from([
                    ("natural_light".to_string(), 70.0),
                    ("kitchen_quality".to_string(), 60.0),
                ])
            });
        VisionDescriptor {
            dimension_signals: signals,
            red_flags: vec!["Dated bathroom fixtures".into()],
            positive_signals: vec!["Original hardwood floors".into()],
            overall_aesthetic: Some(6.0),
            renovation_state: Some("original".into()),
            ..VisionDescriptor::default()
        }
    }
}

impl VisionDescriber for ScriptedDescriber {
    fn describe<'a>(
        &'a self,
        listing_id: &'a str,
        metadata: &'a ListingMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<VisionDescriptor>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(err) = self.script.next_failure("vision", listing_id) {
                return Err(err.into());
            }
            Ok(self.descriptor_for(&metadata.address))
        })
    }
}

/// Brief double that records the taste version it was asked to narrate.
#[derive(Default)]
pub struct ScriptedNarrator {
    script: Script,
    blank: Mutex<HashSet<String>>,
}

impl ScriptedNarrator {
    /// Answer with an empty brief for `listing_id`.
    pub fn blank_brief(&self, listing_id: &str) {
        self.blank.lock().unwrap().insert(listing_id.to_string());
    }

    pub fn fail_transient(&self, listing_id: &str, times: u32) {
        self.script.set(listing_id, Failure::Transient(times));
    }

    pub fn fail_permanent(&self, listing_id: &str) {
        self.script.set(listing_id, Failure::Permanent);
    }

    pub fn heal(&self, listing_id: &str) {
        self.script.clear(listing_id);
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl BriefNarrator for ScriptedNarrator {
    fn narrate<'a>(
        &'a self,
        inputs: BriefInputs<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Brief>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(err) = self.script.next_failure("brief", inputs.listing_id) {
                return Err(err.into());
            }
            if self.blank.lock().unwrap().contains(inputs.listing_id) {
                return Ok(Brief::default());
            }
            Ok(Brief {
                executive_summary: format!(
                    "{} scores {:.0} under taste v{}.",
                    inputs.metadata.address,
                    inputs.present_fit.score,
                    inputs.present_fit.taste_version
                ),
                strengths: inputs.descriptor.positive_signals.clone(),
                weaknesses: inputs.descriptor.red_flags.clone(),
                deal_breakers: Vec::new(),
                verdict: "consider".into(),
            })
        })
    }
}

pub struct Harness {
    _workspace: TempDir,
    pub config: Config,
    pub listings: Arc<SqliteListingStore>,
    pub prefs: Arc<SqlitePreferenceStore>,
    pub describer: Arc<ScriptedDescriber>,
    pub narrator: Arc<ScriptedNarrator>,
    pub orchestrator: Orchestrator,
    pub evolution: EvolutionService,
}

pub async fn harness() -> Harness {
    harness_with(TasteModel::bootstrap(), PipelineConfig::default()).await
}

pub async fn harness_with(seed: TasteModel, pipeline: PipelineConfig) -> Harness {
    let workspace = TempDir::new().unwrap();
    let config = Config {
        workspace_dir: workspace.path().to_path_buf(),
        pipeline,
        ..Config::default()
    };
    let pool = open_pool(&config).await.unwrap();
    let listings = Arc::new(SqliteListingStore::new(pool.clone()).await.unwrap());
    let prefs = Arc::new(SqlitePreferenceStore::with_seed(pool.clone(), seed).await.unwrap());
    let proposals = Arc::new(SqliteProposalStore::new(pool).await.unwrap());
    let describer = Arc::new(ScriptedDescriber::default());
    let narrator = Arc::new(ScriptedNarrator::default());

    let orchestrator = Orchestrator::new(
        listings.clone(),
        prefs.clone(),
        describer.clone(),
        narrator.clone(),
        ScoringConfig::default(),
        config.pipeline.clone(),
    );
    let evolution = EvolutionService::new(
        listings.clone(),
        prefs.clone(),
        proposals,
        TasteEvolutionEngine::new(EvolutionConfig::default()),
    );

    Harness {
        _workspace: workspace,
        config,
        listings,
        prefs,
        describer,
        narrator,
        orchestrator,
        evolution,
    }
}

pub fn listing(address: &str, images: usize) -> ListingMetadata {
    ListingMetadata {
        address: address.to_string(),
        price: Some(650_000),
        description: format!("Charming home at {address}"),
        image_urls: (0..images)
            .map(|i| format!("https://photos.example.com/{i}.jpg"))
            .collect(),
        ..ListingMetadata::default()
    }
}

impl Harness {
    pub async fn ingest(&self, address: &str, images: usize) -> String {
        self.orchestrator
            .ingest(listing(address, images))
            .await
            .unwrap()
            .listing_id
    }

    /// Bump the taste model by one version with a harmless principle.
    pub async fn bump_taste(&self, principle: &str) -> u64 {
        let base = self.prefs.current().version;
        let diff = TasteDiff::new(vec![TasteOp::AddPrinciple {
            text: principle.to_string(),
        }]);
        self.prefs
            .apply(&diff, base, VersionOrigin::Manual)
            .await
            .unwrap()
            .version
    }
}
