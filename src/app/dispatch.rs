use crate::app::interview::run_interview;
use crate::app::status::{
    render_batch, render_history, render_list, render_listing, render_proposal, render_rankings,
    render_status,
};
use crate::cli::commands::{Cli, Commands, TasteCommands};
use crate::config::Config;
use crate::core::db::open_pool;
use crate::core::listing::{ListingMetadata, SqliteListingStore};
use crate::core::pipeline::Orchestrator;
use crate::core::providers::{LlmDescriber, LlmNarrator, OpenRouterProvider, Provider};
use crate::core::taste::{
    EvolutionService, PreferenceStore, SqlitePreferenceStore, SqliteProposalStore,
    TasteEvolutionEngine, TasteModel,
};
use crate::observability::{ObserverEvent, create_observer};
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs, opened against one database.
struct Services {
    prefs: Arc<SqlitePreferenceStore>,
    orchestrator: Orchestrator,
    evolution: EvolutionService,
}

async fn open_services(config: &Config, seed: Option<TasteModel>) -> Result<Services> {
    let pool = open_pool(config).await?;
    let listings = Arc::new(SqliteListingStore::new(pool.clone()).await?);
    let prefs = Arc::new(match seed {
        Some(seed) => SqlitePreferenceStore::with_seed(pool.clone(), seed).await?,
        None => SqlitePreferenceStore::new(pool.clone()).await?,
    });
    let proposals = Arc::new(SqliteProposalStore::new(pool).await?);

    let provider: Arc<dyn Provider> = Arc::new(OpenRouterProvider::new(config.api_key.as_deref()));
    let describer = Arc::new(LlmDescriber::new(
        Arc::clone(&provider),
        &config.vision_model,
        config.temperature,
        config.pipeline.max_images,
    ));
    let narrator = Arc::new(LlmNarrator::new(
        provider,
        &config.text_model,
        config.temperature,
    ));

    let orchestrator = Orchestrator::new(
        listings.clone(),
        prefs.clone(),
        describer,
        narrator,
        config.scoring.clone(),
        config.pipeline.clone(),
    )
    .with_observer(create_observer(&config.observability));
    let evolution = EvolutionService::new(
        listings,
        prefs.clone(),
        proposals,
        TasteEvolutionEngine::new(config.evolution.clone()),
    );

    Ok(Services {
        prefs,
        orchestrator,
        evolution,
    })
}

fn read_metadata_file(path: &Path) -> Result<Vec<ListingMetadata>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&contents).context("Listing file is not valid JSON")?;
    let listings = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|one| vec![one])
    }
    .context("Listing file does not match the listing metadata shape")?;
    Ok(listings)
}

async fn run_init(config: &Config, interview: bool, api_key: Option<String>) -> Result<()> {
    let mut config = config.clone();
    if let Some(key) = api_key {
        config.api_key = Some(key);
        config.save()?;
    }
    let seed = if interview {
        Some(TasteModel::from_interview(&run_interview()?))
    } else {
        None
    };
    let services = open_services(&config, seed).await?;
    let current = services.prefs.current();
    println!(
        "Workspace ready at {} with taste model v{}.",
        config.workspace_dir.display(),
        current.version
    );
    if interview && current.version > 1 {
        println!("Existing taste history kept; interview answers were not applied.");
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    if let Commands::Init { interview, api_key } = cli.command {
        return run_init(&config, interview, api_key).await;
    }

    let services = open_services(&config, None).await?;

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Ingest {
            file,
            address,
            url,
            price,
            description,
            images,
        } => {
            let batch = match (file, address) {
                (Some(path), _) => read_metadata_file(&path)?,
                (None, Some(address)) => vec![ListingMetadata {
                    address,
                    url,
                    price,
                    description: description.unwrap_or_default(),
                    image_urls: images,
                    ..ListingMetadata::default()
                }],
                (None, None) => bail!("Provide --address or --file"),
            };
            for metadata in batch {
                let ingested = services.orchestrator.ingest(metadata).await?;
                if ingested.created {
                    println!("+ {}", ingested.listing_id);
                } else {
                    println!("= {} (already ingested)", ingested.listing_id);
                }
            }
        }

        Commands::Score { listing_id } => {
            let ids = match listing_id {
                Some(id) => vec![id],
                None => services.orchestrator.pending_listings().await?,
            };
            if ids.is_empty() {
                println!("Nothing pending.");
                return Ok(());
            }
            let report = services.orchestrator.run_batch(&ids).await;
            println!("{}", render_batch(&report));
        }

        Commands::List => {
            let records = services.orchestrator.all_listings().await?;
            println!("{}", render_list(&records));
        }

        Commands::Delete { listing_id, force } => {
            let record = services.orchestrator.listing(&listing_id).await?;
            let confirmed = force
                || Confirm::new()
                    .with_prompt(format!("Delete listing '{}'?", record.metadata.address))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Kept {listing_id}.");
                return Ok(());
            }
            services.orchestrator.delete_listing(&listing_id).await?;
            println!("{} Deleted {listing_id}.", style("✓").green());
        }

        Commands::Show { listing_id } => {
            let record = services.orchestrator.listing(&listing_id).await?;
            println!("{}", render_listing(&record, services.prefs.current().version));
        }

        Commands::Verdict {
            listing_id,
            verdict,
            note,
        } => {
            services
                .orchestrator
                .record_verdict(&listing_id, verdict, &note)
                .await?;
            println!("Recorded {verdict} for {listing_id}.");
        }

        Commands::Annotate { listing_id, text } => {
            let record = services.orchestrator.annotate(&listing_id, &text).await?;
            println!("{} annotation(s) on {listing_id}.", record.annotations.len());
        }

        Commands::Review => match services.evolution.review().await? {
            Some(proposal) => println!("{}", render_proposal(&proposal)),
            None => println!("No repeated pattern in recent feedback; taste model unchanged."),
        },

        Commands::Approve { proposal_id } => {
            let model = services.evolution.approve(&proposal_id).await?;
            services.orchestrator.observer().record_event(&ObserverEvent::TasteVersionApplied {
                version: model.version,
                origin: format!("proposal {proposal_id}"),
            });
            println!(
                "Taste model is now v{}. Rescore with `hearth score`.",
                model.version
            );
        }

        Commands::Reject {
            proposal_id,
            reason,
        } => {
            services.evolution.reject(&proposal_id, &reason).await?;
            println!("Proposal {proposal_id} rejected.");
        }

        Commands::Taste { taste_command } => match taste_command {
            TasteCommands::Show => println!("{}", services.prefs.current().distill()),
            TasteCommands::History => {
                let history = services.prefs.history().await?;
                let status = services.orchestrator.status().await?;
                println!("{}", render_history(&history, &status.scored_by_version));
            }
            TasteCommands::Rollback { version } => {
                let model = services.prefs.rollback(version).await?;
                services.orchestrator.observer().record_event(
                    &ObserverEvent::TasteVersionApplied {
                        version: model.version,
                        origin: format!("rollback to v{version}"),
                    },
                );
                println!(
                    "Taste model v{} restores v{version}.",
                    model.version
                );
            }
            TasteCommands::Proposals => {
                let proposals = services.evolution.proposals().await?;
                if proposals.is_empty() {
                    println!("No proposals yet.");
                }
                for proposal in proposals {
                    println!("{}", render_proposal(&proposal));
                }
            }
        },

        Commands::Rank { limit } => {
            let mut ranked = services.orchestrator.rankings().await?;
            if let Some(limit) = limit {
                ranked.truncate(limit);
            }
            println!("{}", render_rankings(&ranked));
        }

        Commands::Status => {
            let status = services.orchestrator.status().await?;
            println!("{}", render_status(&config, &status));
        }
    }

    Ok(())
}
