use crate::core::listing::Verdict;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod subcommands;

pub use subcommands::TasteCommands;

/// `hearth` - rank real-estate listings against an evolving taste model.
#[derive(Parser, Debug)]
#[command(name = "hearth")]
#[command(version)]
#[command(about = "Taste-driven listing evaluation pipeline.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config file, database and the initial taste model
    Init {
        /// Seed the taste model from an interactive interview
        #[arg(long)]
        interview: bool,

        /// API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Register a listing (deduplicated by normalized address)
    Ingest {
        /// JSON file holding one listing's metadata or an array of them
        #[arg(long, conflicts_with = "address")]
        file: Option<PathBuf>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        price: Option<u64>,

        #[arg(long)]
        description: Option<String>,

        /// Image URL; repeat for each image
        #[arg(long = "image")]
        images: Vec<String>,
    },

    /// Run the pipeline for one listing, or every pending listing
    Score {
        listing_id: Option<String>,
    },

    /// Every ingested listing with price and scores
    List,

    /// Show one listing's scores and brief
    Show {
        listing_id: String,
    },

    /// Remove a listing and everything recorded for it
    Delete {
        listing_id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Record liked / disliked / neutral for a listing
    Verdict {
        listing_id: String,

        verdict: Verdict,

        /// Free-text reason
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Append a free-text annotation to a listing
    Annotate {
        listing_id: String,
        text: String,
    },

    /// Compare verdicts against scores and propose a taste change
    Review,

    /// Apply a pending taste proposal
    Approve {
        proposal_id: String,
    },

    /// Reject a pending taste proposal
    Reject {
        proposal_id: String,

        #[arg(long, default_value = "rejected by user")]
        reason: String,
    },

    /// Inspect or roll back the taste model
    Taste {
        #[command(subcommand)]
        taste_command: TasteCommands,
    },

    /// Scored listings, best fit first
    Rank {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Pipeline and taste model status
    Status,
}
