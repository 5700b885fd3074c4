use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum TasteCommands {
    /// Render the current taste model as markdown
    Show,
    /// List every retained version
    History,
    /// Write a new version whose content equals an older one
    Rollback { version: u64 },
    /// List every proposal, including rejected ones
    Proposals,
}
