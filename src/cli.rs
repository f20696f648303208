use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::collector::DEFAULT_INTERVAL_SECS;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Path to the collection database
    #[arg(long, default_value = "browsing_history.db")]
    pub db: PathBuf,

    /// Polling interval for the collection loop, in seconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Without a command, the continuous collection loop is started
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show recent history entries, newest first
    View {
        /// Maximum number of entries to print
        #[arg(default_value_t = 50)]
        limit: usize,

        /// Emit one JSON object per line instead of text
        #[arg(long)]
        json: bool,
    },
    /// Daily browsing report for today
    Report,
    /// Top visited domains over the last days
    Top {
        /// Size of the trailing window, in days
        #[arg(default_value_t = 7)]
        days: u32,
    },
    /// Search history by URL or title substring
    Search {
        /// Substring to match against url and title
        term: String,
    },
    /// Overall statistics across the whole store
    Summary,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
