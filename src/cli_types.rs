use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hotkeys")]
#[command(about = "Search keyboard shortcuts from a directory of JSON files")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Shortcuts directory, overrides the configured one
    #[arg(short, long, global = true, env = "HOTKEYS_DIR")]
    pub dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single query and print the result rows
    Query(QueryArgs),

    /// Read queries from stdin, following navigation results
    Interactive,

    /// Print change notifications as the shortcuts directory changes
    Watch(WatchArgs),

    /// Load the index and print repository statistics
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query text, e.g. `copy /word` or `list:chrome`
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Print rows as JSON
    #[arg(long)]
    pub json: bool,

    /// Show at most this many rows
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl QueryArgs {
    pub fn query(&self) -> String {
        self.text.join(" ")
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Re-run this query after every reload
    #[arg(short, long)]
    pub query: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}
