use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hotkeys::cli_types::{Cli, Commands, LogFormat};
use hotkeys::{CliApp, HotkeysConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let mut config = HotkeysConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.shortcuts_dir = dir;
    }

    let app = CliApp::new(config, cli.verbose > 0, !cli.no_color)?;

    match cli.command {
        Commands::Query(args) => app.query(args).await,
        Commands::Interactive => app.interactive().await,
        Commands::Watch(args) => app.watch(args).await,
        Commands::Stats(args) => app.stats(args).await,
    }
}

// Logs go to stderr so query output on stdout stays clean
fn init_tracing(verbose: u8, format: LogFormat) {
    let default_directive = match verbose {
        0 => "hotkeys=info",
        1 => "hotkeys=debug",
        _ => "hotkeys=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
