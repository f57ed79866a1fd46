//! posdup - Exact and near duplicate position finder for JSON documents

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use posdup::cli::{self, Cli, Commands};
use posdup::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Scan(args) => {
            cli::scan::run_scan(&args, &config).await?;
        }
        Commands::Config(args) => {
            cli::run_config(&args, cli.config)?;
        }
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::from_default_env().add_directive(
        format!("posdup={}", level)
            .parse()
            .with_context(|| format!("Invalid log level: {}", level))?,
    );

    let (compact, json) = match config.general.log_format {
        LogFormat::Compact => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().with_writer(std::io::stderr).json()),
        ),
    };

    tracing_subscriber::registry()
        .with(compact)
        .with(json)
        .with(filter)
        .init();

    Ok(())
}
