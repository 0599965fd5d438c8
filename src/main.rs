// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use linkscanner::core::error::AnalysisError;
use linkscanner::logging::initialize_logging;
use linkscanner::{Analyzer, EngineConfig};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Mirror log lines to stderr as well as the log file
    #[arg(long, global = true)]
    stderr_log: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a single URL
    Analyze {
        url: String,
        /// Key the rate limiter tracks this caller under
        #[arg(long, default_value = "cli")]
        client: String,
    },
    /// Analyze up to ten URLs concurrently
    Bulk {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = "cli")]
        client: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    initialize_logging(cli.stderr_log)?;

    let config = EngineConfig::from_env()?;
    let analyzer = Analyzer::from_config(config)?;
    info!(command = ?cli.command, "Starting linkscanner.");

    let outcome = match &cli.command {
        Command::Analyze { url, client } => analyzer
            .analyze(url, client)
            .await
            .map(|outcome| render(&outcome, cli.pretty)),
        Command::Bulk { urls, client } => analyzer
            .analyze_bulk(urls, client)
            .await
            .map(|entries| render(&entries, cli.pretty)),
    };

    match outcome {
        Ok(json) => {
            println!("{}", json?);
            Ok(())
        }
        Err(e) => report_failure(&e, cli.pretty),
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Prints the structured `{kind, message}` payload and exits non-zero.
fn report_failure(e: &AnalysisError, pretty: bool) -> Result<()> {
    error!(kind = e.kind(), error = %e, "Analysis failed.");
    println!("{}", render(&e.payload(), pretty)?);
    std::process::exit(1);
}
