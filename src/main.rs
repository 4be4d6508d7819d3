//! Command-line interface for compacted-view
//!
//! # Usage Examples
//!
//! ```bash
//! # Replay a script with JSON payloads
//! compacted-view replay --script users.jsonl
//!
//! # Stop after the first 100 steps and print YAML
//! compacted-view replay --script users.jsonl --max-steps 100 --output yaml
//!
//! # Verbose processor logs
//! compacted-view --log-level debug replay --script users.jsonl
//! ```
//!
//! ## Script Format
//! One JSON object per line, tagged by `type`:
//! - `message`: `topic`, `partition`, `offset`, optional `key` and `payload`
//! - `eof`: `topic`, `partition`
//! - `error`: `topic`, `partition`, `reason`, optional `code`
//! - `rebalance`: `assignment`, a list of `topic`/`partition`/`offset`

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use compacted_view::{run_replay, ReplayOpts, Snapshot};
use tracing::info;

#[derive(Parser)]
#[command(name = "compacted-view")]
#[command(about = "A tool for rebuilding the key/value view of compacted topics")]
#[command(long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(
        long,
        global = true,
        default_value = "info",
        env = "COMPACTED_VIEW_LOG_LEVEL"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script through the processor and print the resulting view
    Replay {
        #[command(flatten)]
        opts: ReplayOpts,

        /// Snapshot output format
        #[arg(
            long,
            value_enum,
            default_value = "json",
            env = "COMPACTED_VIEW_OUTPUT"
        )]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    #[value(name = "json")]
    Json,
    #[value(name = "yaml")]
    Yaml,
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "compacted_view={level},compacted_topic={level}",
            level = cli.log_level
        ))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay { opts, output } => {
            info!("Replaying {}", opts.script.display());
            let snapshot = run_replay(&opts)
                .with_context(|| format!("Replay of {} failed", opts.script.display()))?;
            print_snapshot(&snapshot, output)?;
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, output: OutputFormat) -> anyhow::Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)?,
        OutputFormat::Yaml => serde_yaml::to_string(snapshot)?,
    };
    println!("{rendered}");
    Ok(())
}
