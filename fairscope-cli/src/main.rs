//! Fairscope CLI: audit a scored dataset for group fairness.

mod commands;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Fairscope: group fairness auditing for binary classifiers
#[derive(Parser, Debug)]
#[command(name = "fairscope", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .fairscope/config.toml)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Analyze a dataset of scored predictions
    Analyze(AnalyzeArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct AnalyzeArgs {
    /// Dataset file (.json, .jsonl or .csv)
    file: PathBuf,

    /// Protected attribute to analyze; repeat for several. Defaults to the configured list.
    #[arg(short = 'a', long = "attribute")]
    attributes: Vec<String>,

    /// File format, when the extension does not say (json, jsonl, csv)
    #[arg(short, long)]
    format: Option<String>,

    /// CSV column holding the predicted score
    #[arg(long)]
    score_column: Option<String>,

    /// CSV column holding the ground-truth label
    #[arg(long)]
    label_column: Option<String>,

    /// CSV column holding an explicit predicted label
    #[arg(long)]
    prediction_column: Option<String>,

    /// Decision threshold for turning scores into predictions
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Groups smaller than this are reported as insufficient
    #[arg(long)]
    min_group_size: Option<usize>,

    /// Number of calibration bins
    #[arg(long)]
    bins: Option<usize>,

    /// Print the full result as JSON instead of a report
    #[arg(long)]
    json: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Progress and the report own stdout/stderr; logs stay quiet unless asked for.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "fairscope", "fairscope")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fairscope.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.quiet).await
}
