//! CLI subcommand handlers.

use crate::AnalyzeArgs;
use crate::Commands;
use crate::ConfigAction;
use fairscope_core::config::{load_config, workspace_config_path};
use fairscope_core::{
    AnalysisConfig, AnalysisOutcome, CancellationToken, CsvColumns, DatasetFormat, DatasetSource,
    FairnessSummary, ProgressEvent, run_analysis,
};
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path, quiet: bool) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => handle_analyze(args, workspace, quiet).await,
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let default_config = AnalysisConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Merge command-line flags over the loaded configuration.
fn apply_overrides(config: &mut AnalysisConfig, args: &AnalyzeArgs) {
    if !args.attributes.is_empty() {
        config.protected_attributes = args.attributes.clone();
    }
    if let Some(threshold) = args.threshold {
        config.decision_threshold = Some(threshold);
    }
    if let Some(min_group_size) = args.min_group_size {
        config.min_group_size = min_group_size;
    }
    if let Some(bins) = args.bins {
        config.bins = bins;
    }
}

fn dataset_source(args: &AnalyzeArgs, config: &AnalysisConfig) -> anyhow::Result<DatasetSource> {
    let source = match &args.format {
        Some(format) => DatasetSource::new(&args.file, format.parse::<DatasetFormat>()?),
        None => DatasetSource::from_path(&args.file)?,
    };

    let mut columns = CsvColumns::default();
    if let Some(score) = &args.score_column {
        columns.score = score.clone();
    }
    if let Some(label) = &args.label_column {
        columns.label = label.clone();
    }
    columns.prediction = args.prediction_column.clone();

    Ok(source
        .with_attributes(config.protected_attributes.iter().cloned())
        .with_columns(columns))
}

async fn handle_analyze(args: AnalyzeArgs, workspace: &Path, quiet: bool) -> anyhow::Result<()> {
    let mut config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    apply_overrides(&mut config, &args);
    if config.protected_attributes.is_empty() {
        anyhow::bail!(
            "No protected attributes given. Pass --attribute or set protected_attributes in {}",
            workspace_config_path(workspace).display()
        );
    }

    let dataset = dataset_source(&args, &config)?.load().await?;
    let thresholds = config.thresholds;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling analysis...");
                cancel.cancel();
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let run = tokio::task::spawn_blocking(move || {
        run_analysis(&dataset, config, Arc::new(tx), cancel)
    });

    // The channel closes once the orchestrator drops its observer.
    let show_progress = !quiet && std::io::stderr().is_terminal();
    while let Some(event) = rx.recv().await {
        if show_progress {
            render_progress(&event);
        }
    }
    if show_progress {
        eprintln!();
    }
    ctrl_c.abort();

    let outcome = run.await??;
    let result = match outcome {
        AnalysisOutcome::Completed(result) => result,
        AnalysisOutcome::Cancelled => {
            eprintln!("Analysis cancelled; no results were produced.");
            return Ok(());
        }
    };

    let output = if args.json {
        result.to_json_pretty()?
    } else {
        let summary = FairnessSummary::from_result(&result, &thresholds);
        crate::report::render(&result, &summary)?
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, output).await?;
            if !quiet {
                eprintln!("Wrote results to {}", path.display());
            }
        }
        None => println!("{}", output),
    }
    Ok(())
}

fn render_progress(event: &ProgressEvent) {
    const WIDTH: usize = 24;
    let filled = (event.fraction() * WIDTH as f64).round() as usize;
    let mut stderr = std::io::stderr().lock();
    let _ = write!(
        stderr,
        "\r{:<13} [{}{}] {}/{}",
        event.stage,
        "#".repeat(filled),
        " ".repeat(WIDTH - filled.min(WIDTH)),
        event.completed,
        event.total
    );
    let _ = stderr.flush();
}
