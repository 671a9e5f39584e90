// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! rename-images: descriptive, dated file names for camera images

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rename_images::config::{AppConfig, EngineConfig, Provider};
use rename_images::date::DateResolver;
use rename_images::describe::{build_backend, DescriptionRequester, OllamaClient};
use rename_images::naming::FilenameSynthesizer;
use rename_images::pipeline::Pipeline;
use rename_images::plan::{Mode, RenamePlanner};
use rename_images::report::{OutputFormat, Reporter};
use rename_images::selector::{FileSelector, SelectOptions};
use rename_images::{RenameError, Result};

/// Rename camera images after what they show
#[derive(Parser, Debug)]
#[command(name = "rename-images")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Give camera images descriptive, dated file names", long_about = None)]
struct Cli {
    /// Image files and/or directories
    #[arg(required_unless_present = "write_default_config")]
    paths: Vec<PathBuf>,

    /// Include every image, not only camera-style names (IMG_*, UUIDs).
    /// Dot-files count as images too
    #[arg(long)]
    all: bool,

    /// Descend into subdirectories (hidden ones are skipped)
    #[arg(short, long)]
    recursive: bool,

    /// Vision model to use; repeat to compare models
    #[arg(short, long = "model", value_name = "MODEL")]
    models: Vec<String>,

    /// Prompt to use; repeat to compare prompts
    #[arg(short, long = "prompt", value_name = "TEXT")]
    prompts: Vec<String>,

    /// Show the new names without renaming anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Number of files described concurrently (1-20)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=20))]
    jobs: Option<u8>,

    /// Vision backend: openai or ollama
    #[arg(long)]
    provider: Option<Provider>,

    /// Backend base URL
    #[arg(long)]
    url: Option<String>,

    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "rename-images.json")]
    config: PathBuf,

    /// Write a default configuration file to --config and exit
    #[arg(long, conflicts_with = "paths")]
    write_default_config: bool,

    /// Skip Ollama health check on startup
    #[arg(long)]
    skip_health_check: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long)]
    quiet: bool,

    /// Output format for results
    #[arg(long, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the report on stdout stays parseable
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.write_default_config {
        return write_default_config(&cli.config);
    }

    let mut config = AppConfig::load(&cli.config)?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let format: OutputFormat = cli.format.parse()?;

    let selector = FileSelector::new(
        cli.paths.clone(),
        SelectOptions {
            recursive: cli.recursive,
            include_all: cli.all,
        },
    );
    if selector.valid_inputs().is_empty() {
        return Err(RenameError::NoInputs);
    }

    let models = or_default(&cli.models, &config.engine.default_model);
    let prompts = or_default(&cli.prompts, &config.engine.default_prompt);
    let mode = Mode::from_flags(models.len() > 1 || prompts.len() > 1, cli.dry_run);
    match mode {
        Mode::Comparison => warn!(
            "Comparing {} model(s) x {} prompt(s) - files will not be renamed",
            models.len(),
            prompts.len()
        ),
        Mode::DryRun => warn!("DRY RUN MODE - files will not be renamed"),
        Mode::Apply => {}
    }

    // Missing credentials fail here, before any file is touched
    let backend = build_backend(&config.engine)?;
    if config.engine.provider == Provider::Ollama && !cli.skip_health_check {
        check_ollama(&config.engine, &models).await?;
    }
    info!("Using {} at {}", backend.name(), config.engine.base_url());

    let requester = DescriptionRequester::new(backend, models, prompts, config.rules.jobs);
    let planner = RenamePlanner::new(FilenameSynthesizer::from_rules(&config.rules), mode);
    let mut pipeline = Pipeline::new(
        selector,
        DateResolver::default(),
        requester,
        planner,
        config.rules.jobs,
    );

    let mut reporter = Reporter::new(std::io::stdout(), format);
    reporter.empty_directories(&pipeline.selector().empty_directories())?;

    let shutdown_rx = spawn_interrupt_handler();
    let summary = pipeline
        .run(shutdown_rx, |report| {
            if let Err(e) = reporter.file(report) {
                error!("Cannot write report for {}: {}", report.file.file_name, e);
            }
        })
        .await;

    reporter.finish(&summary)?;
    Ok(())
}

/// Command-line values take precedence over the configuration file
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(jobs) = cli.jobs {
        config.rules.jobs = usize::from(jobs);
    }
    if let Some(provider) = cli.provider {
        if provider != config.engine.provider {
            // A URL configured for another provider would be wrong
            config.engine.url = None;
        }
        config.engine.provider = provider;
    }
    if let Some(url) = &cli.url {
        config.engine.url = Some(url.clone());
    }
}

fn or_default(values: &[String], default: &str) -> Vec<String> {
    if values.is_empty() {
        vec![default.to_string()]
    } else {
        values.to_vec()
    }
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(RenameError::Config(format!(
            "{} already exists, remove it first",
            path.display()
        )));
    }
    AppConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn check_ollama(engine: &EngineConfig, models: &[String]) -> Result<()> {
    let client = OllamaClient::new(engine.base_url(), Duration::from_secs(engine.timeout_secs))?;

    info!("Checking Ollama availability...");
    client.health_check().await?;
    info!("Ollama is running");

    for model in models {
        match client.model_available(model).await {
            Ok(true) => info!("Vision model '{}' available", model),
            Ok(false) => warn!("Vision model '{}' not found. Try: ollama pull {}", model, model),
            Err(e) => warn!("Could not list Ollama models: {}", e),
        }
    }
    Ok(())
}

/// First Ctrl+C stops new requests; a second one exits immediately
fn spawn_interrupt_handler() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => warn!("Received Ctrl+C, finishing in-flight requests (press again to quit)"),
            _ = terminate => warn!("Received SIGTERM, finishing in-flight requests"),
        }
        let _ = shutdown_tx.send(true);

        if signal::ctrl_c().await.is_ok() {
            error!("Interrupted again, exiting");
            std::process::exit(130);
        }
    });

    shutdown_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["rename-images", "photos"]).unwrap();
        assert_eq!(cli.paths, vec![PathBuf::from("photos")]);
        assert!(!cli.verbose);
        assert!(!cli.dry_run);
        assert!(cli.models.is_empty());
        assert_eq!(cli.config, PathBuf::from("rename-images.json"));
    }

    #[test]
    fn test_cli_repeated_models_and_prompts() {
        let cli = Cli::try_parse_from([
            "rename-images", "--model", "gpt-4o", "--model", "gpt-4o-mini",
            "--prompt", "Describe it", "-r", "--all", "-n", "IMG_1.jpg", "dir",
        ])
        .unwrap();

        assert_eq!(cli.models, vec!["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(cli.prompts, vec!["Describe it"]);
        assert!(cli.recursive && cli.all && cli.dry_run);
        assert_eq!(cli.paths.len(), 2);
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["rename-images"]).is_err());
        assert!(Cli::try_parse_from(["rename-images", "--write-default-config"]).is_ok());
        assert!(Cli::try_parse_from(["rename-images", "--write-default-config", "x.jpg"]).is_err());
    }

    #[test]
    fn test_cli_jobs_range() {
        assert!(Cli::try_parse_from(["rename-images", "-j", "0", "a"]).is_err());
        assert!(Cli::try_parse_from(["rename-images", "-j", "21", "a"]).is_err());
        let cli = Cli::try_parse_from(["rename-images", "-j", "20", "a"]).unwrap();
        assert_eq!(cli.jobs, Some(20));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["rename-images", "--format", "yaml", "a"]).is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = AppConfig::default();
        config.engine.url = Some("https://proxy.example/v1".to_string());
        let cli = Cli::try_parse_from([
            "rename-images", "--provider", "ollama", "-j", "8", "a",
        ])
        .unwrap();

        apply_overrides(&mut config, &cli);
        assert_eq!(config.engine.provider, Provider::Ollama);
        assert_eq!(config.engine.url, None);
        assert_eq!(config.engine.base_url(), "http://localhost:11434");
        assert_eq!(config.rules.jobs, 8);
    }

    #[test]
    fn test_default_model_and_prompt_fill_in() {
        assert_eq!(or_default(&[], "gpt-4o-mini"), vec!["gpt-4o-mini"]);
        let given = vec!["a".to_string(), "b".to_string()];
        assert_eq!(or_default(&given, "x"), given);
    }
}
