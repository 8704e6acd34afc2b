// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! tyrescan: tyre assessment from photos and short clips

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use tyrescan::assessment::{AnalysisResult, AnalysisState};
use tyrescan::backend::ollama::OllamaClient;
use tyrescan::config::{AppConfig, BackendKind};
use tyrescan::frames::ffmpeg::FfmpegDecoder;
use tyrescan::history::{create_entry, History};
use tyrescan::media::{MediaAsset, ViewType};
use tyrescan::pipeline::{CompletionStatus, Pipeline, PipelineReport, ViewRequest};
use tyrescan::{Result, TyrescanError};

/// tyrescan CLI - tyre assessment via a vision model
#[derive(Parser, Debug)]
#[command(name = "tyrescan")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Assess tyre size and tread condition from photos or short clips", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze tread and/or sidewall media
    Analyze {
        /// Tread photo or clip
        #[arg(long)]
        tread: Option<PathBuf>,

        /// Sidewall photo or clip
        #[arg(long)]
        sidewall: Option<PathBuf>,

        /// Output format for results
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Seed for keyframe selection (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show backend and decoder status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Assessment history
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent history entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

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

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Analyze { tread, sidewall, format, seed } => {
            run_analyze(config, tread, sidewall, &format, seed).await
        }
        Commands::Status => run_status(config).await,
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::History { action } => run_history_command(config, action),
    }
}

/// Analyze the given views and print the assessment
async fn run_analyze(
    mut config: AppConfig,
    tread: Option<PathBuf>,
    sidewall: Option<PathBuf>,
    format: &str,
    seed: Option<u64>,
) -> Result<()> {
    if seed.is_some() {
        config.sampler.seed = seed;
    }

    let mut requests = Vec::new();
    for (view, path) in [(ViewType::TreadView, tread), (ViewType::SidewallView, sidewall)] {
        if let Some(path) = path {
            let media = MediaAsset::from_file(&path)?;
            info!("{}: {} ({} bytes)", view, path.display(), media.size());
            requests.push(ViewRequest::new(view, media));
        }
    }
    if requests.is_empty() {
        return Err(TyrescanError::Input("give at least one of --tread or --sidewall".to_string()));
    }

    let digests: Vec<(ViewType, String)> = requests
        .iter()
        .map(|r| (r.view, r.media.digest()))
        .collect();

    let pipeline = Pipeline::from_config(&config)?;
    let report = pipeline.run(requests, AnalysisState::new()).await;

    if config.history.enabled {
        let history = History::new(PathBuf::from(&config.history.path));
        if let Err(e) = history.append(&create_entry(digests, &report)) {
            warn!("Failed to record history: {}", e);
        }
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report.to_response())?);
    } else {
        print!("{}", format_report(&report));
    }

    let status = report.status();
    match report.error {
        Some(e) if status == CompletionStatus::Failed => Err(e),
        Some(e) => {
            warn!("Stopped early: {}", e);
            std::process::exit(2);
        }
        None => Ok(()),
    }
}

fn format_report(report: &PipelineReport) -> String {
    let mut out = String::new();

    for view in report.state.views() {
        let Some(result) = report.state.get(view) else {
            continue;
        };
        let _ = writeln!(out, "{}:", view);
        format_result(&mut out, result);
    }

    if let (Some(view), Some(err)) = (report.failed_view, &report.error) {
        let _ = writeln!(out, "{}: failed ({:?})", view, err.kind());
        let _ = writeln!(out, "  {}", err);
    }

    out
}

fn format_result(out: &mut String, result: &AnalysisResult) {
    if let Some(size) = &result.tyre_size {
        let _ = writeln!(out, "  Size:        {}", size.full_size.as_str());
        let _ = writeln!(
            out,
            "  Width {} / aspect {} / rim {}",
            size.width.as_str(),
            size.aspect_ratio.as_str(),
            size.wheel_diameter.as_str()
        );
        let _ = writeln!(out, "  Image clear: {}", yes_no(size.is_image_clear));
    }

    if let Some(safety) = &result.safety {
        let _ = writeln!(out, "  Safe to drive:     {}", yes_no(safety.is_safe_to_drive));
        let _ = writeln!(out, "  Visible damage:    {}", yes_no(safety.visible_damage));
        let _ = writeln!(out, "  Sufficient tread:  {}", yes_no(safety.sufficient_tread));
        let _ = writeln!(out, "  Uneven wear:       {}", yes_no(safety.uneven_wear));
        let _ = writeln!(out, "  Needs replacement: {}", yes_no(safety.needs_replacement));
    }

    if let Some(exp) = &result.explanations {
        for (label, text) in [
            ("Safety", &exp.safety),
            ("Damage", &exp.damage),
            ("Tread", &exp.tread),
            ("Wear", &exp.wear),
            ("Replacement", &exp.replacement),
        ] {
            if !text.is_empty() {
                let _ = writeln!(out, "  {}: {}", label, text);
            }
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("tyrescan v{} Status", env!("CARGO_PKG_VERSION"));
    println!("====================");

    match config.backend.kind {
        BackendKind::Ollama => {
            let client = OllamaClient::new(&config.backend.url, &config.backend.model)?;
            match client.health_check().await {
                Ok(()) => println!("Ollama ({}): Running", config.backend.url),
                Err(e) => println!("Ollama ({}): Error - {}", config.backend.url, e),
            }

            match client.list_models().await {
                Ok(models) => {
                    println!("\nAvailable models:");
                    for m in &models {
                        let marker = if m.starts_with(client.model()) { "→" } else { " " };
                        println!("  {} {}", marker, m);
                    }
                }
                Err(e) => println!("  Error listing models: {}", e),
            }

            if let Ok(false) = client.model_available().await {
                println!("\nModel '{}' is not pulled. Try: ollama pull {}", client.model(), client.model());
            }
        }
        BackendKind::Remote => {
            println!("Remote analysis service: {}", config.backend.url);
        }
    }

    let ffmpeg = if FfmpegDecoder::available().await { "found" } else { "missing (video input disabled)" };
    println!("\nffmpeg/ffprobe: {}", ffmpeg);

    println!("\nConfiguration:");
    println!("  Deadline per view: {}s", config.backend.timeout_secs);
    println!("  Keyframes per clip: {}", config.sampler.max_frames);
    println!("  Schema profile: {:?}", config.schema_profile);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Backend: {:?} at {}", config.backend.kind, config.backend.url);
            println!("  Model: {}", config.backend.model);
        }
    }

    Ok(())
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    let history = History::new(PathBuf::from(&config.history.path));

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            println!("Recent history ({} entries):", entries.len());
            for entry in entries {
                let views: Vec<&str> = entry.media.iter().map(|(v, _)| v.as_str()).collect();
                let outcome = match entry.error_kind {
                    Some(kind) => format!("{:?}", kind),
                    None => "ok".to_string(),
                };
                println!(
                    "  {} [{}] committed {}/{} - {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    views.join(", "),
                    entry.state.len(),
                    views.len(),
                    outcome
                );
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}
