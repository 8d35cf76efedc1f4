use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use demoflow::data::{AssignmentStore, RunStateStore, ScriptStore, TemplateStore};
use demoflow::{util, Config, Database, DemoScript, Rehearsal, RehearsalReport, SharedStore};

/// Rehearse scripted product demos across pages, windows and tab groups
#[derive(Parser)]
#[command(name = "demoflow")]
#[command(version)]
struct Cli {
    /// Data directory (default: ~/.demoflow)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a script and queue it for the next run
    Import {
        /// Path to the script JSON
        script: PathBuf,

        /// Also keep it as a named template
        #[arg(long)]
        save_as: Option<String>,
    },

    /// Play a script (or the queued one) against a simulated browser
    Play {
        /// Path to the script JSON
        script: Option<PathBuf>,
    },

    /// Close every page the last run created
    Clear,

    /// Print the recorded run and persona assignments as JSON
    Status,

    /// Check a script without storing it
    Validate {
        /// Path to the script JSON
        script: PathBuf,
    },

    /// List saved templates
    Templates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    // Initialize logging to file (<data-dir>/logs/demoflow.log)
    fs::create_dir_all(util::logs_dir())
        .with_context(|| format!("Failed to create {}", util::logs_dir().display()))?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let db = Database::open_default().context("Failed to open database")?;
    run(cli.command, SharedStore::new(db), &config).await
}

async fn run(command: Commands, store: SharedStore, config: &Config) -> Result<()> {
    match command {
        Commands::Import { script, save_as } => {
            let parsed = read_script(&script)?;
            ScriptStore::new(store.clone()).save_pending(&parsed)?;
            if let Some(name) = save_as {
                TemplateStore::new(store).save(&name, &parsed)?;
                println!("Saved template '{name}'");
            }
            println!(
                "Imported '{}' for {} ({} step(s))",
                parsed.product,
                parsed.customer,
                parsed.steps.len()
            );
        }
        Commands::Play { script } => {
            let rehearsal = Rehearsal::new(store, config);
            let result = match script {
                Some(path) => rehearsal.play(read_script(&path)?).await,
                None => rehearsal.play_stored().await,
            };
            rehearsal.shutdown().await;
            print_report(&result.context("Playback failed")?);
        }
        Commands::Clear => {
            let rehearsal = Rehearsal::new(store, config);
            let report = rehearsal.clear().await;
            rehearsal.shutdown().await;
            let report = report.context("Clear failed")?;
            println!(
                "Cleared {} page(s): {} removed, {} already closed, {} failed",
                report.attempted.len(),
                report.removed,
                report.already_gone,
                report.failed
            );
        }
        Commands::Status => {
            let run_state = RunStateStore::new(store.clone()).load()?;
            let assignments = AssignmentStore::new(store).all()?;
            let status = serde_json::json!({
                "runState": run_state,
                "assignments": assignments,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Templates => {
            for name in TemplateStore::new(store).list()? {
                println!("{name}");
            }
        }
        Commands::Validate { script } => {
            let script = read_script(&script)?;
            println!(
                "Valid: {} step(s), {} persona(s)",
                script.steps.len(),
                script.personas.len()
            );
        }
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<DemoScript> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    DemoScript::from_json(&json).with_context(|| format!("Invalid script {}", path.display()))
}

fn print_report(report: &RehearsalReport) {
    let summary = &report.summary;
    if let Some(run_id) = summary.run_id {
        println!("Run {run_id}");
    }
    println!("  pages created:    {}", summary.pages.len());
    println!("  windows created:  {}", summary.windows.len());
    for index in &summary.skipped_steps {
        println!("  skipped step:     {}", index + 1);
    }
    for url in &summary.failed_urls {
        println!("  failed url:       {url}");
    }
    for (page_id, persona) in &report.overlays {
        println!("  page {page_id}: {persona}");
    }
    for page_id in &report.missing_overlays {
        println!("  page {page_id}: overlay missing");
    }
}
