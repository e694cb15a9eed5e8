//! backpack-draft - module draft workflow from the command line
//!
//! Uploads source files, waits for ingestion, generates module content and
//! commits (or discards) the resulting module against a Backpack backend.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use backpack_common::config::{self, TomlConfig};
use backpack_common::{DraftEvent, EventBus};
use backpack_draft::{DraftField, DraftWorkflow, HttpBackend, UploadFile};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for backpack-draft
#[derive(Parser, Debug)]
#[command(name = "backpack-draft")]
#[command(about = "Create learning modules from uploaded sources")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/backpack/backpack-draft.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload files and build a module from them
    Create(CreateArgs),

    /// Write a config file with default values
    InitConfig {
        /// Destination (default: platform config path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug)]
struct CreateArgs {
    /// Source files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Module name (a generated name replaces it when available)
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    description: Option<String>,

    /// Course the module belongs to
    #[arg(long)]
    course: Option<String>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    due: Option<NaiveDate>,

    #[arg(long)]
    prerequisites: Option<String>,

    /// Regenerate learning goals once before committing
    #[arg(long)]
    regenerate_goals: bool,

    /// Discard the draft (and delete uploaded items) instead of committing
    #[arg(long)]
    discard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let bootstrap_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let mut config = load_config_logged(args.config.as_deref(), bootstrap_filter, std::io::stderr)?;
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
        config.validate().context("Invalid --api-url")?;
    }

    init_tracing(&config);

    match args.command {
        Command::InitConfig { output, force } => init_config(output, force),
        Command::Create(create) => run_create(config, create).await,
    }
}

/// Load the config under a subscriber scoped to the call
///
/// The global subscriber needs the configured level, so it can only be
/// installed afterwards.
fn load_config_logged<W>(path: Option<&Path>, filter: EnvFilter, writer: W) -> Result<TomlConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || config::load_config(path))
        .context("Failed to load configuration")
}

fn init_tracing(config: &TomlConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "backpack_draft={level},backpack_common={level}",
            level = config.logging.level
        )
        .into()
    });

    // Optional copy of the log in a file, stderr otherwise only
    let file_layer = config.logging.file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            ),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match output.or_else(config::default_config_path) {
        Some(path) => path,
        None => bail!("No config directory on this platform, pass --output"),
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config::write_toml_config(&TomlConfig::default(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Configuration written to {}", path.display());
    Ok(())
}

async fn run_create(config: TomlConfig, args: CreateArgs) -> Result<()> {
    let backend = HttpBackend::new(&config.api).context("Failed to build HTTP client")?;
    let events = EventBus::new(256);
    let printer = tokio::spawn(print_events(events.subscribe()));

    let workflow = DraftWorkflow::new(Arc::new(backend), &config, events);
    info!(session_id = %workflow.session_id(), api = %config.api.base_url, "Draft session started");

    workflow
        .edit(|draft| {
            if let Some(name) = args.name {
                draft.set_field(DraftField::Name(name));
            }
            if let Some(description) = args.description {
                draft.set_field(DraftField::Description(description));
            }
            draft.set_field(DraftField::TargetCourse(args.course));
            draft.set_field(DraftField::DueDate(args.due));
            draft.set_field(DraftField::Prerequisites(args.prerequisites));
        })
        .await;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(UploadFile::from_path(path).await?);
    }

    let report = workflow.upload(files).await?;
    for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
        warn!(
            file = %outcome.file_name,
            error = outcome.error.as_deref().unwrap_or_default(),
            "Upload failed"
        );
    }
    if report.succeeded() == 0 {
        bail!("No file was accepted by the backend");
    }

    if args.discard {
        let cancelled = workflow.cancel().await?;
        info!(deleted = cancelled.deleted, failed = cancelled.failed, "Draft discarded");
        printer.abort();
        return Ok(());
    }

    let summary = tokio::select! {
        result = workflow.process() => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, discarding draft");
            let cancelled = workflow.cancel().await?;
            info!(deleted = cancelled.deleted, "Draft discarded");
            printer.abort();
            return Ok(());
        }
    };
    match summary {
        Ok(summary) => info!(
            completed = summary.completed,
            failed = summary.failed,
            "Ingestion finished"
        ),
        Err(e) => error!(error = %e, "Automatic generation failed, continuing with current draft"),
    }

    if args.regenerate_goals {
        let goals = workflow.regenerate_learning_goals().await?;
        info!(goals = goals.len(), "Learning goals regenerated");
    }

    let draft = workflow.snapshot().await;
    println!("Module: {}", draft.name());
    if let Some(overview) = draft.overview() {
        println!("\n{}\n", overview);
    }
    for goal in draft.learning_goals() {
        println!("  {}. {}", goal.order + 1, goal.description);
    }

    let committed = workflow.commit().await.context("Commit failed")?;
    if !committed.is_complete() {
        warn!(
            failed_links = ?committed.failed_links,
            failed_goals = ?committed.failed_goals,
            "Module created with missing links or goals"
        );
    }
    println!("Created module {}", committed.module_id);

    printer.abort();
    Ok(())
}

/// Print workflow progress as it happens
async fn print_events(mut rx: broadcast::Receiver<DraftEvent>) {
    loop {
        match rx.recv().await {
            Ok(DraftEvent::ProgressUpdated {
                completed,
                failed,
                total,
                percent,
                ..
            }) => {
                println!("[{:>3}%] {}/{} processed ({} failed)", percent, completed + failed, total, failed);
            }
            Ok(DraftEvent::ItemRegistered { item_id, file_name, .. }) => {
                println!("Uploaded {} as {}", file_name, item_id);
            }
            Ok(DraftEvent::UploadFailed { file_name, error, .. }) => {
                println!("Upload of {} failed: {}", file_name, error);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
