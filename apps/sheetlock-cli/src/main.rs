//! # Sheetlock CLI
//!
//! Drives the Sheetlock edit lock and offline snapshots against a directory
//! store. Every invocation is a short-lived viewer, so several terminals
//! pointed at the same `--store-dir` behave like several browser tabs on one
//! machine.
//!
//! ## Store layout
//!
//! ```text
//! <store-dir>/lock%3A<document>.json              →  the shared edit lock
//! <store-dir>/offline%3A<document>%3A<user>.json  →  unsynced offline edits
//! ```

mod demo;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sheetlock_sdk::{
    DocumentId, EditSession, EditorConfig, EditorConfigBuilder, FileStore, SystemClock, UserId,
    DEFAULT_DOCUMENT_ID,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sheetlock-cli")]
#[command(about = "Single-writer edit lock with offline continuity for shared sheets")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory shared by every viewer on this machine
    #[arg(long, global = true, env = "SHEETLOCK_STORE_DIR", default_value = ".sheetlock")]
    store_dir: PathBuf,

    /// Who is editing
    #[arg(long, global = true, env = "SHEETLOCK_USER", default_value = "anonymous")]
    user: String,

    /// Sheet to open
    #[arg(long, global = true, env = "SHEETLOCK_DOCUMENT", default_value = DEFAULT_DOCUMENT_ID)]
    document: String,

    /// Inactivity before the lock clears itself
    #[arg(long, global = true, env = "SHEETLOCK_LOCK_TIMEOUT_MS", default_value_t = 600_000)]
    lock_timeout_ms: u64,

    /// How long before expiry the warning is raised
    #[arg(long, global = true, env = "SHEETLOCK_WARNING_LEAD_MS", default_value_t = 60_000)]
    warning_lead_ms: u64,

    /// How long editing may continue while disconnected
    #[arg(long, global = true, env = "SHEETLOCK_OFFLINE_GRACE_MS", default_value_t = 600_000)]
    offline_grace_ms: u64,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

impl GlobalArgs {
    fn editor_config(&self) -> Result<EditorConfig> {
        Ok(EditorConfigBuilder::new()
            .lock_timeout(self.lock_timeout_ms)
            .warning_lead(self.warning_lead_ms)
            .offline_grace(self.offline_grace_ms)
            .build()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the lock, connectivity and recovery state
    Status,
    /// Enter edit mode by taking the lock
    Acquire,
    /// Reset the inactivity countdown of a held lock
    Renew,
    /// Leave edit mode
    Release,
    /// Edit while disconnected: take the lock and snapshot the content locally
    OfflineSave {
        /// Sheet content as JSON
        #[arg(long)]
        payload: String,
    },
    /// Restore unsynced offline edits and take the lock
    Recover,
    /// Throw unsynced offline edits away
    Discard,
    /// Walk through the lock and offline scenarios in memory
    Demo,
}

// ─── Commands ──────────────────────────────────────────────────────────────

fn run_command(args: &GlobalArgs, command: Commands) -> Result<()> {
    let store = FileStore::open(args.store_dir.clone())
        .with_context(|| format!("opening store at {}", args.store_dir.display()))?;
    let online = !matches!(command, Commands::OfflineSave { .. });

    let mut session = EditSession::new(
        store,
        SystemClock,
        DocumentId::new(args.document.as_str()),
        UserId::new(args.user.as_str()),
        args.editor_config()?,
        Arc::new(ui::ConsoleNotifier),
        online,
    )?;

    match command {
        Commands::Status => {
            session.remaining_ms()?;
        }
        Commands::Acquire => {
            session.begin_editing()?;
        }
        Commands::Renew => session.record_activity()?,
        Commands::Release => {
            if !session.release()? {
                ui::step("not holding the lock, nothing to release");
            }
        }
        Commands::OfflineSave { payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("--payload must be valid JSON")?;
            session.begin_editing()?;
            session.edit(payload)?;
            ui::step("saved locally, run `recover` once back online");
        }
        Commands::Recover => match session.restore_snapshot()? {
            Some(payload) => ui::step(&format!("restored {}", payload)),
            None => ui::step("no unsynced changes"),
        },
        Commands::Discard => session.discard_snapshot()?,
        Commands::Demo => bail!("the demo runs in memory and takes no store"),
    }

    ui::show_view(&session.view());
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Demo => demo::run().await,
        command => run_command(&cli.global, command),
    }
}
