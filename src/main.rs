//! # Autodial: sequential auto-dialer
//!
//! Imports call lists, walks them one number at a time with a delay between
//! calls, and records the operator's verdict on each.
//!
//! Usage:
//!   autodial import leads.csv              # Add a call list
//!   autodial run                           # Dial the latest list
//!   autodial run --at "2026-03-01 09:00"   # Start at a given time
//!   autodial stats                         # Outcome counts per list

mod console;
mod dialer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autodial_core::{AutodialConfig, CloudSync, EntryImporter};
use autodial_scheduler::{
    EntryFile, EntryStore, FileImporter, NoopSync, SchedulerParts, SqliteKv, StatsAggregator,
    WebhookSync, WebhookTarget, spawn_session,
};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autodial", version, about = "📞 Autodial: sequential auto-dialer")]
struct Cli {
    /// Config file (default: ~/.autodial/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a call list (.txt or .csv)
    Import {
        file: String,
    },
    /// Start an interactive dialing session
    Run {
        /// Batch to dial (default: latest import)
        #[arg(short, long)]
        batch: Option<String>,
        /// Delay between calls in milliseconds
        #[arg(long)]
        interval_ms: Option<i64>,
        /// Ask for confirmation every N calls
        #[arg(long)]
        milestone: Option<i64>,
        /// Start at "YYYY-MM-DD HH:MM" or "HH:MM" today
        #[arg(long)]
        at: Option<String>,
        /// Log calls instead of placing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show call counters and per-batch outcomes
    Stats,
    /// List entries and their outcomes
    List {
        #[arg(short, long)]
        batch: Option<String>,
    },
    /// Show the effective config, or write a default one
    Config {
        #[arg(long)]
        init: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Prefix match: covers autodial_core and autodial_scheduler too.
    let filter = if cli.verbose { "autodial=debug" } else { "autodial=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(AutodialConfig::default_path);
    let mut config = if config_path.exists() {
        AutodialConfig::load_from(&config_path)?
    } else {
        AutodialConfig::default()
    };

    match cli.command {
        Command::Import { file } => import(&config, &expand_path(&file)).await,
        Command::Run {
            batch,
            interval_ms,
            milestone,
            at,
            dry_run,
        } => {
            if let Some(size) = milestone {
                config.scheduler.milestone_size = size;
            }
            config.validate()?;
            let start_at = at.as_deref().map(parse_start_time).transpose()?;
            run(&config, batch.as_deref(), interval_ms, start_at, dry_run).await
        }
        Command::Stats => stats(&config),
        Command::List { batch } => list(&config, batch.as_deref()),
        Command::Config { init } => show_config(&config, &config_path, init),
    }
}

async fn import(config: &AutodialConfig, path: &Path) -> Result<()> {
    let raw = FileImporter::read(path)?;
    let imported = FileImporter::new().import_entries(&raw)?;

    let file = EntryFile::new(&config.storage.data_dir());
    let mut store = file.load()?;
    let id = store.append(imported);
    file.save(&store)?;

    let kv = SqliteKv::open(&config.storage.stats_db_path())?;
    let mut stats = StatsAggregator::load(Box::new(kv))?;
    let batch = store.batch(&id).cloned().context("imported batch missing from store")?;
    stats.register_batch(&batch)?;

    println!("✅ Imported {} numbers as batch '{}'", batch.total_imported, batch.id);

    if let Some(target) = WebhookTarget::from_config(&config.sync) {
        let timeout = target.timeout;
        let (sync, mut failures) = WebhookSync::new(target);
        sync.sync_batch(&batch);
        drop(sync);
        // Closed channel means the upload finished without error.
        match tokio::time::timeout(timeout, failures.recv()).await {
            Ok(Some(e)) => println!("⚠️ Sync failed: {e}"),
            Ok(None) => println!("☁️ Batch synced"),
            Err(_) => println!("⚠️ Sync timed out"),
        }
    }
    Ok(())
}

async fn run(
    config: &AutodialConfig,
    batch: Option<&str>,
    interval_ms: Option<i64>,
    start_at: Option<DateTime<Local>>,
    dry_run: bool,
) -> Result<()> {
    let file = EntryFile::new(&config.storage.data_dir());
    let all = file.load()?;
    let entries = match batch {
        Some(id) => all
            .select_batch(id)
            .with_context(|| format!("unknown batch '{id}' (see `autodial list`)"))?,
        None => match all.latest_batch() {
            Some(latest) => all.select_batch(&latest.id).unwrap_or_default(),
            None => EntryStore::new(),
        },
    };
    if let Some(latest) = entries.batches().first() {
        println!("📋 Batch '{}': {} numbers", latest.id, entries.len());
    }

    let kv = SqliteKv::open(&config.storage.stats_db_path())?;
    let stats = StatsAggregator::load(Box::new(kv))?;

    let (sync, failures): (Arc<dyn CloudSync>, _) = match WebhookTarget::from_config(&config.sync) {
        Some(target) => {
            let (sync, rx) = WebhookSync::new(target);
            (Arc::new(sync), Some(rx))
        }
        None => (Arc::new(NoopSync), None),
    };

    let parts = SchedulerParts {
        entries,
        stats,
        dialer: dialer::from_config(&config.dialer, dry_run),
        sync,
        entry_file: Some(file),
        config: config.scheduler.clone(),
    };
    let session = spawn_session(parts, failures)?;
    if let Some(ms) = interval_ms {
        session.set_dial_interval(ms).await?;
    }

    console::run(session, start_at).await?;
    // Let in-flight sync uploads finish.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

fn stats(config: &AutodialConfig) -> Result<()> {
    let kv = SqliteKv::open(&config.storage.stats_db_path())?;
    let stats = StatsAggregator::load(Box::new(kv))?;
    let counters = stats.counters();

    println!("📊 Calls today: {}  |  total: {}", counters.daily_calls, counters.total_calls);
    if let Some(ms) = stats.dial_interval_ms() {
        println!("⏲️ Dial interval: {ms}ms");
    }
    println!();
    println!("{:<28} {:>6} {:>6} {:>8} {:>7} {:>6}", "BATCH", "TOTAL", "DIALED", "CUSTOMER", "USELESS", "UNSET");
    for (id, b) in stats.batches() {
        println!(
            "{:<28} {:>6} {:>6} {:>8} {:>7} {:>6}",
            id,
            b.total,
            b.dialed,
            b.customer,
            b.useless,
            b.unset()
        );
    }
    Ok(())
}

fn list(config: &AutodialConfig, batch: Option<&str>) -> Result<()> {
    let all = EntryFile::new(&config.storage.data_dir()).load()?;
    let store = match batch {
        Some(id) => all
            .select_batch(id)
            .with_context(|| format!("unknown batch '{id}'"))?,
        None => all,
    };
    if store.is_empty() {
        println!("No entries. Import a list with `autodial import <file>`.");
        return Ok(());
    }

    for b in store.batches() {
        println!("📋 {} ({} numbers, imported {})", b.id, b.total_imported, b.imported_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    println!();
    for (i, entry) in store.entries().iter().enumerate() {
        println!(
            "{:>5}  {:<20} {:<9} {}",
            i + 1,
            entry.number,
            entry.outcome.to_string(),
            entry.remark.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn show_config(config: &AutodialConfig, path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            println!("⚠️ {} already exists, leaving it unchanged", path.display());
        } else {
            AutodialConfig::default().save_to(path)?;
            println!("✅ Wrote default config to {}", path.display());
        }
        return Ok(());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Parse "YYYY-MM-DD HH:MM", or "HH:MM" for today.
fn parse_start_time(s: &str) -> Result<DateTime<Local>> {
    let s = s.trim();
    let naive = match NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        Ok(dt) => dt,
        Err(_) => {
            let time = NaiveTime::parse_from_str(s, "%H:%M")
                .with_context(|| format!("invalid start time '{s}' (use \"YYYY-MM-DD HH:MM\" or \"HH:MM\")"))?;
            Local::now().date_naive().and_time(time)
        }
    };
    Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("start time '{s}' does not exist in the local timezone"))
}
