//! `multi-zodb-gc` — mark-and-sweep garbage collection over a federation of
//! object stores.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use fedgc_cli::{init_logging, parse_file_override, UntransformingStorage};
use fedgc_core::storage::{FileStorage, Storage};
use fedgc_core::{open_matched_pair, sweep, FederationConfig, RealSleeper, SweepConfig, Tid, WallClock};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Garbage collect unreferenced objects across a federation of object stores.
#[derive(Parser)]
#[command(name = "multi-zodb-gc", version, about, long_about = None)]
struct Args {
    /// Primary federation configuration.
    config1: PathBuf,
    /// Optional secondary configuration, checked for a matching db set.
    config2: Option<PathBuf>,

    /// Cutoff in days before now; tid >= cutoff is "recent". 0 skips pass A.
    #[arg(short = 'd', long, default_value_t = 1)]
    days: u32,

    /// Drop references that point into this database. Repeatable.
    #[arg(short = 'i', long = "ignore-database")]
    ignore_database: Vec<String>,

    /// Bypass the configured store for NAME and read the raw file at PATH.
    #[arg(short = 'f', long = "file-storage", value_name = "NAME=PATH")]
    file_storage: Vec<String>,

    /// Built-in untransform to apply to `-f` records before ref extraction.
    #[arg(short = 'u', long)]
    untransform: Option<String>,

    /// Log level (name or number), overrides RUST_LOG.
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let primary_cfg = FederationConfig::load(&args.config1)
        .with_context(|| format!("loading {}", args.config1.display()))?;
    let secondary_cfg = args
        .config2
        .as_ref()
        .map(|p| FederationConfig::load(p))
        .transpose()
        .with_context(|| "loading secondary configuration".to_string())?;

    let (primary, secondary) = open_matched_pair(&primary_cfg, secondary_cfg.as_ref())?;
    // The secondary exists only to validate the db set; drop it before the
    // sweeper starts modifying the primary (spec.md §5).
    drop(secondary);

    let mut stores = primary.into_stores();

    let untransform_fn = match &args.untransform {
        Some(name) => Some(
            fedgc_core::untransform::lookup(name)
                .ok_or_else(|| fedgc_core::GcError::UnknownUntransform(name.clone()))?,
        ),
        None => None,
    };

    for spec in &args.file_storage {
        let (name, path) = parse_file_override(spec)?;
        let xrefs = primary_cfg
            .databases
            .get(&name)
            .map(|c| c.xrefs)
            .unwrap_or(true);
        let file_store = FileStorage::open(&path, xrefs)
            .with_context(|| format!("opening file-storage override {name}={}", path.display()))?;
        let store: Box<dyn Storage> = match untransform_fn {
            Some(f) => Box::new(UntransformingStorage::new(Box::new(file_store), f)),
            None => Box::new(file_store),
        };
        stores.insert(name, store);
    }

    let ignore: BTreeSet<String> = args.ignore_database.into_iter().collect();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs_f64();
    let cutoff = Tid::cutoff(now, args.days);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    spinner.set_message("marking reachable objects...");
    let mark_report = fedgc_core::mark(&stores, cutoff, &ignore, args.days == 0)?;

    spinner.set_message("sweeping unreachable objects...");
    let mut bad = mark_report.bad;
    let sweep_report = sweep(&mut stores, &mut bad, &SweepConfig::default(), &WallClock, &RealSleeper)?;

    spinner.finish_and_clear();

    println!("{}", style("Garbage collection report:").bold());
    println!("  {} reachable, {} deleted (pre-existing)", style(mark_report.good.len()).green(), style(mark_report.deleted.len()).cyan());
    for (db, count) in &sweep_report.deleted {
        let skipped = sweep_report.skipped.get(db).copied().unwrap_or(0);
        let label = if db.is_empty() { "<default>" } else { db.as_str() };
        if skipped > 0 {
            println!(
                "  {}: deleted {} ({} skipped as already modified)",
                label,
                style(count).yellow(),
                style(skipped).red()
            );
        } else {
            println!("  {}: deleted {}", label, style(count).yellow());
        }
    }

    Ok(())
}
