//! `multi-zodb-check-refs` — forward reachability walk that reports
//! reference integrity violations to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use fedgc_cli::{init_logging, persist_back_refs};
use fedgc_core::{check, Federation, FederationConfig, StdoutReporter};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Walk a federation's object graph from every db's root and report
/// reference integrity violations.
#[derive(Parser)]
#[command(name = "multi-zodb-check-refs", version, about, long_about = None)]
struct Args {
    /// Federation configuration to check.
    config: PathBuf,

    /// Persist the back-reference index built while walking to this path.
    #[arg(short = 'r', long = "references-filestorage")]
    references_filestorage: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(None);

    let cfg = FederationConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let federation = Federation::open(&cfg)?;
    let stores = federation.into_stores();

    let reporter = StdoutReporter;
    let report = check(&stores, &BTreeSet::new(), &reporter)?;

    println!();
    println!("{}", style("Reference check report:").bold());
    println!("  visited:           {}", style(report.visited).cyan());
    println!("  load failures:     {}", style(report.load_failures).red());
    println!("  bad cross-refs:    {}", style(report.bad_cross_refs).red());
    println!("  unknown databases: {}", style(report.unknown_databases).red());

    if let Some(path) = &args.references_filestorage {
        persist_back_refs(path, &report.back_refs)
            .with_context(|| format!("persisting back-ref index to {}", path.display()))?;
        println!("  back-refs persisted to {}", path.display());
    }

    if report.load_failures > 0 || report.bad_cross_refs > 0 || report.unknown_databases > 0 {
        std::process::exit(1);
    }
    Ok(())
}
