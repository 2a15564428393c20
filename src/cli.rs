//! CLI front end: argument parsing and the run handler.

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::owner::platform_resolver;
use crate::scan::run_scan;
use crate::store::Store;
use crate::types::ScanOpts;
use crate::utils::SETTINGS_FILE_NAME;
use crate::utils::settings::{SettingsToml, load_settings_toml};
use crate::utils::setup_logging;

/// Register scan projects and their files in a shared ledger database.
#[derive(Clone, Parser)]
#[command(name = "scanledger")]
#[command(about = "Scan a root of digitization projects; register owners, projects, and files.")]
pub struct Cli {
    /// Scan root containing project directories.
    #[arg(value_name = "ROOT", env = "SCANLEDGER_ROOT")]
    pub root: PathBuf,

    /// Path to the ledger database. Required here, via SCANLEDGER_DB, or in
    /// the scan root's settings file.
    #[arg(long, short, env = "SCANLEDGER_DB")]
    pub db: Option<PathBuf>,

    /// Process projects one at a time; stop at the first failure.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub serial: Option<bool>,

    /// Worker cap for concurrent project processing.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

/// Settings file first, CLI flags on top so the command line wins.
fn setup_opts(cli: &Cli, settings: Option<&SettingsToml>) -> ScanOpts {
    let mut opts = ScanOpts::default();
    if let Some(file) = settings {
        file.apply_to_opts(&mut opts);
    }
    if cli.workers.is_some() {
        opts.workers = cli.workers;
    }
    if let Some(serial) = cli.serial {
        opts.serial = serial;
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
    opts
}

/// Scan `root` and register everything it contains.
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose.unwrap_or(false));

    let settings = load_settings_toml(&cli.root);
    let opts = setup_opts(cli, settings.as_ref());
    let db_path = match cli
        .db
        .clone()
        .or_else(|| settings.as_ref().and_then(|f| f.db_path()))
    {
        Some(path) => path,
        None => bail!(
            "no ledger database configured: pass --db, set SCANLEDGER_DB, or add `db` to {}",
            SETTINGS_FILE_NAME
        ),
    };

    info!("scanning {}", cli.root.display());
    let store = Store::open(&db_path)
        .with_context(|| format!("opening ledger at {}", db_path.display()))?;
    let resolver = platform_resolver(&store);
    let report = run_scan(&store, &resolver, &cli.root, &opts)
        .with_context(|| format!("scanning {}", cli.root.display()))?;

    info!("scan complete: {}", report.summary());
    if !report.is_clean() {
        bail!("{} project(s) failed; see log for details", report.failures.len());
    }
    Ok(())
}
