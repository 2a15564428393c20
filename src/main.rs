//! Scanledger CLI: scan a root of digitization projects and register owners,
//! projects, and files in the ledger.

use anyhow::Result;
use clap::Parser;
use scanledger::cli::{Cli, handle_run};
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    // Optional .env so SCANLEDGER_ROOT / SCANLEDGER_DB can come from a file.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
